//! Newton's method root finding

use crate::error::{FormulaError, FormulaResult};

/// Find a root of `f` starting from `start`
///
/// Stops once a step or `|f(x)|` is below `epsilon`. When an iterate is not
/// finite, `nan_fallback` receives the previous fallback (if any) and
/// returns a new starting point.
pub fn newton_method<F, D, N>(
    f: F,
    df: D,
    start: f64,
    max_iterations: usize,
    epsilon: f64,
    mut nan_fallback: N,
) -> FormulaResult<f64>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
    N: FnMut(Option<f64>) -> f64,
{
    let mut x = start;
    let mut fallback = None;
    for _ in 0..max_iterations {
        let y = f(x);
        if y.is_finite() && y.abs() < epsilon {
            return Ok(x);
        }
        let next = x - y / df(x);
        if !next.is_finite() {
            let restart = nan_fallback(fallback);
            fallback = Some(restart);
            x = restart;
            continue;
        }
        if (next - x).abs() < epsilon {
            return Ok(next);
        }
        x = next;
    }
    Err(FormulaError::evaluation(
        "Function [[FUNCTION_NAME]] didn't find any result.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_root() {
        let root = newton_method(|x| x * x - 2.0, |x| 2.0 * x, 1.0, 50, 1e-10, |_| 1.0).unwrap();
        assert!((root - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_no_root_exhausts_budget() {
        let result = newton_method(|x| x * x + 1.0, |x| 2.0 * x, 1.0, 20, 1e-10, |_| 1.0);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("didn't find any result"));
    }

    #[test]
    fn test_nan_fallback_restarts() {
        let mut restarts = Vec::new();
        // f'(0) = 0 makes the first step infinite
        let root = newton_method(
            |x| x * x - 4.0,
            |x| 2.0 * x,
            0.0,
            50,
            1e-10,
            |previous| {
                restarts.push(previous);
                previous.map_or(1.0, |p| p * 2.0)
            },
        )
        .unwrap();
        assert!((root - 2.0).abs() < 1e-9);
        assert_eq!(restarts, vec![None]);
    }
}
