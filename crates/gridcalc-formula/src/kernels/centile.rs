//! Percentiles

use gridcalc_core::{Locale, Value};

use crate::args::{Arg, Order};
use crate::error::{FormulaError, FormulaResult};
use crate::reduce::visit_numbers;
use crate::search::{dichotomic_search, SearchMode, SortOrder};

/// Numbers of `args` in ascending order
///
/// Each number is inserted after its last equal, found by binary search.
pub fn sorted_numbers(args: &[Arg], locale: &Locale) -> FormulaResult<Vec<f64>> {
    let mut sorted: Vec<f64> = Vec::new();
    visit_numbers(args, locale, Order::ColumnMajor, |n| {
        let position = dichotomic_search(
            sorted.len(),
            |i| Ok(Value::Number(sorted[i])),
            &Value::Number(n),
            SearchMode::NextSmaller,
            SortOrder::Ascending,
        )?;
        sorted.insert(position.map_or(0, |p| p + 1), n);
        Ok(())
    })?;
    Ok(sorted)
}

/// The `percent` percentile of the numbers of `args`
///
/// Inclusive ranks run from 0 to `n - 1`. Exclusive ranks run from 1 to
/// `n` and need `1/(n+1) <= percent <= n/(n+1)`. Values between ranks are
/// interpolated linearly.
pub fn centile(args: &[Arg], percent: f64, inclusive: bool, locale: &Locale) -> FormulaResult<f64> {
    let sorted = sorted_numbers(args, locale)?;
    let count = sorted.len();
    if count == 0 {
        return Err(FormulaError::evaluation(
            "[[FUNCTION_NAME]] has no valid input data.",
        ));
    }

    let index = if inclusive {
        if !(0.0..=1.0).contains(&percent) {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] parameter 2 value is out of range.",
            ));
        }
        (count - 1) as f64 * percent
    } else {
        let n = count as f64;
        if percent < 1.0 / (n + 1.0) || percent > n / (n + 1.0) {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] parameter 2 value is out of range.",
            ));
        }
        (n + 1.0) * percent - 1.0
    };

    let lower = index.floor();
    let fraction = index - lower;
    let k = lower as usize;
    if fraction == 0.0 || k + 1 >= count {
        return Ok(sorted[k.min(count - 1)]);
    }
    Ok(sorted[k] + fraction * (sorted[k + 1] - sorted[k]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::RangeArg;
    use gridcalc_core::{CellResult, Matrix};
    use pretty_assertions::assert_eq;

    fn data(values: &[f64]) -> Vec<Arg<'static>> {
        let column = values.iter().map(|n| CellResult::new(*n)).collect();
        vec![Arg::Range(RangeArg::Matrix(Matrix::from_columns(vec![column]).unwrap()))]
    }

    #[test]
    fn test_inclusive() {
        let locale = Locale::en_us();
        let args = data(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(centile(&args, 0.0, true, &locale), Ok(1.0));
        assert_eq!(centile(&args, 1.0, true, &locale), Ok(4.0));
        assert_eq!(centile(&args, 0.5, true, &locale), Ok(2.5));
        assert_eq!(centile(&args, 0.25, true, &locale), Ok(1.75));
    }

    #[test]
    fn test_exclusive() {
        let locale = Locale::en_us();
        let args = data(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(centile(&args, 0.5, false, &locale), Ok(2.5));
        assert!(centile(&args, 0.1, false, &locale).is_err());
        assert_eq!(centile(&args, 0.2, false, &locale), Ok(1.0));
    }

    #[test]
    fn test_sorted_numbers() {
        let locale = Locale::en_us();
        let sorted = sorted_numbers(&data(&[3.0, 1.0, 2.0, 1.0]), &locale).unwrap();
        assert_eq!(sorted, vec![1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicates_and_empty() {
        let locale = Locale::en_us();
        assert_eq!(centile(&data(&[5.0, 5.0, 1.0]), 0.5, true, &locale), Ok(5.0));
        assert!(centile(&data(&[]), 0.5, true, &locale).is_err());
    }
}
