//! Least-squares regression

use gridcalc_core::{CellError, CellResult, ErrorKind, Matrix};

use crate::error::{FormulaError, FormulaResult};

/// Fitted linear model `y = b + m_1 x_1 + ... + m_k x_k`
#[derive(Debug, Clone, PartialEq)]
pub struct Fit {
    /// `m_1 ... m_k`
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Standard errors of `m_1 ... m_k`, then of `b` when fitted
    pub standard_errors: Vec<f64>,
    pub r_squared: f64,
    pub standard_error_y: f64,
    pub f_statistic: f64,
    pub degrees_of_freedom: f64,
    pub ss_regression: f64,
    pub ss_residual: f64,
    with_intercept: bool,
}

impl Fit {
    /// Least-squares fit of `y` against the predictor columns `x`
    pub fn new(y: &[f64], x: &[Vec<f64>], intercept: bool) -> FormulaResult<Self> {
        let n = y.len();
        let k = x.len();
        if n == 0 || x.iter().any(|column| column.len() != n) {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] expects known_data_y and known_data_x to have the same size.",
            ));
        }

        let p = k + usize::from(intercept);
        let row = |i: usize| {
            let mut r: Vec<f64> = x.iter().map(|column| column[i]).collect();
            if intercept {
                r.push(1.0);
            }
            r
        };

        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for i in 0..n {
            let r = row(i);
            for a in 0..p {
                xty[a] += r[a] * y[i];
                for b in 0..p {
                    xtx[a][b] += r[a] * r[b];
                }
            }
        }
        let inverse = invert(xtx).ok_or_else(|| {
            FormulaError::evaluation("Function [[FUNCTION_NAME]] failed: the data matrix is singular.")
        })?;
        let beta: Vec<f64> = (0..p)
            .map(|a| (0..p).map(|b| inverse[a][b] * xty[b]).sum())
            .collect();

        let fitted: Vec<f64> = (0..n)
            .map(|i| row(i).iter().zip(&beta).map(|(v, c)| v * c).sum())
            .collect();
        let mean = y.iter().sum::<f64>() / n as f64;
        let ss_residual: f64 = y.iter().zip(&fitted).map(|(a, b)| (a - b).powi(2)).sum();
        let ss_regression: f64 = if intercept {
            fitted.iter().map(|f| (f - mean).powi(2)).sum()
        } else {
            fitted.iter().map(|f| f * f).sum()
        };
        let degrees_of_freedom = n as f64 - p as f64;
        let standard_error_y = (ss_residual / degrees_of_freedom).sqrt();
        let total = ss_regression + ss_residual;
        let r_squared = if total == 0.0 { 1.0 } else { ss_regression / total };
        let f_statistic = (ss_regression / k as f64) / (ss_residual / degrees_of_freedom);
        let standard_errors = (0..p)
            .map(|a| (standard_error_y * standard_error_y * inverse[a][a]).sqrt())
            .collect();

        Ok(Fit {
            coefficients: beta[..k].to_vec(),
            intercept: if intercept { beta[k] } else { 0.0 },
            standard_errors,
            r_squared,
            standard_error_y,
            f_statistic,
            degrees_of_freedom,
            ss_regression,
            ss_residual,
            with_intercept: intercept,
        })
    }

    /// Predicted value for one observation of the predictors
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(m, v)| m * v)
                .sum::<f64>()
    }

    /// The fit in LINEST layout
    ///
    /// First row `m_k ... m_1, b`. Verbose output adds standard errors,
    /// `R²`/`sey`, `F`/`df` and `ssreg`/`ssresid`; other slots are `#N/A`.
    pub fn to_matrix(&self, verbose: bool) -> Matrix<CellResult> {
        let k = self.coefficients.len();
        let height = if verbose { 5 } else { 1 };
        let na = || CellResult::new(CellError::new(ErrorKind::NotAvailable));
        let number = |v: f64| {
            if v.is_finite() {
                CellResult::new(v)
            } else {
                CellResult::new(CellError::new(ErrorKind::DivisionByZero))
            }
        };
        Matrix::from_fn(k + 1, height, |col, row| match (row, col) {
            (0, c) if c < k => number(self.coefficients[k - 1 - c]),
            (0, _) => number(self.intercept),
            (1, c) if c < k => number(self.standard_errors[k - 1 - c]),
            (1, _) if self.with_intercept => number(self.standard_errors[k]),
            (2, 0) => number(self.r_squared),
            (2, 1) => number(self.standard_error_y),
            (3, 0) => number(self.f_statistic),
            (3, 1) => number(self.degrees_of_freedom),
            (4, 0) => number(self.ss_regression),
            (4, 1) => number(self.ss_residual),
            _ => na(),
        })
    }
}

/// Gauss-Jordan inversion with partial pivoting; `None` when singular
fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = m.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot = (col..n).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot);
        inv.swap(col, pivot);

        let scale = m[col][col];
        for j in 0..n {
            m[col][j] /= scale;
            inv[col][j] /= scale;
        }
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = m[r][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                m[r][j] -= factor * m[col][j];
                inv[r][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Multiple linear regression in LINEST layout
pub fn linear_regression(
    y: &[f64],
    x: &[Vec<f64>],
    intercept: bool,
    verbose: bool,
) -> FormulaResult<Matrix<CellResult>> {
    Ok(Fit::new(y, x, intercept)?.to_matrix(verbose))
}

/// Powers `x, x², ..., x^order` as predictor columns
pub fn polynomial_columns(x: &[f64], order: usize) -> Vec<Vec<f64>> {
    (1..=order)
        .map(|power| x.iter().map(|v| v.powi(power as i32)).collect())
        .collect()
}

/// Polynomial regression of the given order in LINEST layout
pub fn polynomial_regression(
    y: &[f64],
    x: &[f64],
    order: usize,
    intercept: bool,
    verbose: bool,
) -> FormulaResult<Matrix<CellResult>> {
    linear_regression(y, &polynomial_columns(x, order), intercept, verbose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::Value;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_simple_line() {
        let fit = Fit::new(&[3.0, 5.0, 7.0, 9.0], &[vec![1.0, 2.0, 3.0, 4.0]], true).unwrap();
        assert!(close(fit.coefficients[0], 2.0));
        assert!(close(fit.intercept, 1.0));
        assert!(close(fit.r_squared, 1.0));
        assert!(close(fit.predict(&[10.0]), 21.0));
    }

    #[test]
    fn test_linest_layout() {
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let x = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0]];
        let m = linear_regression(&y, &x, true, true).unwrap();
        assert_eq!((m.width(), m.height()), (2, 5));
        let slope = m.get(0, 0).unwrap().value.as_number().unwrap();
        let intercept = m.get(1, 0).unwrap().value.as_number().unwrap();
        assert!(close(slope, 0.8));
        assert!(close(intercept, 0.6));
        assert!(matches!(m.get(1, 2).unwrap().value, Value::Number(_)));
        assert_eq!(
            m.get(1, 1).unwrap().value.as_number().map(|v| v > 0.0),
            Some(true)
        );
        let df = m.get(1, 3).unwrap().value.as_number().unwrap();
        assert!(close(df, 3.0));
    }

    #[test]
    fn test_polynomial() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v * v - v + 3.0).collect();
        let m = polynomial_regression(&y, &x, 2, true, false).unwrap();
        let coefficient = |col| m.get(col, 0).unwrap().value.as_number().unwrap();
        assert!(close(coefficient(0), 2.0));
        assert!(close(coefficient(1), -1.0));
        assert!(close(coefficient(2), 3.0));
    }

    #[test]
    fn test_singular_system() {
        let result = Fit::new(&[1.0, 2.0], &[vec![1.0, 1.0], vec![2.0, 2.0]], true);
        assert!(result.is_err());
    }

    #[test]
    fn test_without_intercept() {
        let fit = Fit::new(&[2.0, 4.0, 6.0], &[vec![1.0, 2.0, 3.0]], false).unwrap();
        assert!(close(fit.coefficients[0], 2.0));
        assert_eq!(fit.intercept, 0.0);
        let m = fit.to_matrix(true);
        assert!(m.get(1, 1).unwrap().is_error());
    }
}
