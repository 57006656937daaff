//! Reducers over function arguments
//!
//! Ranges are walked column by column unless [`Order::RowMajor`] is asked
//! for. An error element aborts the walk and becomes the function result.

use gridcalc_core::{CellResult, Locale, Value};

use crate::args::{Arg, Order};
use crate::coerce::to_number_strict;
use crate::error::FormulaResult;

/// Visit every value of every argument; errors abort
pub fn visit_any<F>(args: &[Arg], order: Order, mut f: F) -> FormulaResult<()>
where
    F: FnMut(&CellResult) -> FormulaResult<()>,
{
    for arg in args {
        arg.visit(order, |v| {
            if let Value::Error(e) = &v.value {
                return Err(e.clone().into());
            }
            f(v)
        })?;
    }
    Ok(())
}

/// Visit every value of every argument, errors included
pub fn visit_all<F>(args: &[Arg], order: Order, mut f: F) -> FormulaResult<()>
where
    F: FnMut(&CellResult) -> FormulaResult<()>,
{
    for arg in args {
        arg.visit(order, &mut f)?;
    }
    Ok(())
}

/// Visit the numbers of every argument
///
/// Scalars are coerced strictly. Range elements that are not numbers are
/// skipped.
pub fn visit_numbers<F>(args: &[Arg], locale: &Locale, order: Order, mut f: F) -> FormulaResult<()>
where
    F: FnMut(f64) -> FormulaResult<()>,
{
    for arg in args {
        match arg {
            Arg::Missing => {}
            Arg::Value(v) => f(to_number_strict(&v.value, locale)?)?,
            Arg::Range(range) => range.visit(order, |_, _, v| match &v.value {
                Value::Number(n) => f(*n),
                Value::Error(e) => Err(e.clone().into()),
                _ => Ok(()),
            })?,
        }
    }
    Ok(())
}

/// Fold the numbers of every argument, in column-major order
pub fn reduce_numbers<T, F>(args: &[Arg], locale: &Locale, init: T, mut f: F) -> FormulaResult<T>
where
    T: Copy,
    F: FnMut(T, f64) -> T,
{
    let mut acc = init;
    visit_numbers(args, locale, Order::ColumnMajor, |n| {
        acc = f(acc, n);
        Ok(())
    })?;
    Ok(acc)
}

/// Fold every value of every argument, in column-major order; errors abort
pub fn reduce_any<T, F>(args: &[Arg], init: T, mut f: F) -> FormulaResult<T>
where
    T: Copy,
    F: FnMut(T, &CellResult) -> FormulaResult<T>,
{
    let mut acc = init;
    visit_any(args, Order::ColumnMajor, |v| {
        acc = f(acc, v)?;
        Ok(())
    })?;
    Ok(acc)
}

/// Collect the numbers of every argument, in column-major order
pub fn collect_numbers(args: &[Arg], locale: &Locale) -> FormulaResult<Vec<f64>> {
    let mut numbers = Vec::new();
    visit_numbers(args, locale, Order::ColumnMajor, |n| {
        numbers.push(n);
        Ok(())
    })?;
    Ok(numbers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::RangeArg;
    use gridcalc_core::{CellError, ErrorKind, Matrix};
    use pretty_assertions::assert_eq;

    fn range(rows: Vec<Vec<Value>>) -> Arg<'static> {
        let m = Matrix::from_rows(rows).unwrap().into_map(CellResult::from);
        Arg::Range(RangeArg::Matrix(m))
    }

    #[test]
    fn test_visit_numbers_skips_text_in_ranges() {
        let locale = Locale::en_us();
        let args = vec![
            range(vec![vec![1.0.into(), "x".into()], vec![true.into(), 4.0.into()]]),
            Arg::Value(CellResult::new("10")),
        ];
        let numbers = collect_numbers(&args, &locale).unwrap();
        assert_eq!(numbers, vec![1.0, 4.0, 10.0]);
    }

    #[test]
    fn test_scalar_text_is_coerced_strictly() {
        let locale = Locale::en_us();
        assert!(collect_numbers(&[Arg::Value(CellResult::new("abc"))], &locale).is_err());
        assert!(collect_numbers(&[Arg::Value(CellResult::new(""))], &locale).is_err());
        assert_eq!(
            collect_numbers(&[Arg::Value(CellResult::new(true))], &locale).unwrap(),
            vec![1.0]
        );
    }

    #[test]
    fn test_orders() {
        let args = vec![range(vec![
            vec![1.0.into(), 2.0.into()],
            vec![3.0.into(), 4.0.into()],
        ])];
        let mut seen = Vec::new();
        visit_any(&args, Order::ColumnMajor, |v| {
            seen.push(v.value.as_number().unwrap());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1.0, 3.0, 2.0, 4.0]);

        seen.clear();
        visit_any(&args, Order::RowMajor, |v| {
            seen.push(v.value.as_number().unwrap());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_error_aborts() {
        let locale = Locale::en_us();
        let error = CellError::new(ErrorKind::NotAvailable);
        let args = vec![range(vec![vec![1.0.into()], vec![error.clone().into()]])];
        let sum = reduce_numbers(&args, &locale, 0.0, |a, n| a + n);
        assert_eq!(sum, Err(error.into()));
    }

    #[test]
    fn test_visit_all_includes_errors() {
        let args = vec![range(vec![vec![Value::error(ErrorKind::Generic), Value::Empty]])];
        let mut count = 0;
        visit_all(&args, Order::ColumnMajor, |_| {
            count += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(count, 2);
        assert!(reduce_any(&args, 0, |n, _| Ok(n + 1)).is_err());
    }
}
