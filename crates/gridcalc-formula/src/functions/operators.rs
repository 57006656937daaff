//! Operators, registered as hidden functions so they vectorize and coerce
//! like any other call

use std::cmp::Ordering;

use gridcalc_core::{CellResult, Value};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{Arg, ArgDef, ArgType::*, FunctionOutput, ReturnFormat};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let binary_number = || {
        vec![
            ArgDef::new("value1", &[Number]),
            ArgDef::new("value2", &[Number]),
        ]
    };
    let binary_any = || vec![ArgDef::new("value1", &[Any]), ArgDef::new("value2", &[Any])];

    let arithmetic: [(&str, &str, fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput>); 5] = [
        ("ADD", "Sum of two numbers.", fn_add),
        ("MINUS", "Difference of two numbers.", fn_minus),
        ("MULTIPLY", "Product of two numbers.", fn_multiply),
        ("DIVIDE", "One number divided by another.", fn_divide),
        ("POW", "A number raised to a power.", fn_pow),
    ];
    for (name, description, compute) in arithmetic {
        let def = FunctionDef::new(description, binary_number(), compute).hidden();
        let def = if name == "POW" {
            def
        } else {
            def.format(ReturnFormat::FirstArgument)
        };
        registry.add(name, def);
    }

    let comparisons: [(&str, fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput>); 6] = [
        ("EQ", fn_eq),
        ("NE", fn_ne),
        ("GT", fn_gt),
        ("GTE", fn_gte),
        ("LT", fn_lt),
        ("LTE", fn_lte),
    ];
    for (name, compute) in comparisons {
        registry.add(
            name,
            FunctionDef::new("Compares two values.", binary_any(), compute).hidden(),
        );
    }

    registry.add(
        "UMINUS",
        FunctionDef::new(
            "A number with the sign reversed.",
            vec![ArgDef::new("value", &[Number])],
            fn_uminus,
        )
        .hidden()
        .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "UPLUS",
        FunctionDef::new(
            "A specified number, unchanged.",
            vec![ArgDef::new("value", &[Any])],
            fn_uplus,
        )
        .hidden()
        .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "UNARY.PERCENT",
        FunctionDef::new(
            "Value interpreted as a percentage.",
            vec![ArgDef::new("percentage", &[Number])],
            fn_unary_percent,
        )
        .hidden(),
    );
}

fn operands(args: &[Arg], ctx: &CallContext) -> FormulaResult<(f64, f64)> {
    Ok((ctx.number(&args[0])?, ctx.number(&args[1])?))
}

/// ADD operator
pub fn fn_add(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (a, b) = operands(args, ctx)?;
    Ok((a + b).into())
}

/// MINUS operator
pub fn fn_minus(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (a, b) = operands(args, ctx)?;
    Ok((a - b).into())
}

/// MULTIPLY operator
pub fn fn_multiply(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (a, b) = operands(args, ctx)?;
    Ok((a * b).into())
}

/// DIVIDE operator
pub fn fn_divide(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (a, b) = operands(args, ctx)?;
    if b == 0.0 {
        return Err(FormulaError::div_zero("The divisor must be different from zero."));
    }
    Ok((a / b).into())
}

/// POW operator
pub fn fn_pow(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (base, exponent) = operands(args, ctx)?;
    power(base, exponent).map(Into::into)
}

pub(crate) fn power(base: f64, exponent: f64) -> FormulaResult<f64> {
    if base == 0.0 && exponent < 0.0 {
        return Err(FormulaError::div_zero(
            "The function [[FUNCTION_NAME]] cannot raise 0 to a negative power.",
        ));
    }
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Err(FormulaError::evaluation(
            "The function [[FUNCTION_NAME]] expects a base and an exponent giving a real number.",
        ));
    }
    Ok(result)
}

/// Value used for an empty operand compared with `other`
fn neutral(value: &Value, other: &Value) -> Value {
    match (value, other) {
        (Value::Empty, Value::Text(_)) => Value::text(""),
        (Value::Empty, Value::Boolean(_)) => Value::Boolean(false),
        (Value::Empty, _) => Value::Number(0.0),
        (value, _) => value.clone(),
    }
}

/// Spreadsheet ordering of two values
///
/// Numbers sort before text, text before booleans; text compares without
/// regard to case. Empty takes the neutral value of the other side's type.
pub fn compare_values(a: &Value, b: &Value) -> FormulaResult<Ordering> {
    for v in [a, b] {
        if let Value::Error(e) = v {
            return Err(e.clone().into());
        }
    }
    let (a, b) = (neutral(a, b), neutral(b, a));
    let rank = |v: &Value| match v {
        Value::Number(_) => 0,
        Value::Text(_) => 1,
        _ => 2,
    };
    Ok(match (&a, &b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Text(x), Value::Text(y)) => x.as_str().to_lowercase().cmp(&y.as_str().to_lowercase()),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        _ => rank(&a).cmp(&rank(&b)),
    })
}

fn compare(args: &[Arg]) -> FormulaResult<Ordering> {
    compare_values(&args[0].to_value()?, &args[1].to_value()?)
}

/// EQ operator
pub fn fn_eq(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((compare(args)? == Ordering::Equal).into())
}

/// NE operator
pub fn fn_ne(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((compare(args)? != Ordering::Equal).into())
}

/// GT operator
pub fn fn_gt(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((compare(args)? == Ordering::Greater).into())
}

/// GTE operator
pub fn fn_gte(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((compare(args)? != Ordering::Less).into())
}

/// LT operator
pub fn fn_lt(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((compare(args)? == Ordering::Less).into())
}

/// LTE operator
pub fn fn_lte(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((compare(args)? != Ordering::Greater).into())
}

/// UMINUS operator
pub fn fn_uminus(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((-ctx.number(&args[0])?).into())
}

/// UPLUS operator
pub fn fn_uplus(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let value = args[0].to_result()?;
    if let Value::Error(e) = value.value {
        return Err(e.into());
    }
    Ok(FunctionOutput::Value(CellResult::new(value.value)))
}

/// UNARY.PERCENT operator
pub fn fn_unary_percent(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok((ctx.number(&args[0])? / 100.0).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{error_kind, eval, eval_with};
    use gridcalc_core::ErrorKind;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arithmetic_coerces_text() {
        assert_eq!(eval("=\"3\"+2"), Value::Number(5.0));
        assert_eq!(eval("=TRUE*4"), Value::Number(4.0));
        assert_eq!(error_kind(&eval("=\"abc\"+1")), Some(ErrorKind::Generic));
        assert_eq!(error_kind(&eval("=5/0")), Some(ErrorKind::DivisionByZero));
        assert_eq!(error_kind(&eval("=(-8)^0.5")), Some(ErrorKind::Generic));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("=1<2"), Value::Boolean(true));
        assert_eq!(eval("=\"abc\"=\"ABC\""), Value::Boolean(true));
        assert_eq!(eval("=\"b\">\"a\""), Value::Boolean(true));
        assert_eq!(eval("=1<\"a\""), Value::Boolean(true));
        assert_eq!(eval("=\"z\"<TRUE"), Value::Boolean(true));
        assert_eq!(eval("=FALSE<TRUE"), Value::Boolean(true));
        assert_eq!(eval("=1<>1"), Value::Boolean(false));
    }

    #[test]
    fn test_empty_takes_neutral_value() {
        assert_eq!(eval_with(&[], "=A1=0"), Value::Boolean(true));
        assert_eq!(eval_with(&[], "=A1=\"\""), Value::Boolean(true));
        assert_eq!(eval_with(&[], "=A1=FALSE"), Value::Boolean(true));
    }

    #[test]
    fn test_compare_propagates_errors() {
        let error = gridcalc_core::CellError::new(ErrorKind::NotAvailable);
        assert_eq!(
            compare_values(&Value::Error(error.clone()), &Value::Number(1.0)),
            Err(error.into())
        );
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("=-\"2\""), Value::Number(-2.0));
        assert_eq!(eval("=+\"abc\""), Value::text("abc"));
        assert_eq!(eval("=25%"), Value::Number(0.25));
    }
}
