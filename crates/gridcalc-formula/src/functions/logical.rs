//! Logical functions

use gridcalc_core::{ErrorKind, Value};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{Any, Boolean, RangeBoolean},
    FunctionOutput, Order,
};
use crate::coerce::to_boolean_strict;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;

type Compute = fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput>;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let logicals = || {
        vec![
            ArgDef::new("logical_expression1", &[Boolean, RangeBoolean]),
            ArgDef::new("logical_expression2", &[Boolean, RangeBoolean]).repeating(),
        ]
    };
    let combinators: [(&str, &str, Compute); 3] = [
        ("AND", "Logical `and` operator.", fn_and),
        ("OR", "Logical `or` operator.", fn_or),
        ("XOR", "Logical `xor` operator.", fn_xor),
    ];
    for (name, description, compute) in combinators {
        registry.add(name, FunctionDef::new(description, logicals(), compute));
    }

    registry.add(
        "TRUE",
        FunctionDef::new("Logical value `true`.", vec![], |_, _| Ok(true.into())),
    );
    registry.add(
        "FALSE",
        FunctionDef::new("Logical value `false`.", vec![], |_, _| Ok(false.into())),
    );
    registry.add(
        "NOT",
        FunctionDef::new(
            "Returns opposite of provided logical value.",
            vec![ArgDef::new("logical_expression", &[Boolean])],
            |args, ctx| Ok((!ctx.boolean(&args[0])?).into()),
        ),
    );
    registry.add(
        "IF",
        FunctionDef::new(
            "Returns value depending on logical expression.",
            vec![
                ArgDef::new("logical_expression", &[Boolean]),
                ArgDef::new("value_if_true", &[Any]),
                ArgDef::new("value_if_false", &[Any]).default_value(false),
            ],
            fn_if,
        ),
    );
    registry.add(
        "IFERROR",
        FunctionDef::new(
            "Value if it is not an error, otherwise 2nd argument.",
            vec![
                ArgDef::new("value", &[Any]),
                ArgDef::new("value_if_error", &[Any]).default_value(""),
            ],
            |args, _| recover(args, |_| true),
        ),
    );
    registry.add(
        "IFNA",
        FunctionDef::new(
            "Value if it is not an #N/A error, otherwise 2nd argument.",
            vec![
                ArgDef::new("value", &[Any]),
                ArgDef::new("value_if_error", &[Any]).default_value(""),
            ],
            |args, _| recover(args, |kind| kind == ErrorKind::NotAvailable),
        ),
    );
    registry.add(
        "IFS",
        FunctionDef::new(
            "Returns a value depending on multiple logical expressions.",
            vec![
                ArgDef::new("condition1", &[Boolean]),
                ArgDef::new("value1", &[Any]),
                ArgDef::new("condition2", &[Boolean]).repeating(),
                ArgDef::new("value2", &[Any]).repeating(),
            ],
            fn_ifs,
        ),
    );
    registry.add(
        "SWITCH",
        FunctionDef::new(
            "Tests an expression against a list of cases.",
            vec![
                ArgDef::new("expression", &[Any]),
                ArgDef::new("case1", &[Any]),
                ArgDef::new("value1", &[Any]),
                ArgDef::new("case_or_default", &[Any]).repeating(),
            ],
            fn_switch,
        ),
    );
}

/// Visit the logical values of the arguments
///
/// Scalars must convert to booleans; inside ranges only booleans and
/// numbers count. Fails when nothing counted.
fn visit_logicals<F>(args: &[Arg], ctx: &CallContext, mut f: F) -> FormulaResult<()>
where
    F: FnMut(bool) -> bool,
{
    let mut found = false;
    for arg in args {
        let done = match arg {
            Arg::Missing => false,
            Arg::Value(v) => {
                found = true;
                !f(to_boolean_strict(&v.value, ctx.locale())?)
            }
            Arg::Range(range) => {
                let mut stop = false;
                range.visit(Order::ColumnMajor, |_, _, v| {
                    if stop {
                        return Ok(());
                    }
                    let b = match &v.value {
                        Value::Boolean(b) => *b,
                        Value::Number(n) => *n != 0.0,
                        Value::Error(e) => return Err(e.clone().into()),
                        _ => return Ok(()),
                    };
                    found = true;
                    stop = !f(b);
                    Ok(())
                })?;
                stop
            }
        };
        if done {
            break;
        }
    }
    if !found {
        return Err(FormulaError::evaluation(
            "[[FUNCTION_NAME]] has no valid input data.",
        ));
    }
    Ok(())
}

/// AND(logical_expression1, ...)
pub fn fn_and(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut all = true;
    visit_logicals(args, ctx, |b| {
        all &= b;
        all
    })?;
    Ok(all.into())
}

/// OR(logical_expression1, ...)
pub fn fn_or(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut any = false;
    visit_logicals(args, ctx, |b| {
        any |= b;
        !any
    })?;
    Ok(any.into())
}

/// XOR(logical_expression1, ...): true for an odd number of true values
pub fn fn_xor(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut odd = false;
    visit_logicals(args, ctx, |b| {
        odd ^= b;
        true
    })?;
    Ok(odd.into())
}

/// IF(logical_expression, value_if_true, [value_if_false])
pub fn fn_if(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let branch = if ctx.boolean(&args[0])? { &args[1] } else { &args[2] };
    Ok(branch.to_result()?.into())
}

fn recover<P>(args: &[Arg], catches: P) -> FormulaResult<FunctionOutput>
where
    P: Fn(ErrorKind) -> bool,
{
    let value = args[0].to_result()?;
    match value.as_error() {
        Some(e) if catches(e.kind()) => Ok(args[1].to_result()?.into()),
        _ => Ok(value.into()),
    }
}

/// IFS(condition1, value1, ...)
pub fn fn_ifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    for pair in args.chunks(2) {
        if let [condition, value] = pair {
            if ctx.boolean(condition)? {
                return Ok(value.to_result()?.into());
            }
        }
    }
    Err(FormulaError::not_available("No match."))
}

/// SWITCH(expression, case1, value1, ..., [default])
///
/// A trailing unpaired argument is the default.
pub fn fn_switch(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let expression = args[0].to_value()?;
    if let Value::Error(e) = expression {
        return Err(e.into());
    }
    let cases = &args[1..];
    for pair in cases.chunks(2) {
        match pair {
            [case, value] => {
                if same_value(&expression, &case.to_value()?) {
                    return Ok(value.to_result()?.into());
                }
            }
            [default] => return Ok(default.to_result()?.into()),
            _ => {}
        }
    }
    Err(FormulaError::not_available(
        "No default value was specified in [[FUNCTION_NAME]] evaluation.",
    ))
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => x.as_str().to_lowercase() == y.as_str().to_lowercase(),
        (Value::Empty, Value::Number(n)) | (Value::Number(n), Value::Empty) => *n == 0.0,
        (Value::Empty, Value::Text(s)) | (Value::Text(s), Value::Empty) => s.is_empty(),
        _ => a == b,
    }
}
