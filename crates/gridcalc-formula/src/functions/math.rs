//! Math functions

use ahash::AHashSet;
use gridcalc_core::Value;
use rand::Rng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use super::operators::power;
use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{Any, Number, Range, RangeAny, RangeNumber},
    FunctionOutput, Order, ReturnFormat,
};
use crate::criteria::visit_matching_ranges;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;
use crate::reduce::{reduce_numbers, visit_all};

pub(super) fn register(registry: &mut FunctionRegistry) {
    let numbers = || {
        vec![
            ArgDef::new("value1", &[Number, RangeNumber]),
            ArgDef::new("value2", &[Number, RangeNumber]).repeating(),
        ]
    };
    let values = || {
        vec![
            ArgDef::new("value1", &[Any, RangeAny]),
            ArgDef::new("value2", &[Any, RangeAny]).repeating(),
        ]
    };
    let criteria_pairs = || {
        vec![
            ArgDef::new("criteria_range1", &[Range]),
            ArgDef::new("criterion1", &[Any]),
            ArgDef::new("criteria_range2", &[Range]).repeating(),
            ArgDef::new("criterion2", &[Any]).repeating(),
        ]
    };

    registry.add(
        "SUM",
        FunctionDef::new("Sum of a series of numbers and/or cells.", numbers(), fn_sum)
            .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "PRODUCT",
        FunctionDef::new("Result of multiplying a series of numbers together.", numbers(), fn_product)
            .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "SUMSQ",
        FunctionDef::new("Sum of squares.", numbers(), fn_sumsq),
    );
    registry.add(
        "SUMPRODUCT",
        FunctionDef::new(
            "Sum of the products of corresponding entries in equal-sized ranges.",
            vec![
                ArgDef::new("range1", &[RangeNumber]),
                ArgDef::new("range2", &[RangeNumber]).repeating(),
            ],
            fn_sumproduct,
        ),
    );
    registry.add(
        "SUMIF",
        FunctionDef::new(
            "A conditional sum across a range.",
            vec![
                ArgDef::new("criteria_range", &[Range]),
                ArgDef::new("criterion", &[Any]),
                ArgDef::new("sum_range", &[Range]).optional(),
            ],
            fn_sumif,
        ),
    );
    let mut sumifs_args = vec![ArgDef::new("sum_range", &[Range])];
    sumifs_args.extend(criteria_pairs());
    registry.add(
        "SUMIFS",
        FunctionDef::new("Sums a range depending on multiple criteria.", sumifs_args, fn_sumifs),
    );
    registry.add(
        "COUNTIF",
        FunctionDef::new(
            "A conditional count across a range.",
            vec![ArgDef::new("range", &[Range]), ArgDef::new("criterion", &[Any])],
            fn_countif,
        ),
    );
    registry.add(
        "COUNTIFS",
        FunctionDef::new("Count values depending on multiple criteria.", criteria_pairs(), fn_countifs),
    );
    registry.add(
        "COUNTBLANK",
        FunctionDef::new("Number of empty values.", values(), fn_countblank),
    );
    registry.add(
        "COUNTUNIQUE",
        FunctionDef::new("Counts number of unique values in a range.", values(), fn_countunique),
    );
    let mut countuniqueifs_args = vec![ArgDef::new("range", &[Range])];
    countuniqueifs_args.extend(criteria_pairs());
    registry.add(
        "COUNTUNIQUEIFS",
        FunctionDef::new(
            "Counts number of unique values in a range, filtered by a set of criteria.",
            countuniqueifs_args,
            fn_countuniqueifs,
        ),
    );

    let unary: [(&str, &str, fn(f64) -> FormulaResult<f64>); 24] = [
        ("ABS", "Absolute value of a number.", |x| Ok(x.abs())),
        ("ACOS", "Inverse cosine of a value, in radians.", |x| domain(x, (-1.0..=1.0).contains(&x)).map(f64::acos)),
        ("ACOSH", "Inverse hyperbolic cosine of a number.", |x| domain(x, x >= 1.0).map(f64::acosh)),
        ("ASIN", "Inverse sine of a value, in radians.", |x| domain(x, (-1.0..=1.0).contains(&x)).map(f64::asin)),
        ("ASINH", "Inverse hyperbolic sine of a number.", |x| Ok(x.asinh())),
        ("ATAN", "Inverse tangent of a value, in radians.", |x| Ok(x.atan())),
        ("ATANH", "Inverse hyperbolic tangent of a number.", |x| domain(x, x > -1.0 && x < 1.0).map(f64::atanh)),
        ("COS", "Cosine of an angle provided in radians.", |x| Ok(x.cos())),
        ("COSH", "Hyperbolic cosine of any real number.", |x| Ok(x.cosh())),
        ("SIN", "Sine of an angle provided in radians.", |x| Ok(x.sin())),
        ("SINH", "Hyperbolic sine of any real number.", |x| Ok(x.sinh())),
        ("TAN", "Tangent of an angle provided in radians.", |x| Ok(x.tan())),
        ("TANH", "Hyperbolic tangent of any real number.", |x| Ok(x.tanh())),
        ("EXP", "Euler's number, e (~2.718) raised to a power.", |x| finite(x.exp())),
        ("LN", "The logarithm of a number, base e (euler's number).", |x| domain(x, x > 0.0).map(f64::ln)),
        ("LOG10", "The logarithm of a number, base 10.", |x| domain(x, x > 0.0).map(f64::log10)),
        ("SQRT", "Positive square root of a positive number.", |x| domain(x, x >= 0.0).map(f64::sqrt)),
        ("DEGREES", "Converts an angle value in radians to degrees.", |x| Ok(x.to_degrees())),
        ("RADIANS", "Converts an angle value in degrees to radians.", |x| Ok(x.to_radians())),
        ("INT", "Rounds a number down to the nearest integer.", |x| Ok(x.floor())),
        ("SIGN", "Sign of a provided number (+/-/0).", |x| Ok(if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 })),
        ("EVEN", "Rounds a number up to the nearest even integer.", |x| Ok(round_to_parity(x, 0.0))),
        ("ODD", "Rounds a number up to the nearest odd integer.", |x| Ok(round_to_parity(x, 1.0))),
        ("FACT", "Factorial of a number.", fact),
    ];
    for (name, description, f) in unary {
        registry.add(
            name,
            FunctionDef::new(description, vec![ArgDef::new("value", &[Number])], move |args, ctx| {
                Ok(f(ctx.number(&args[0])?)?.into())
            }),
        );
    }

    registry.add(
        "PI",
        FunctionDef::new("The number pi.", vec![], |_, _| Ok(std::f64::consts::PI.into())),
    );
    registry.add(
        "ATAN2",
        FunctionDef::new(
            "Angle from the X axis to a point (x,y), in radians.",
            vec![ArgDef::new("x", &[Number]), ArgDef::new("y", &[Number])],
            fn_atan2,
        ),
    );
    registry.add(
        "LOG",
        FunctionDef::new(
            "The logarithm of a number, for a given base.",
            vec![
                ArgDef::new("value", &[Number]),
                ArgDef::new("base", &[Number]).default_value(10.0),
            ],
            fn_log,
        ),
    );
    registry.add(
        "POWER",
        FunctionDef::new(
            "A number raised to a power.",
            vec![ArgDef::new("base", &[Number]), ArgDef::new("exponent", &[Number])],
            |args, ctx| Ok(power(ctx.number(&args[0])?, ctx.number(&args[1])?)?.into()),
        ),
    );
    registry.add(
        "MOD",
        FunctionDef::new(
            "Modulo (remainder) operator.",
            vec![ArgDef::new("dividend", &[Number]), ArgDef::new("divisor", &[Number])],
            fn_mod,
        )
        .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "QUOTIENT",
        FunctionDef::new(
            "Integer division.",
            vec![ArgDef::new("dividend", &[Number]), ArgDef::new("divisor", &[Number])],
            fn_quotient,
        ),
    );
    registry.add(
        "ISEVEN",
        FunctionDef::new(
            "Whether the provided value is even.",
            vec![ArgDef::new("value", &[Number])],
            |args, ctx| Ok((ctx.number(&args[0])?.trunc() % 2.0 == 0.0).into()),
        ),
    );
    registry.add(
        "ISODD",
        FunctionDef::new(
            "Whether the provided value is odd.",
            vec![ArgDef::new("value", &[Number])],
            |args, ctx| Ok((ctx.number(&args[0])?.trunc() % 2.0 != 0.0).into()),
        ),
    );

    let rounding: [(&str, &str, RoundingStrategy); 4] = [
        ("ROUND", "Rounds a number according to standard rules.", RoundingStrategy::MidpointAwayFromZero),
        ("ROUNDUP", "Rounds a number always up (away from zero).", RoundingStrategy::AwayFromZero),
        ("ROUNDDOWN", "Rounds down a number.", RoundingStrategy::ToZero),
        ("TRUNC", "Truncates a number.", RoundingStrategy::ToZero),
    ];
    for (name, description, strategy) in rounding {
        registry.add(
            name,
            FunctionDef::new(
                description,
                vec![
                    ArgDef::new("value", &[Number]),
                    ArgDef::new("places", &[Number]).default_value(0.0),
                ],
                move |args, ctx| {
                    let value = ctx.number(&args[0])?;
                    let places = ctx.integer(&args[1])?;
                    Ok(round_decimal(value, places, strategy).into())
                },
            )
            .format(ReturnFormat::FirstArgument),
        );
    }
    registry.add(
        "MROUND",
        FunctionDef::new(
            "Rounds a number to the nearest integer multiple.",
            vec![ArgDef::new("value", &[Number]), ArgDef::new("factor", &[Number])],
            fn_mround,
        )
        .format(ReturnFormat::FirstArgument),
    );

    let factor_args = || {
        vec![
            ArgDef::new("value", &[Number]),
            ArgDef::new("factor", &[Number]).default_value(1.0),
        ]
    };
    registry.add(
        "CEILING",
        FunctionDef::new("Rounds number up to nearest multiple of factor.", factor_args(), fn_ceiling)
            .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "FLOOR",
        FunctionDef::new("Rounds number down to nearest multiple of factor.", factor_args(), fn_floor)
            .format(ReturnFormat::FirstArgument),
    );
    let math_args = || {
        vec![
            ArgDef::new("number", &[Number]),
            ArgDef::new("significance", &[Number]).default_value(1.0),
            ArgDef::new("mode", &[Number]).default_value(0.0),
        ]
    };
    registry.add(
        "CEILING.MATH",
        FunctionDef::new("Rounds number up to nearest multiple of factor.", math_args(), |args, ctx| {
            round_math(args, ctx, true)
        })
        .format(ReturnFormat::FirstArgument),
    );
    registry.add(
        "FLOOR.MATH",
        FunctionDef::new("Rounds number down to nearest multiple of factor.", math_args(), |args, ctx| {
            round_math(args, ctx, false)
        })
        .format(ReturnFormat::FirstArgument),
    );

    registry.add(
        "RAND",
        FunctionDef::new("A random number between 0 inclusive and 1 exclusive.", vec![], fn_rand)
            .volatile(),
    );
    registry.add(
        "RANDBETWEEN",
        FunctionDef::new(
            "Random integer between two values, inclusive.",
            vec![ArgDef::new("low", &[Number]), ArgDef::new("high", &[Number])],
            fn_randbetween,
        )
        .volatile(),
    );
}

fn domain(x: f64, valid: bool) -> FormulaResult<f64> {
    if valid {
        Ok(x)
    } else {
        Err(FormulaError::evaluation(format!(
            "The function [[FUNCTION_NAME]] expects a value in its domain, but got {}.",
            gridcalc_core::format_number(x)
        )))
    }
}

fn finite(x: f64) -> FormulaResult<f64> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(FormulaError::evaluation(
            "The function [[FUNCTION_NAME]] result is too large.",
        ))
    }
}

fn fact(x: f64) -> FormulaResult<f64> {
    let n = domain(x, x >= 0.0)?.trunc();
    finite((1..=n as u64).fold(1.0, |acc, k| acc * k as f64))
}

fn round_to_parity(x: f64, parity: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let mut n = x.abs().ceil();
    if n % 2.0 != parity {
        n += 1.0;
    }
    sign * n
}

/// Round to `places` decimals (negative: left of the point) in decimal
/// arithmetic, so that `2.675` rounds to `2.68`
pub(crate) fn round_decimal(value: f64, places: i64, strategy: RoundingStrategy) -> f64 {
    let places = places.clamp(-28, 28);
    let Some(decimal) = Decimal::from_f64(value) else {
        return value;
    };
    let rounded = if places >= 0 {
        Some(decimal.round_dp_with_strategy(places as u32, strategy))
    } else {
        let factor = Decimal::from_i128_with_scale(10i128.pow((-places) as u32), 0);
        decimal
            .checked_div(factor)
            .map(|d| d.round_dp_with_strategy(0, strategy))
            .and_then(|d| d.checked_mul(factor))
    };
    rounded.and_then(|d| d.to_f64()).unwrap_or(value)
}

/// SUM function
pub fn fn_sum(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(reduce_numbers(args, ctx.locale(), 0.0, |acc, n| acc + n)?.into())
}

/// PRODUCT function
pub fn fn_product(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (product, count) = reduce_numbers(args, ctx.locale(), (1.0, 0usize), |(p, c), n| (p * n, c + 1))?;
    Ok(if count == 0 { 0.0 } else { product }.into())
}

/// SUMSQ function
pub fn fn_sumsq(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(reduce_numbers(args, ctx.locale(), 0.0, |acc, n| acc + n * n)?.into())
}

/// SUMPRODUCT function
pub fn fn_sumproduct(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let dimensions = args[0].dimensions();
    if args.iter().any(|a| a.dimensions() != dimensions) {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects all ranges to have the same dimensions.",
        ));
    }
    let matrices = args
        .iter()
        .map(Arg::to_matrix)
        .collect::<FormulaResult<Vec<_>>>()?;
    let (width, height) = dimensions;
    let mut sum = 0.0;
    for col in 0..width {
        for row in 0..height {
            let mut product = 1.0;
            for m in &matrices {
                match m.get(col, row).map(|v| &v.value) {
                    Some(Value::Number(n)) => product *= n,
                    Some(Value::Error(e)) => return Err(e.clone().into()),
                    _ => product = 0.0,
                }
            }
            sum += product;
        }
    }
    Ok(sum.into())
}

fn sum_matching(sum_range: &Arg, criteria: &[Arg], ctx: &CallContext) -> FormulaResult<f64> {
    let sum_range = sum_range.expect_range()?;
    let mut sum = 0.0;
    visit_matching_ranges(criteria, ctx.locale(), false, |col, row| {
        if col < sum_range.width() && row < sum_range.height() {
            match sum_range.get(col, row)?.value {
                Value::Number(n) => sum += n,
                Value::Error(e) => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    })?;
    Ok(sum)
}

/// SUMIF function
pub fn fn_sumif(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let sum_range = if args[2].is_missing() { &args[0] } else { &args[2] };
    Ok(sum_matching(sum_range, &args[..2], ctx)?.into())
}

/// SUMIFS function
pub fn fn_sumifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(sum_matching(&args[0], &args[1..], ctx)?.into())
}

fn count_matching(criteria: &[Arg], ctx: &CallContext) -> FormulaResult<f64> {
    let mut count = 0.0;
    visit_matching_ranges(criteria, ctx.locale(), false, |_, _| {
        count += 1.0;
        Ok(())
    })?;
    Ok(count)
}

/// COUNTIF function
pub fn fn_countif(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(count_matching(args, ctx)?.into())
}

/// COUNTIFS function
pub fn fn_countifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(count_matching(args, ctx)?.into())
}

/// COUNTBLANK function
pub fn fn_countblank(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut count = 0.0;
    visit_all(args, Order::ColumnMajor, |v| {
        match &v.value {
            Value::Empty => count += 1.0,
            Value::Text(s) if s.is_empty() => count += 1.0,
            _ => {}
        }
        Ok(())
    })?;
    Ok(count.into())
}

fn unique_key(value: &Value) -> Option<String> {
    match value {
        Value::Empty => None,
        Value::Text(s) if s.is_empty() => None,
        Value::Text(s) => Some(format!("t:{}", s)),
        Value::Number(n) => Some(format!("n:{}", n)),
        Value::Boolean(b) => Some(format!("b:{}", b)),
        Value::Error(e) => Some(format!("e:{}", e.kind().as_str())),
    }
}

/// COUNTUNIQUE function
pub fn fn_countunique(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut seen = AHashSet::new();
    visit_all(args, Order::ColumnMajor, |v| {
        if let Some(key) = unique_key(&v.value) {
            seen.insert(key);
        }
        Ok(())
    })?;
    Ok((seen.len() as f64).into())
}

/// COUNTUNIQUEIFS function
pub fn fn_countuniqueifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let range = args[0].expect_range()?;
    let mut seen = AHashSet::new();
    visit_matching_ranges(&args[1..], ctx.locale(), false, |col, row| {
        if col < range.width() && row < range.height() {
            if let Some(key) = unique_key(&range.get(col, row)?.value) {
                seen.insert(key);
            }
        }
        Ok(())
    })?;
    Ok((seen.len() as f64).into())
}

/// ATAN2 function
pub fn fn_atan2(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let x = ctx.number(&args[0])?;
    let y = ctx.number(&args[1])?;
    if x == 0.0 && y == 0.0 {
        return Err(FormulaError::div_zero(
            "Function [[FUNCTION_NAME]] caused a divide by zero error.",
        ));
    }
    Ok(y.atan2(x).into())
}

/// LOG function
pub fn fn_log(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let value = ctx.number(&args[0])?;
    let base = ctx.number(&args[1])?;
    domain(value, value > 0.0)?;
    domain(base, base > 0.0)?;
    if base == 1.0 {
        return Err(FormulaError::div_zero(
            "The function [[FUNCTION_NAME]] cannot use a base of 1.",
        ));
    }
    Ok((value.ln() / base.ln()).into())
}

/// MOD function
pub fn fn_mod(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let dividend = ctx.number(&args[0])?;
    let divisor = ctx.number(&args[1])?;
    if divisor == 0.0 {
        return Err(FormulaError::div_zero(
            "The divisor must be different from 0.",
        ));
    }
    let mut result = dividend % divisor;
    if result != 0.0 && (result < 0.0) != (divisor < 0.0) {
        result += divisor;
    }
    Ok(result.into())
}

/// QUOTIENT function
pub fn fn_quotient(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let dividend = ctx.number(&args[0])?;
    let divisor = ctx.number(&args[1])?;
    if divisor == 0.0 {
        return Err(FormulaError::div_zero(
            "The divisor must be different from 0.",
        ));
    }
    Ok((dividend / divisor).trunc().into())
}

/// MROUND function
pub fn fn_mround(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let value = ctx.number(&args[0])?;
    let factor = ctx.number(&args[1])?;
    if factor == 0.0 {
        return Ok(0.0.into());
    }
    if value != 0.0 && (value > 0.0) != (factor > 0.0) {
        return Err(FormulaError::evaluation(
            "The function [[FUNCTION_NAME]] expects the value and the factor to have the same sign.",
        ));
    }
    let multiples = round_decimal(value / factor, 0, RoundingStrategy::MidpointAwayFromZero);
    Ok((multiples * factor).into())
}

fn round_to_factor(args: &[Arg], ctx: &CallContext, up: bool) -> FormulaResult<FunctionOutput> {
    let value = ctx.number(&args[0])?;
    let factor = ctx.number(&args[1])?;
    if factor == 0.0 {
        return if up {
            Ok(0.0.into())
        } else {
            Err(FormulaError::div_zero("The factor must be different from 0."))
        };
    }
    if value > 0.0 && factor < 0.0 {
        return Err(FormulaError::evaluation(
            "The function [[FUNCTION_NAME]] expects the factor to be positive when the value is positive.",
        ));
    }
    let multiples = value / factor;
    let rounded = if up { multiples.ceil() } else { multiples.floor() };
    Ok((rounded * factor).into())
}

/// CEILING function
pub fn fn_ceiling(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    round_to_factor(args, ctx, true)
}

/// FLOOR function
pub fn fn_floor(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    round_to_factor(args, ctx, false)
}

fn round_math(args: &[Arg], ctx: &CallContext, up: bool) -> FormulaResult<FunctionOutput> {
    let number = ctx.number(&args[0])?;
    let significance = ctx.number(&args[1])?.abs();
    let mode = ctx.number(&args[2])?;
    if significance == 0.0 {
        return Ok(0.0.into());
    }
    let multiples = number / significance;
    let toward_zero_for_negative = mode != 0.0;
    let rounded = match (number < 0.0 && toward_zero_for_negative, up) {
        // A non-zero mode reverses the direction for negative numbers
        (true, true) => multiples.floor(),
        (true, false) => multiples.ceil(),
        (false, true) => multiples.ceil(),
        (false, false) => multiples.floor(),
    };
    Ok((rounded * significance).into())
}

/// RAND function
pub fn fn_rand(_args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(rand::thread_rng().gen::<f64>().into())
}

/// RANDBETWEEN function
pub fn fn_randbetween(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let low = ctx.number(&args[0])?.ceil();
    let high = ctx.number(&args[1])?.floor();
    if high < low {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] parameter 2 value must be greater than or equal to low.",
        ));
    }
    let value = rand::thread_rng().gen_range(low as i64..=high as i64);
    Ok((value as f64).into())
}
