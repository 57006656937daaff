//! Statistical functions

use gridcalc_core::{CellResult, Locale, Matrix, Value};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{Any, Boolean, Number, Range, RangeAny, RangeNumber},
    FunctionOutput, Order, RangeArg, ReturnFormat,
};
use crate::coerce::to_number;
use crate::criteria::visit_matching_ranges;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;
use crate::kernels::regression::polynomial_columns;
use crate::kernels::{centile, linear_regression, polynomial_regression, sorted_numbers, Fit};
use crate::reduce::{collect_numbers, reduce_numbers, visit_all};

type Compute = fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput>;

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
    let paired = || {
        vec![
            ArgDef::new("data_y", &[RangeNumber]),
            ArgDef::new("data_x", &[RangeNumber]),
        ]
    };

    let aggregates: [(&str, &str, Compute, bool); 9] = [
        ("AVERAGE", "Numerical average value in a dataset, ignoring text.", fn_average, true),
        ("AVERAGEA", "Numerical average value in a dataset.", fn_averagea, true),
        ("MAX", "Maximum value in a numeric dataset.", fn_max, true),
        ("MAXA", "Maximum numeric value in a dataset.", fn_maxa, true),
        ("MIN", "Minimum value in a numeric dataset.", fn_min, true),
        ("MINA", "Minimum numeric value in a dataset.", fn_mina, true),
        ("MEDIAN", "Median value in a numeric dataset.", fn_median, true),
        ("COUNT", "The number of numeric values in dataset.", fn_count, false),
        ("COUNTA", "The number of values in a dataset.", fn_counta, false),
    ];
    for (name, description, compute, keeps_format) in aggregates {
        let args = match name {
            "AVERAGE" | "MAX" | "MIN" | "MEDIAN" => numbers(),
            _ => values(),
        };
        let def = FunctionDef::new(description, args, compute);
        registry.add(
            name,
            if keeps_format {
                def.format(ReturnFormat::FirstArgument)
            } else {
                def
            },
        );
    }

    let variances: [(&str, &str, bool, bool); 10] = [
        ("VAR", "Variance.", true, false),
        ("VAR.S", "Variance.", true, false),
        ("VAR.P", "Variance of entire population.", false, false),
        ("VARP", "Variance of entire population.", false, false),
        ("STDEV", "Standard deviation.", true, true),
        ("STDEV.S", "Standard deviation.", true, true),
        ("STDEV.P", "Standard deviation of entire population.", false, true),
        ("STDEVP", "Standard deviation of entire population.", false, true),
        ("STDEVA", "Standard deviation, counting text and booleans.", true, true),
        ("VARA", "Variance, counting text and booleans.", true, false),
    ];
    for (name, description, sample, root) in variances {
        let all_values = name.ends_with('A');
        registry.add(
            name,
            FunctionDef::new(
                description,
                if all_values { values() } else { numbers() },
                move |args, ctx| {
                    let data = if all_values {
                        a_numbers(args, ctx.locale())?
                    } else {
                        collect_numbers(args, ctx.locale())?
                    };
                    dispersion(&data, sample, root)
                },
            ),
        );
    }

    registry.add(
        "AVERAGEIF",
        FunctionDef::new(
            "Average of values depending on criteria.",
            vec![
                ArgDef::new("criteria_range", &[Range]),
                ArgDef::new("criterion", &[Any]),
                ArgDef::new("average_range", &[Range]).optional(),
            ],
            fn_averageif,
        ),
    );
    let ifs: [(&str, &str, &str, Compute); 3] = [
        ("AVERAGEIFS", "Average of values depending on multiple criteria.", "average_range", fn_averageifs),
        ("MAXIFS", "Returns the maximum value in a range of cells, filtered by a set of criteria.", "range", fn_maxifs),
        ("MINIFS", "Returns the minimum value in a range of cells, filtered by a set of criteria.", "range", fn_minifs),
    ];
    for (name, description, first, compute) in ifs {
        let mut args = vec![ArgDef::new(first, &[Range])];
        args.extend(criteria_pairs());
        registry.add(name, FunctionDef::new(description, args, compute));
    }

    let nth = |description: &'static str, compute: Compute| {
        FunctionDef::new(
            description,
            vec![
                ArgDef::new("data", &[Number, RangeNumber]),
                ArgDef::new("n", &[Number]),
            ],
            compute,
        )
        .format(ReturnFormat::FirstArgument)
    };
    registry.add("LARGE", nth("Nth largest element from a data set.", fn_large));
    registry.add("SMALL", nth("Nth smallest element in a data set.", fn_small));

    let centiles: [(&str, &str, bool); 3] = [
        ("PERCENTILE", "Value at a given percentile of a dataset.", true),
        ("PERCENTILE.INC", "Value at a given percentile of a dataset.", true),
        ("PERCENTILE.EXC", "Value at a given percentile of a dataset exclusive of 0 and 1.", false),
    ];
    for (name, description, inclusive) in centiles {
        registry.add(
            name,
            FunctionDef::new(
                description,
                vec![
                    ArgDef::new("data", &[Number, RangeNumber]),
                    ArgDef::new("percentile", &[Number]),
                ],
                move |args, ctx| {
                    let percent = ctx.number(&args[1])?;
                    Ok(centile(&args[..1], percent, inclusive, ctx.locale())?.into())
                },
            )
            .format(ReturnFormat::FirstArgument),
        );
    }
    let quartiles: [(&str, &str, bool); 3] = [
        ("QUARTILE", "Value nearest to a specified quartile of a dataset.", true),
        ("QUARTILE.INC", "Value nearest to a specified quartile of a dataset.", true),
        ("QUARTILE.EXC", "Value nearest to a specified quartile of a dataset exclusive of 0 and 4.", false),
    ];
    for (name, description, inclusive) in quartiles {
        registry.add(
            name,
            FunctionDef::new(
                description,
                vec![
                    ArgDef::new("data", &[Number, RangeNumber]),
                    ArgDef::new("quartile_number", &[Number]),
                ],
                move |args, ctx| fn_quartile(args, ctx, inclusive),
            )
            .format(ReturnFormat::FirstArgument),
        );
    }

    let ranks: [(&str, &str, bool); 3] = [
        ("RANK", "Returns the rank of a specified value in a dataset.", false),
        ("RANK.EQ", "Returns the rank of a specified value in a dataset.", false),
        ("RANK.AVG", "Returns the rank of a specified value in a dataset, averaging ties.", true),
    ];
    for (name, description, average_ties) in ranks {
        registry.add(
            name,
            FunctionDef::new(
                description,
                vec![
                    ArgDef::new("value", &[Number]),
                    ArgDef::new("data", &[RangeNumber]),
                    ArgDef::new("is_ascending", &[Boolean]).default_value(false),
                ],
                move |args, ctx| fn_rank(args, ctx, average_ties),
            ),
        );
    }

    let pairwise: [(&str, &str, fn(&Moments) -> FormulaResult<f64>); 7] = [
        ("CORREL", "Pearson correlation coefficient of a dataset.", Moments::correlation),
        ("PEARSON", "Pearson correlation coefficient of a dataset.", Moments::correlation),
        ("COVAR", "The covariance of a dataset.", Moments::covariance),
        ("SLOPE", "Slope of the linear regression of a dataset.", Moments::slope),
        ("INTERCEPT", "Intercept of the linear regression of a dataset.", Moments::intercept),
        ("RSQ", "Square of the correlation coefficient.", |m| Ok(m.correlation()?.powi(2))),
        ("STEYX", "Standard error of the predicted y-values in a regression.", Moments::standard_error),
    ];
    for (name, description, statistic) in pairwise {
        registry.add(
            name,
            FunctionDef::new(description, paired(), move |args, _ctx| {
                let (y, x) = paired_numbers(&args[0], &args[1])?;
                Ok(statistic(&Moments::new(&y, &x)?)?.into())
            }),
        );
    }
    registry.add(
        "FORECAST",
        FunctionDef::new(
            "Calculates the expected y-value for a specified x based on a linear regression of a dataset.",
            vec![
                ArgDef::new("x", &[Number]),
                ArgDef::new("data_y", &[RangeNumber]),
                ArgDef::new("data_x", &[RangeNumber]),
            ],
            fn_forecast,
        ),
    );

    let estimates = |description: &'static str, exponential: bool| {
        FunctionDef::new(
            description,
            vec![
                ArgDef::new("known_data_y", &[RangeNumber]),
                ArgDef::new("known_data_x", &[RangeNumber]).optional(),
                ArgDef::new("calculate_b", &[Boolean]).default_value(true),
                ArgDef::new("verbose", &[Boolean]).default_value(false),
            ],
            move |args, ctx| fn_estimate(args, ctx, exponential),
        )
        .matrix_result()
    };
    registry.add(
        "LINEST",
        estimates("Given partial data about a linear trend, calculates various parameters about the ideal linear trend using the least-squares method.", false),
    );
    registry.add(
        "LOGEST",
        estimates("Given partial data about an exponential growth curve, calculates various parameters about the best fit ideal exponential growth curve.", true),
    );

    let predictions = |description: &'static str, exponential: bool| {
        FunctionDef::new(
            description,
            vec![
                ArgDef::new("known_data_y", &[RangeNumber]),
                ArgDef::new("known_data_x", &[RangeNumber]).optional(),
                ArgDef::new("new_data_x", &[Number, RangeNumber]).optional(),
                ArgDef::new("b", &[Boolean]).default_value(true),
            ],
            move |args, ctx| fn_predict(args, ctx, exponential),
        )
        .matrix_result()
    };
    registry.add(
        "TREND",
        predictions("Fits points to linear trend derived via least-squares.", false),
    );
    registry.add(
        "GROWTH",
        predictions("Fits points to exponential growth trend.", true),
    );

    registry.add(
        "POLYFIT.COEFFS",
        FunctionDef::new(
            "Compute the coefficients of polynomial regression of the dataset.",
            vec![
                ArgDef::new("data_y", &[RangeNumber]),
                ArgDef::new("data_x", &[RangeNumber]),
                ArgDef::new("order", &[Number]),
                ArgDef::new("intercept", &[Boolean]).default_value(true),
            ],
            fn_polyfit_coeffs,
        )
        .matrix_result(),
    );
    registry.add(
        "POLYFIT.FORECAST",
        FunctionDef::new(
            "Predict value by computing a polynomial regression of the dataset.",
            vec![
                ArgDef::new("x", &[Number]),
                ArgDef::new("data_y", &[RangeNumber]),
                ArgDef::new("data_x", &[RangeNumber]),
                ArgDef::new("order", &[Number]),
                ArgDef::new("intercept", &[Boolean]).default_value(true),
            ],
            fn_polyfit_forecast,
        ),
    );
}

fn div_zero() -> FormulaError {
    FormulaError::div_zero("Evaluation of function [[FUNCTION_NAME]] caused a divide by zero error.")
}

fn mean(numbers: &[f64]) -> FormulaResult<f64> {
    if numbers.is_empty() {
        return Err(div_zero());
    }
    Ok(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn variance(numbers: &[f64], sample: bool) -> FormulaResult<f64> {
    let n = numbers.len();
    let divisor = if sample { n.saturating_sub(1) } else { n };
    if divisor == 0 {
        return Err(div_zero());
    }
    let m = mean(numbers)?;
    let squares: f64 = numbers.iter().map(|x| (x - m).powi(2)).sum();
    Ok(squares / divisor as f64)
}

/// Variance, or standard deviation when `root`
pub(super) fn dispersion(numbers: &[f64], sample: bool, root: bool) -> FormulaResult<FunctionOutput> {
    let v = variance(numbers, sample)?;
    Ok(if root { v.sqrt() } else { v }.into())
}

/// Numbers counting text as 0 and booleans as 0 or 1 inside ranges
fn a_numbers(args: &[Arg], locale: &Locale) -> FormulaResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            Arg::Missing => {}
            Arg::Value(v) => numbers.push(to_number(&v.value, locale)?),
            Arg::Range(range) => range.visit(Order::ColumnMajor, |_, _, v| {
                match &v.value {
                    Value::Number(n) => numbers.push(*n),
                    Value::Boolean(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
                    Value::Text(_) => numbers.push(0.0),
                    Value::Error(e) => return Err(e.clone().into()),
                    Value::Empty => {}
                }
                Ok(())
            })?,
        }
    }
    Ok(numbers)
}

fn extremum(numbers: &[f64], larger: bool) -> f64 {
    numbers
        .iter()
        .copied()
        .reduce(|a, b| if larger { a.max(b) } else { a.min(b) })
        .unwrap_or(0.0)
}

/// AVERAGE function
pub fn fn_average(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (sum, count) = reduce_numbers(args, ctx.locale(), (0.0, 0usize), |(s, c), n| (s + n, c + 1))?;
    if count == 0 {
        return Err(div_zero());
    }
    Ok((sum / count as f64).into())
}

/// AVERAGEA function
pub fn fn_averagea(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(mean(&a_numbers(args, ctx.locale())?)?.into())
}

/// MAX function
pub fn fn_max(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(extremum(&collect_numbers(args, ctx.locale())?, true).into())
}

/// MAXA function
pub fn fn_maxa(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(extremum(&a_numbers(args, ctx.locale())?, true).into())
}

/// MIN function
pub fn fn_min(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(extremum(&collect_numbers(args, ctx.locale())?, false).into())
}

/// MINA function
pub fn fn_mina(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(extremum(&a_numbers(args, ctx.locale())?, false).into())
}

/// MEDIAN function
pub fn fn_median(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(centile(args, 0.5, true, ctx.locale())?.into())
}

/// COUNT function
///
/// Scalars count when they convert to a number; range elements only when
/// they are numbers. Errors are not counted and do not propagate.
pub fn fn_count(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut count = 0.0;
    for arg in args {
        match arg {
            Arg::Missing => {}
            Arg::Value(v) => {
                let counts = match &v.value {
                    Value::Empty | Value::Error(_) => false,
                    value => to_number(value, ctx.locale()).is_ok(),
                };
                if counts {
                    count += 1.0;
                }
            }
            Arg::Range(range) => range.visit(Order::ColumnMajor, |_, _, v| {
                if v.value.is_number() {
                    count += 1.0;
                }
                Ok(())
            })?,
        }
    }
    Ok(count.into())
}

/// COUNTA function
pub fn fn_counta(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let mut count = 0.0;
    visit_all(args, Order::ColumnMajor, |v| {
        if !v.value.is_empty() {
            count += 1.0;
        }
        Ok(())
    })?;
    Ok(count.into())
}

/// Numbers of `values` at the positions matching all criteria
fn matching_numbers(values: &Arg, criteria: &[Arg], ctx: &CallContext) -> FormulaResult<Vec<f64>> {
    let values = values.expect_range()?;
    let mut numbers = Vec::new();
    visit_matching_ranges(criteria, ctx.locale(), false, |col, row| {
        if col < values.width() && row < values.height() {
            match values.get(col, row)?.value {
                Value::Number(n) => numbers.push(n),
                Value::Error(e) => return Err(e.into()),
                _ => {}
            }
        }
        Ok(())
    })?;
    Ok(numbers)
}

/// AVERAGEIF function
pub fn fn_averageif(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let values = if args[2].is_missing() { &args[0] } else { &args[2] };
    Ok(mean(&matching_numbers(values, &args[..2], ctx)?)?.into())
}

/// AVERAGEIFS function
pub fn fn_averageifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(mean(&matching_numbers(&args[0], &args[1..], ctx)?)?.into())
}

/// MAXIFS function
pub fn fn_maxifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(extremum(&matching_numbers(&args[0], &args[1..], ctx)?, true).into())
}

/// MINIFS function
pub fn fn_minifs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(extremum(&matching_numbers(&args[0], &args[1..], ctx)?, false).into())
}

fn nth_element(args: &[Arg], ctx: &CallContext, largest: bool) -> FormulaResult<f64> {
    let sorted = sorted_numbers(&args[..1], ctx.locale())?;
    let n = ctx.number(&args[1])?.trunc();
    if n < 1.0 || n > sorted.len() as f64 {
        return Err(FormulaError::evaluation(format!(
            "Function [[FUNCTION_NAME]]: n must be between 1 and {}.",
            sorted.len()
        )));
    }
    let index = n as usize - 1;
    Ok(if largest {
        sorted[sorted.len() - 1 - index]
    } else {
        sorted[index]
    })
}

/// LARGE function
pub fn fn_large(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(nth_element(args, ctx, true)?.into())
}

/// SMALL function
pub fn fn_small(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(nth_element(args, ctx, false)?.into())
}

fn fn_quartile(args: &[Arg], ctx: &CallContext, inclusive: bool) -> FormulaResult<FunctionOutput> {
    let quartile = ctx.integer(&args[1])?;
    let valid = if inclusive { 0..=4 } else { 1..=3 };
    if !valid.contains(&quartile) {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] parameter 2 value is out of range.",
        ));
    }
    Ok(centile(&args[..1], quartile as f64 / 4.0, inclusive, ctx.locale())?.into())
}

fn fn_rank(args: &[Arg], ctx: &CallContext, average_ties: bool) -> FormulaResult<FunctionOutput> {
    let value = ctx.number(&args[0])?;
    let sorted = sorted_numbers(&args[1..2], ctx.locale())?;
    let ascending = ctx.boolean(&args[2])?;

    let below = sorted.partition_point(|&x| x < value);
    let through = sorted.partition_point(|&x| x <= value);
    if below == through {
        return Err(FormulaError::not_available(
            "Function [[FUNCTION_NAME]] value is not in the data set.",
        ));
    }
    let (best, worst) = if ascending {
        (below + 1, through)
    } else {
        (sorted.len() - through + 1, sorted.len() - below)
    };
    Ok(if average_ties {
        (best + worst) as f64 / 2.0
    } else {
        best as f64
    }
    .into())
}

/// Numbers at matching positions of two equally sized ranges
///
/// Positions where either side is not a number are skipped.
fn paired_numbers(y: &Arg, x: &Arg) -> FormulaResult<(Vec<f64>, Vec<f64>)> {
    let ys = y.expect_range()?.to_vector()?;
    let xs = x.expect_range()?.to_vector()?;
    if ys.len() != xs.len() {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects data_y and data_x to have the same size.",
        ));
    }
    let mut pairs = (Vec::new(), Vec::new());
    for (a, b) in ys.iter().zip(&xs) {
        match (&a.value, &b.value) {
            (Value::Error(e), _) | (_, Value::Error(e)) => return Err(e.clone().into()),
            (Value::Number(a), Value::Number(b)) => {
                pairs.0.push(*a);
                pairs.1.push(*b);
            }
            _ => {}
        }
    }
    Ok(pairs)
}

/// Centered sums of a paired dataset
#[derive(Debug, Clone, Copy)]
struct Moments {
    n: f64,
    mean_x: f64,
    mean_y: f64,
    sxx: f64,
    syy: f64,
    sxy: f64,
}

impl Moments {
    fn new(y: &[f64], x: &[f64]) -> FormulaResult<Self> {
        let mean_y = mean(y)?;
        let mean_x = mean(x)?;
        let mut moments = Moments {
            n: y.len() as f64,
            mean_x,
            mean_y,
            sxx: 0.0,
            syy: 0.0,
            sxy: 0.0,
        };
        for (a, b) in y.iter().zip(x) {
            moments.sxx += (b - mean_x).powi(2);
            moments.syy += (a - mean_y).powi(2);
            moments.sxy += (a - mean_y) * (b - mean_x);
        }
        Ok(moments)
    }

    fn covariance(&self) -> FormulaResult<f64> {
        Ok(self.sxy / self.n)
    }

    fn correlation(&self) -> FormulaResult<f64> {
        let denominator = (self.sxx * self.syy).sqrt();
        if denominator == 0.0 {
            return Err(div_zero());
        }
        Ok(self.sxy / denominator)
    }

    fn slope(&self) -> FormulaResult<f64> {
        if self.sxx == 0.0 {
            return Err(div_zero());
        }
        Ok(self.sxy / self.sxx)
    }

    fn intercept(&self) -> FormulaResult<f64> {
        Ok(self.mean_y - self.slope()? * self.mean_x)
    }

    fn standard_error(&self) -> FormulaResult<f64> {
        if self.n < 3.0 || self.sxx == 0.0 {
            return Err(div_zero());
        }
        Ok(((self.syy - self.sxy * self.sxy / self.sxx) / (self.n - 2.0)).sqrt())
    }
}

/// FORECAST function
pub fn fn_forecast(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let x = ctx.number(&args[0])?;
    let (ys, xs) = paired_numbers(&args[1], &args[2])?;
    let moments = Moments::new(&ys, &xs)?;
    Ok((moments.intercept()? + moments.slope()? * x).into())
}

fn not_a_number() -> FormulaError {
    FormulaError::argument("Function [[FUNCTION_NAME]] expects number values.")
}

/// Every element of a range as a number, in row-major order
fn strict_numbers(range: &RangeArg) -> FormulaResult<Vec<f64>> {
    range
        .to_vector()?
        .into_iter()
        .map(|v| match v.value {
            Value::Number(n) => Ok(n),
            Value::Error(e) => Err(e.into()),
            _ => Err(not_a_number()),
        })
        .collect()
}

fn logarithms(values: &[f64]) -> FormulaResult<Vec<f64>> {
    values
        .iter()
        .map(|&v| {
            if v > 0.0 {
                Ok(v.ln())
            } else {
                Err(FormulaError::evaluation(
                    "Function [[FUNCTION_NAME]] expects known_data_y to be positive.",
                ))
            }
        })
        .collect()
}

/// Predictor columns for the observations of `y`
///
/// Without `x` the single predictor is `1..n`. When `x` has one element per
/// observation it is a single predictor; otherwise each column (for a
/// column of `y`) or row (for a row of `y`) of `x` is a predictor.
fn predictors(y: &RangeArg, x: Option<&RangeArg>) -> FormulaResult<Vec<Vec<f64>>> {
    let n = y.width() * y.height();
    let Some(x) = x else {
        return Ok(vec![(1..=n).map(|i| i as f64).collect()]);
    };
    if x.width() * x.height() == n {
        return Ok(vec![strict_numbers(x)?]);
    }
    let values = x.to_values()?;
    let number = |col: usize, row: usize| match values.get(col, row) {
        Some(Value::Number(n)) => Ok(*n),
        Some(Value::Error(e)) => Err(e.clone().into()),
        _ => Err(not_a_number()),
    };
    if y.width() == 1 && x.height() == n {
        (0..x.width())
            .map(|col| (0..n).map(|row| number(col, row)).collect::<FormulaResult<Vec<f64>>>())
            .collect()
    } else if y.height() == 1 && x.width() == n {
        (0..x.height())
            .map(|row| (0..n).map(|col| number(col, row)).collect::<FormulaResult<Vec<f64>>>())
            .collect()
    } else {
        Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects known_data_y and known_data_x to have the same size.",
        ))
    }
}

fn fn_estimate(args: &[Arg], ctx: &CallContext, exponential: bool) -> FormulaResult<FunctionOutput> {
    let y_range = args[0].expect_range()?;
    let mut y = strict_numbers(y_range)?;
    if exponential {
        y = logarithms(&y)?;
    }
    let x = predictors(y_range, args[1].as_range())?;
    let intercept = ctx.boolean(&args[2])?;
    let verbose = ctx.boolean(&args[3])?;
    if !exponential {
        return Ok(linear_regression(&y, &x, intercept, verbose)?.into());
    }
    let mut fit = Fit::new(&y, &x, intercept)?;
    fit.coefficients = fit.coefficients.iter().map(|m| m.exp()).collect();
    fit.intercept = fit.intercept.exp();
    Ok(fit.to_matrix(verbose).into())
}

fn fn_predict(args: &[Arg], ctx: &CallContext, exponential: bool) -> FormulaResult<FunctionOutput> {
    let y_range = args[0].expect_range()?;
    let mut y = strict_numbers(y_range)?;
    if exponential {
        y = logarithms(&y)?;
    }
    let x = predictors(y_range, args[1].as_range())?;
    let intercept = ctx.boolean(&args[3])?;
    let fit = Fit::new(&y, &x, intercept)?;
    let estimate = |observation: &[f64]| {
        let v = fit.predict(observation);
        CellResult::new(if exponential { v.exp() } else { v })
    };

    let k = x.len();
    if args[2].is_missing() {
        let (width, height) = (y_range.width(), y_range.height());
        return Ok(Matrix::from_fn(width, height, |col, row| {
            let i = row * width + col;
            let observation: Vec<f64> = x.iter().map(|predictor| predictor[i]).collect();
            estimate(&observation)
        })
        .into());
    }

    let new_x = args[2].to_matrix()?.into_map(|v| v.value);
    let number = |col: usize, row: usize| match new_x.get(col, row) {
        Some(Value::Number(n)) => Ok(*n),
        Some(Value::Error(e)) => Err(FormulaError::from(e.clone())),
        _ => Err(not_a_number()),
    };
    let mut columns = Vec::new();
    if k == 1 {
        for col in 0..new_x.width() {
            let column = (0..new_x.height())
                .map(|row| Ok(estimate(&[number(col, row)?])))
                .collect::<FormulaResult<Vec<_>>>()?;
            columns.push(column);
        }
    } else if y_range.width() == 1 && new_x.width() == k {
        let column = (0..new_x.height())
            .map(|row| {
                let observation = (0..k).map(|col| number(col, row)).collect::<FormulaResult<Vec<_>>>()?;
                Ok(estimate(&observation))
            })
            .collect::<FormulaResult<Vec<_>>>()?;
        columns.push(column);
    } else if y_range.height() == 1 && new_x.height() == k {
        for col in 0..new_x.width() {
            let observation = (0..k).map(|row| number(col, row)).collect::<FormulaResult<Vec<_>>>()?;
            columns.push(vec![estimate(&observation)]);
        }
    } else {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects new_data_x to have one value per predictor.",
        ));
    }
    Ok(Matrix::from_columns(columns)?.into())
}

fn polynomial_order(arg: &Arg, ctx: &CallContext) -> FormulaResult<usize> {
    let order = ctx.integer(arg)?;
    if order < 1 {
        return Err(FormulaError::evaluation(
            "Function [[FUNCTION_NAME]] expects the order to be a positive integer.",
        ));
    }
    Ok(order as usize)
}

fn polynomial_data(y: &Arg, x: &Arg) -> FormulaResult<(Vec<f64>, Vec<f64>)> {
    let ys = strict_numbers(y.expect_range()?)?;
    let xs = strict_numbers(x.expect_range()?)?;
    if ys.len() != xs.len() {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects data_y and data_x to have the same size.",
        ));
    }
    Ok((ys, xs))
}

/// POLYFIT.COEFFS function
pub fn fn_polyfit_coeffs(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (ys, xs) = polynomial_data(&args[0], &args[1])?;
    let order = polynomial_order(&args[2], ctx)?;
    let intercept = ctx.boolean(&args[3])?;
    Ok(polynomial_regression(&ys, &xs, order, intercept, false)?.into())
}

/// POLYFIT.FORECAST function
pub fn fn_polyfit_forecast(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let x = ctx.number(&args[0])?;
    let (ys, xs) = polynomial_data(&args[1], &args[2])?;
    let order = polynomial_order(&args[3], ctx)?;
    let intercept = ctx.boolean(&args[4])?;
    let fit = Fit::new(&ys, &polynomial_columns(&xs, order), intercept)?;
    let powers: Vec<f64> = polynomial_columns(&[x], order).into_iter().map(|p| p[0]).collect();
    Ok(fit.predict(&powers).into())
}
