//! Database functions
//!
//! A database is a range whose first row holds field names. The criteria
//! table repeats some of those names in its first row; a record is selected
//! when any criteria row holds for it, and a row holds when every non-empty
//! criterion in it does.

use std::collections::BTreeSet;

use gridcalc_core::{CellResult, Matrix, Value};

use super::math::{fn_product, fn_sum};
use super::statistical::{dispersion, fn_average, fn_count, fn_counta, fn_max, fn_min};
use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{self, Number, Range},
    FunctionOutput, RangeArg,
};
use crate::coerce::to_string;
use crate::criteria::visit_matching_ranges;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;
use crate::reduce::collect_numbers;

type Compute = fn(&[Arg], &CallContext) -> FormulaResult<FunctionOutput>;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let aggregates: [(&str, &str, Compute); 12] = [
        ("DAVERAGE", "Average of a set of values from a table-like range.", fn_average),
        ("DCOUNT", "Counts values from a table-like range.", fn_count),
        ("DCOUNTA", "Counts values and text from a table-like range.", fn_counta),
        ("DGET", "Single value from a table-like range.", fn_single),
        ("DMAX", "Maximum of values from a table-like range.", fn_max),
        ("DMIN", "Minimum of values from a table-like range.", fn_min),
        ("DPRODUCT", "Product of values from a table-like range.", fn_product),
        ("DSTDEV", "Standard deviation of population sample from table.", |args, ctx| {
            dispersion(&collect_numbers(args, ctx.locale())?, true, true)
        }),
        ("DSTDEVP", "Standard deviation of entire population from table.", |args, ctx| {
            dispersion(&collect_numbers(args, ctx.locale())?, false, true)
        }),
        ("DSUM", "Sum of values from a table-like range.", fn_sum),
        ("DVAR", "Variance of population sample from table-like range.", |args, ctx| {
            dispersion(&collect_numbers(args, ctx.locale())?, true, false)
        }),
        ("DVARP", "Variance of a population from a table-like range.", |args, ctx| {
            dispersion(&collect_numbers(args, ctx.locale())?, false, false)
        }),
    ];
    for (name, description, aggregate) in aggregates {
        registry.add(
            name,
            FunctionDef::new(
                description,
                vec![
                    ArgDef::new("database", &[Range]),
                    ArgDef::new("field", &[Number, ArgType::String]),
                    ArgDef::new("criteria", &[Range]),
                ],
                move |args, ctx| {
                    let selected = selected_values(args, ctx)?;
                    aggregate(&selected, ctx)
                },
            ),
        );
    }
}

/// DGET aggregate: the only selected value
fn fn_single(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let Some(Arg::Range(values)) = args.first() else {
        return Err(FormulaError::evaluation("No match."));
    };
    if values.height() > 1 {
        return Err(FormulaError::evaluation(
            "More than one match found in DGET evaluation.",
        ));
    }
    Ok(values.get(0, 0)?.into())
}

/// Column index of `field` in the database headers
fn field_index(database: &RangeArg, field: &Arg, ctx: &CallContext) -> FormulaResult<usize> {
    let width = database.width();
    match field.to_value()? {
        Value::Number(n) => {
            let index = n.trunc();
            if index < 1.0 || index > width as f64 {
                return Err(FormulaError::evaluation(format!(
                    "Function [[FUNCTION_NAME]] parameter 2 value is {}. Valid values are between 1 and {} inclusive.",
                    n, width
                )));
            }
            Ok(index as usize - 1)
        }
        Value::Error(e) => Err(e.into()),
        other => {
            let name = to_string(&other, ctx.locale())?;
            header_index(database, &name, ctx)?.ok_or_else(|| {
                FormulaError::evaluation(format!(
                    "The field {} must be one of the database headers.",
                    name
                ))
            })
        }
    }
}

fn header_index(database: &RangeArg, name: &str, ctx: &CallContext) -> FormulaResult<Option<usize>> {
    let name = name.to_lowercase();
    for col in 0..database.width() {
        let header = to_string(&database.get(col, 0)?.value, ctx.locale())?;
        if header.to_lowercase() == name {
            return Ok(Some(col));
        }
    }
    Ok(None)
}

/// Field values of the selected records, as a single column argument
fn selected_values<'a>(args: &[Arg<'a>], ctx: &CallContext) -> FormulaResult<Vec<Arg<'a>>> {
    let database = args[0].expect_range()?;
    let criteria = args[2].expect_range()?;
    let field = field_index(database, &args[1], ctx)?;
    let records = database.height().saturating_sub(1);

    let mut columns = Vec::with_capacity(database.width());
    for col in 0..database.width() {
        let column = (1..database.height())
            .map(|row| database.get(col, row))
            .collect::<FormulaResult<Vec<_>>>()?;
        columns.push(column);
    }

    let mut criterion_columns = Vec::with_capacity(criteria.width());
    for col in 0..criteria.width() {
        let header = to_string(&criteria.get(col, 0)?.value, ctx.locale())?;
        let index = header_index(database, &header, ctx)?.ok_or_else(|| {
            FormulaError::evaluation(format!(
                "The field {} must be one of the database headers.",
                header
            ))
        })?;
        criterion_columns.push(index);
    }

    let mut selected = BTreeSet::new();
    if criteria.height() < 2 {
        selected.extend(0..records);
    }
    for row in 1..criteria.height() {
        let mut pairs = Vec::new();
        for (col, &index) in criterion_columns.iter().enumerate() {
            let criterion = criteria.get(col, row)?;
            if criterion.value.is_empty() {
                continue;
            }
            let column = Matrix::from_columns(vec![columns[index].clone()])?;
            pairs.push(Arg::Range(RangeArg::Matrix(column)));
            pairs.push(Arg::Value(criterion));
        }
        if pairs.is_empty() {
            selected.extend(0..records);
            break;
        }
        visit_matching_ranges(&pairs, ctx.locale(), true, |_, record| {
            selected.insert(record);
            Ok(())
        })?;
    }

    if selected.is_empty() {
        return Ok(Vec::new());
    }
    let values: Vec<CellResult> = selected
        .into_iter()
        .map(|record| columns[field][record].clone())
        .collect();
    Ok(vec![Arg::Range(RangeArg::Matrix(Matrix::from_columns(vec![values])?))])
}
