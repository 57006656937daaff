//! Lookup and reference functions

use gridcalc_core::{CellResult, Matrix, Value};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{Any, Boolean, Number, Range, RangeAny},
    FunctionOutput, RangeArg,
};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;
use crate::search::{dichotomic_search, linear_search, SearchMode, SortOrder};

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry.add(
        "CHOOSE",
        FunctionDef::new(
            "An element from a list of choices based on index.",
            vec![
                ArgDef::new("index", &[Number]),
                ArgDef::new("choice1", &[Any, RangeAny]),
                ArgDef::new("choice2", &[Any, RangeAny]).repeating(),
            ],
            fn_choose,
        )
        .matrix_result(),
    );
    registry.add(
        "COLUMN",
        FunctionDef::new(
            "Column number of a specified cell.",
            vec![ArgDef::new("cell_reference", &[Range]).optional()],
            fn_column,
        ),
    );
    registry.add(
        "COLUMNS",
        FunctionDef::new(
            "Number of columns in a specified array or range.",
            vec![ArgDef::new("range", &[Range])],
            |args, _| Ok((args[0].expect_range()?.width() as f64).into()),
        ),
    );
    registry.add(
        "ROW",
        FunctionDef::new(
            "Row number of a specified cell.",
            vec![ArgDef::new("cell_reference", &[Range]).optional()],
            fn_row,
        ),
    );
    registry.add(
        "ROWS",
        FunctionDef::new(
            "Number of rows in a specified array or range.",
            vec![ArgDef::new("range", &[Range])],
            |args, _| Ok((args[0].expect_range()?.height() as f64).into()),
        ),
    );

    let table_lookup = |description: &'static str, index_name: &'static str, horizontal: bool| {
        FunctionDef::new(
            description,
            vec![
                ArgDef::new("search_key", &[Any]),
                ArgDef::new("range", &[Range]),
                ArgDef::new(index_name, &[Number]),
                ArgDef::new("is_sorted", &[Boolean]).default_value(true),
            ],
            move |args, ctx| fn_table_lookup(args, ctx, horizontal),
        )
    };
    registry.add(
        "HLOOKUP",
        table_lookup("Horizontal lookup", "index", true),
    );
    registry.add(
        "VLOOKUP",
        table_lookup("Vertical lookup.", "index", false),
    );

    registry.add(
        "INDEX",
        FunctionDef::new(
            "Returns the content of a cell, specified by row and column offset.",
            vec![
                ArgDef::new("reference", &[Range]),
                ArgDef::new("row", &[Number]).default_value(0.0),
                ArgDef::new("column", &[Number]).default_value(0.0),
            ],
            fn_index,
        )
        .matrix_result(),
    );
    registry.add(
        "LOOKUP",
        FunctionDef::new(
            "Look up a value.",
            vec![
                ArgDef::new("search_key", &[Any]),
                ArgDef::new("search_array", &[Range]),
                ArgDef::new("result_range", &[Range]).optional(),
            ],
            fn_lookup,
        ),
    );
    registry.add(
        "MATCH",
        FunctionDef::new(
            "Position of item in range that matches value.",
            vec![
                ArgDef::new("search_key", &[Any]),
                ArgDef::new("range", &[Range]),
                ArgDef::new("search_type", &[Number]).default_value(1.0),
            ],
            fn_match,
        ),
    );
    registry.add(
        "XLOOKUP",
        FunctionDef::new(
            "Search a range for a match and return the corresponding item from a second range.",
            vec![
                ArgDef::new("search_key", &[Any]),
                ArgDef::new("lookup_range", &[Range]),
                ArgDef::new("return_range", &[Range]),
                ArgDef::new("if_not_found", &[Any]).optional(),
                ArgDef::new("match_mode", &[Number]).default_value(0.0),
                ArgDef::new("search_mode", &[Number]).default_value(1.0),
            ],
            fn_xlookup,
        )
        .matrix_result(),
    );
}

fn not_found(key: &Value) -> FormulaError {
    FormulaError::not_available(format!(
        "Did not find value '{}' in [[FUNCTION_NAME]] evaluation.",
        key
    ))
}

/// One-based position argument as a zero-based index below `len`
fn position(arg: &Arg, ctx: &CallContext, len: usize, what: &str) -> FormulaResult<usize> {
    let n = ctx.integer(arg)?;
    if n < 1 || n as usize > len {
        return Err(FormulaError::evaluation(format!(
            "Function [[FUNCTION_NAME]] expects {} to be between 1 and {}.",
            what, len
        )));
    }
    Ok(n as usize - 1)
}

/// CHOOSE function
pub fn fn_choose(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let choices = &args[1..];
    let index = position(&args[0], ctx, choices.len(), "index")?;
    Ok(match &choices[index] {
        Arg::Range(range) if range.width() * range.height() != 1 => range.to_matrix()?.into(),
        choice => choice.to_result()?.into(),
    })
}

fn reference_origin(args: &[Arg], ctx: &CallContext) -> FormulaResult<(u32, u16)> {
    match args.first() {
        None | Some(Arg::Missing) => Ok((ctx.cell().row, ctx.cell().col)),
        Some(arg) => {
            let range = arg.expect_range()?;
            let (_, zone) = range.zone().ok_or_else(|| {
                FormulaError::argument("Function [[FUNCTION_NAME]] expects a reference to cells.")
            })?;
            Ok((zone.start.row, zone.start.col))
        }
    }
}

/// COLUMN function
pub fn fn_column(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (_, col) = reference_origin(args, ctx)?;
    Ok((col as f64 + 1.0).into())
}

/// ROW function
pub fn fn_row(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let (row, _) = reference_origin(args, ctx)?;
    Ok((row as f64 + 1.0).into())
}

/// Search the first row (`horizontal`) or first column of `range`
fn search_line(
    range: &RangeArg,
    key: &Value,
    horizontal: bool,
    sorted: bool,
) -> FormulaResult<Option<usize>> {
    let len = if horizontal { range.width() } else { range.height() };
    let value_at = |i: usize| vector_value(range, horizontal, i);
    if sorted {
        dichotomic_search(len, value_at, key, SearchMode::NextSmaller, SortOrder::Ascending)
    } else {
        linear_search(len, value_at, key, SearchMode::Strict, false)
    }
}

fn fn_table_lookup(args: &[Arg], ctx: &CallContext, horizontal: bool) -> FormulaResult<FunctionOutput> {
    let key = args[0].to_value()?;
    let range = args[1].expect_range()?;
    let depth = if horizontal { range.height() } else { range.width() };
    let offset = position(&args[2], ctx, depth, "index")?;
    let sorted = ctx.boolean(&args[3])?;

    let found = search_line(range, &key, horizontal, sorted)?.ok_or_else(|| not_found(&key))?;
    let (col, row) = if horizontal { (found, offset) } else { (offset, found) };
    Ok(range.get(col, row)?.into())
}

/// INDEX function
///
/// A row or column of 0 selects the whole column or row.
pub fn fn_index(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let range = args[0].expect_range()?;
    let mut row = ctx.integer(&args[1])?;
    let mut col = ctx.integer(&args[2])?;
    if range.height() == 1 && col == 0 && row > 0 && range.width() > 1 {
        std::mem::swap(&mut row, &mut col);
    }
    if row < 0 || col < 0 || row as usize > range.height() || col as usize > range.width() {
        return Err(FormulaError::InvalidReference(
            "Index out of range.".to_string(),
        ));
    }

    let (row, col) = (row as usize, col as usize);
    match (row, col) {
        (0, 0) => Ok(range.to_matrix()?.into()),
        (0, c) => {
            let column = (0..range.height())
                .map(|r| range.get(c - 1, r))
                .collect::<FormulaResult<Vec<_>>>()?;
            Ok(single_or_matrix(Matrix::from_columns(vec![column])?))
        }
        (r, 0) => {
            let line = (0..range.width())
                .map(|c| range.get(c, r - 1))
                .collect::<FormulaResult<Vec<_>>>()?;
            Ok(single_or_matrix(Matrix::from_rows(vec![line])?))
        }
        (r, c) => Ok(range.get(c - 1, r - 1)?.into()),
    }
}

fn single_or_matrix(matrix: Matrix<CellResult>) -> FunctionOutput {
    match matrix.get(0, 0) {
        Some(value) if matrix.is_single() => value.clone().into(),
        _ => matrix.into(),
    }
}

/// LOOKUP function
///
/// Searches the first row of a wide array or the first column otherwise,
/// assuming sorted data, and returns from the last row or column or from
/// `result_range`.
pub fn fn_lookup(args: &[Arg], _ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let key = args[0].to_value()?;
    let search = args[1].expect_range()?;
    let horizontal = search.width() > search.height();
    let found = search_line(search, &key, horizontal, true)?.ok_or_else(|| not_found(&key))?;

    match args.get(2).and_then(Arg::as_range) {
        Some(result) => {
            if result.width() != 1 && result.height() != 1 {
                return Err(FormulaError::argument(
                    "Function [[FUNCTION_NAME]] expects result_range to be a single row or column.",
                ));
            }
            let (col, row) = if result.height() == 1 { (found, 0) } else { (0, found) };
            if col >= result.width() || row >= result.height() {
                return Err(not_found(&key));
            }
            Ok(result.get(col, row)?.into())
        }
        None if horizontal => Ok(search.get(found, search.height() - 1)?.into()),
        None => Ok(search.get(search.width() - 1, found)?.into()),
    }
}

/// Values of a single row or column, with its orientation
fn vector(range: &RangeArg, name: &str) -> FormulaResult<(usize, bool)> {
    if range.width() != 1 && range.height() != 1 {
        return Err(FormulaError::argument(format!(
            "Function [[FUNCTION_NAME]] expects {} to be a single row or column.",
            name
        )));
    }
    let horizontal = range.height() == 1 && range.width() > 1;
    let len = if horizontal { range.width() } else { range.height() };
    Ok((len, horizontal))
}

fn vector_value(range: &RangeArg, horizontal: bool, i: usize) -> FormulaResult<Value> {
    let (col, row) = if horizontal { (i, 0) } else { (0, i) };
    Ok(range.get(col, row)?.value)
}

/// MATCH function
pub fn fn_match(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let key = args[0].to_value()?;
    let range = args[1].expect_range()?;
    let (len, horizontal) = vector(range, "range")?;
    let value_at = |i| vector_value(range, horizontal, i);

    let search_type = ctx.number(&args[2])?;
    let found = if search_type > 0.0 {
        dichotomic_search(len, value_at, &key, SearchMode::NextSmaller, SortOrder::Ascending)?
    } else if search_type < 0.0 {
        dichotomic_search(len, value_at, &key, SearchMode::NextGreater, SortOrder::Descending)?
    } else {
        linear_search(len, value_at, &key, SearchMode::Strict, false)?
    };
    let found = found.ok_or_else(|| not_found(&key))?;
    Ok((found as f64 + 1.0).into())
}

/// XLOOKUP function
///
/// Match modes: 0 exact, -1 exact or next smaller, 1 exact or next larger,
/// 2 wildcard. Search modes: 1 first to last, -1 last to first, 2 binary
/// over ascending data, -2 binary over descending data.
pub fn fn_xlookup(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let key = args[0].to_value()?;
    let lookup = args[1].expect_range()?;
    let returned = args[2].expect_range()?;
    let (len, horizontal) = vector(lookup, "lookup_range")?;

    let matching = if horizontal { returned.width() } else { returned.height() };
    if matching != len {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects return_range to have the same size as lookup_range.",
        ));
    }

    let mode = match ctx.integer(&args[4])? {
        0 => SearchMode::Strict,
        -1 => SearchMode::NextSmaller,
        1 => SearchMode::NextGreater,
        2 => SearchMode::Wildcard,
        _ => {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] expects match_mode to be 0, -1, 1 or 2.",
            ))
        }
    };
    let value_at = |i| vector_value(lookup, horizontal, i);
    let found = match ctx.integer(&args[5])? {
        1 => linear_search(len, value_at, &key, mode, false)?,
        -1 => linear_search(len, value_at, &key, mode, true)?,
        2 if mode != SearchMode::Wildcard => {
            dichotomic_search(len, value_at, &key, mode, SortOrder::Ascending)?
        }
        -2 if mode != SearchMode::Wildcard => {
            dichotomic_search(len, value_at, &key, mode, SortOrder::Descending)?
        }
        2 | -2 => {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] does not support wildcard matching with a binary search.",
            ))
        }
        _ => {
            return Err(FormulaError::evaluation(
                "Function [[FUNCTION_NAME]] expects search_mode to be 1, -1, 2 or -2.",
            ))
        }
    };

    let Some(found) = found else {
        return match &args[3] {
            Arg::Missing => Err(not_found(&key)),
            fallback => Ok(fallback.to_result()?.into()),
        };
    };
    let result = if horizontal {
        let column = (0..returned.height())
            .map(|row| returned.get(found, row))
            .collect::<FormulaResult<Vec<_>>>()?;
        Matrix::from_columns(vec![column])?
    } else {
        let line = (0..returned.width())
            .map(|col| returned.get(col, found))
            .collect::<FormulaResult<Vec<_>>>()?;
        Matrix::from_rows(vec![line])?
    };
    Ok(single_or_matrix(result))
}
