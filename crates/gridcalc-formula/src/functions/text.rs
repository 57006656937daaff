//! Text functions
//!
//! Positions and lengths count characters, not bytes; positions are 1-based.

use super::{FunctionDef, FunctionRegistry};
use crate::args::{
    Arg, ArgDef,
    ArgType::{self, Any, Boolean, Number, RangeString},
    FunctionOutput, Order,
};
use crate::coerce::{to_number, to_string};
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::CallContext;
use crate::reduce::visit_any;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let strings = || {
        vec![
            ArgDef::new("string1", &[ArgType::String, RangeString]),
            ArgDef::new("string2", &[ArgType::String, RangeString]).repeating(),
        ]
    };
    let text = || ArgDef::new("text", &[ArgType::String]);

    registry.add(
        "CONCAT",
        FunctionDef::new("Concatenates elements of arrays with delimiter.", strings(), fn_concat),
    );
    registry.add(
        "CONCATENATE",
        FunctionDef::new("Appends strings to one another.", strings(), fn_concat),
    );
    registry.add(
        "JOIN",
        FunctionDef::new(
            "Concatenates elements of arrays with delimiter.",
            vec![
                ArgDef::new("delimiter", &[ArgType::String]),
                ArgDef::new("value_or_array1", &[ArgType::String, RangeString]),
                ArgDef::new("value_or_array2", &[ArgType::String, RangeString]).repeating(),
            ],
            fn_join,
        ),
    );
    registry.add(
        "TEXTJOIN",
        FunctionDef::new(
            "Combines text from multiple strings and/or arrays.",
            vec![
                ArgDef::new("delimiter", &[ArgType::String]),
                ArgDef::new("ignore_empty", &[Boolean]),
                ArgDef::new("text1", &[ArgType::String, RangeString]),
                ArgDef::new("text2", &[ArgType::String, RangeString]).repeating(),
            ],
            fn_textjoin,
        ),
    );
    registry.add(
        "EXACT",
        FunctionDef::new(
            "Tests whether two strings are identical.",
            vec![
                ArgDef::new("string1", &[ArgType::String]),
                ArgDef::new("string2", &[ArgType::String]),
            ],
            |args, ctx| Ok((ctx.string(&args[0])? == ctx.string(&args[1])?).into()),
        ),
    );

    let search_args = || {
        vec![
            ArgDef::new("search_for", &[ArgType::String]),
            ArgDef::new("text_to_search", &[ArgType::String]),
            ArgDef::new("starting_at", &[Number]).default_value(1.0),
        ]
    };
    registry.add(
        "FIND",
        FunctionDef::new(
            "First position of string found in text, case-sensitive.",
            search_args(),
            |args, ctx| find(args, ctx, true),
        ),
    );
    registry.add(
        "SEARCH",
        FunctionDef::new(
            "First position of string found in text, ignoring case.",
            search_args(),
            |args, ctx| find(args, ctx, false),
        ),
    );

    registry.add(
        "LEFT",
        FunctionDef::new(
            "Substring from beginning of specified string.",
            vec![text(), ArgDef::new("number_of_characters", &[Number]).default_value(1.0)],
            fn_left,
        ),
    );
    registry.add(
        "RIGHT",
        FunctionDef::new(
            "A substring from the end of a specified string.",
            vec![text(), ArgDef::new("number_of_characters", &[Number]).default_value(1.0)],
            fn_right,
        ),
    );
    registry.add(
        "MID",
        FunctionDef::new(
            "A segment of a string.",
            vec![
                text(),
                ArgDef::new("starting_at", &[Number]),
                ArgDef::new("extract_length", &[Number]),
            ],
            fn_mid,
        ),
    );
    registry.add(
        "REPLACE",
        FunctionDef::new(
            "Replaces part of a text string with different text.",
            vec![
                text(),
                ArgDef::new("position", &[Number]),
                ArgDef::new("length", &[Number]),
                ArgDef::new("new_text", &[ArgType::String]),
            ],
            fn_replace,
        ),
    );
    registry.add(
        "SUBSTITUTE",
        FunctionDef::new(
            "Replaces existing text with new text in a string.",
            vec![
                ArgDef::new("text_to_search", &[ArgType::String]),
                ArgDef::new("search_for", &[ArgType::String]),
                ArgDef::new("replace_with", &[ArgType::String]),
                ArgDef::new("occurrence_number", &[Number]).optional(),
            ],
            fn_substitute,
        ),
    );
    registry.add(
        "REPT",
        FunctionDef::new(
            "Returns specified text repeated a number of times.",
            vec![text(), ArgDef::new("number_of_replications", &[Number])],
            fn_rept,
        ),
    );

    registry.add(
        "LEN",
        FunctionDef::new("Length of a string.", vec![text()], |args, ctx| {
            Ok((ctx.string(&args[0])?.chars().count() as f64).into())
        }),
    );
    registry.add(
        "LOWER",
        FunctionDef::new("Converts a specified string to lowercase.", vec![text()], |args, ctx| {
            Ok(ctx.string(&args[0])?.to_lowercase().into())
        }),
    );
    registry.add(
        "UPPER",
        FunctionDef::new("Converts a specified string to uppercase.", vec![text()], |args, ctx| {
            Ok(ctx.string(&args[0])?.to_uppercase().into())
        }),
    );
    registry.add(
        "TRIM",
        FunctionDef::new("Removes space characters.", vec![text()], |args, ctx| {
            let text = ctx.string(&args[0])?;
            Ok(text.split_whitespace().collect::<Vec<_>>().join(" ").into())
        }),
    );
    registry.add(
        "VALUE",
        FunctionDef::new(
            "Converts a string to a numeric value.",
            vec![ArgDef::new("value", &[Any])],
            |args, ctx| Ok(to_number(&args[0].to_value()?, ctx.locale())?.into()),
        ),
    );
}

/// Text of every value of the arguments, ranges in row order
fn texts(args: &[Arg], ctx: &CallContext) -> FormulaResult<Vec<String>> {
    let mut texts = Vec::new();
    visit_any(args, Order::RowMajor, |v| {
        texts.push(to_string(&v.value, ctx.locale())?);
        Ok(())
    })?;
    Ok(texts)
}

/// CONCAT(string1, ...) and CONCATENATE(string1, ...)
pub fn fn_concat(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    Ok(texts(args, ctx)?.concat().into())
}

/// JOIN(delimiter, value_or_array1, ...)
pub fn fn_join(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let delimiter = ctx.string(&args[0])?;
    Ok(texts(&args[1..], ctx)?.join(&delimiter).into())
}

/// TEXTJOIN(delimiter, ignore_empty, text1, ...)
pub fn fn_textjoin(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let delimiter = ctx.string(&args[0])?;
    let ignore_empty = ctx.boolean(&args[1])?;
    let mut parts = texts(&args[2..], ctx)?;
    if ignore_empty {
        parts.retain(|s| !s.is_empty());
    }
    Ok(parts.join(&delimiter).into())
}

/// Non-negative character count
fn count(ctx: &CallContext, arg: &Arg, what: &str) -> FormulaResult<usize> {
    let n = ctx.integer(arg)?;
    usize::try_from(n).map_err(|_| {
        FormulaError::evaluation(format!(
            "The {} argument of [[FUNCTION_NAME]] must be positive or zero.",
            what
        ))
    })
}

/// 1-based position, at least 1
fn position(ctx: &CallContext, arg: &Arg, what: &str) -> FormulaResult<usize> {
    let n = ctx.integer(arg)?;
    if n < 1 {
        return Err(FormulaError::evaluation(format!(
            "The {} argument of [[FUNCTION_NAME]] must be greater than or equal to 1.",
            what
        )));
    }
    Ok(n as usize)
}

fn find(args: &[Arg], ctx: &CallContext, case_sensitive: bool) -> FormulaResult<FunctionOutput> {
    let mut needle = ctx.string(&args[0])?;
    let mut haystack = ctx.string(&args[1])?;
    let start = position(ctx, &args[2], "starting_at")?;
    let length = haystack.chars().count();
    if haystack.is_empty() {
        return Err(FormulaError::evaluation(
            "The text_to_search must be a non-empty string.",
        ));
    }
    if start > length {
        return Err(FormulaError::evaluation(format!(
            "The starting_at ({}) must be smaller than or equal to the length of the text_to_search ({}).",
            start, length
        )));
    }
    if !case_sensitive {
        needle = needle.to_lowercase();
        haystack = haystack.to_lowercase();
    }

    let offset: usize = haystack
        .char_indices()
        .nth(start - 1)
        .map(|(i, _)| i)
        .unwrap_or(haystack.len());
    match haystack[offset..].find(&needle) {
        Some(found) => {
            let chars_before = haystack[..offset + found].chars().count();
            Ok(((chars_before + 1) as f64).into())
        }
        None => Err(FormulaError::evaluation(format!(
            "In [[FUNCTION_NAME]] evaluation, cannot find '{}' within '{}'.",
            needle, haystack
        ))),
    }
}

/// LEFT(text, [number_of_characters])
pub fn fn_left(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let n = count(ctx, &args[1], "number_of_characters")?;
    Ok(text.chars().take(n).collect::<String>().into())
}

/// RIGHT(text, [number_of_characters])
pub fn fn_right(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let n = count(ctx, &args[1], "number_of_characters")?;
    let skip = text.chars().count().saturating_sub(n);
    Ok(text.chars().skip(skip).collect::<String>().into())
}

/// MID(text, starting_at, extract_length)
pub fn fn_mid(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let start = position(ctx, &args[1], "starting_at")?;
    let n = count(ctx, &args[2], "extract_length")?;
    Ok(text.chars().skip(start - 1).take(n).collect::<String>().into())
}

/// REPLACE(text, position, length, new_text)
pub fn fn_replace(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let start = position(ctx, &args[1], "position")?;
    let n = count(ctx, &args[2], "length")?;
    let new_text = ctx.string(&args[3])?;

    let mut result: String = text.chars().take(start - 1).collect();
    result.push_str(&new_text);
    result.extend(text.chars().skip(start - 1 + n));
    Ok(result.into())
}

/// SUBSTITUTE(text_to_search, search_for, replace_with, [occurrence_number])
///
/// Without an occurrence number (or with 0) every occurrence is replaced.
pub fn fn_substitute(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let search_for = ctx.string(&args[1])?;
    let replace_with = ctx.string(&args[2])?;
    let occurrence = ctx.number_or(args.get(3), 0.0)?;
    if occurrence < 0.0 {
        return Err(FormulaError::evaluation(
            "The occurrence_number argument of [[FUNCTION_NAME]] cannot be negative.",
        ));
    }
    if search_for.is_empty() {
        return Ok(text.into());
    }
    let occurrence = occurrence.trunc() as usize;
    if occurrence == 0 {
        return Ok(text.replace(&search_for, &replace_with).into());
    }
    match text.match_indices(&search_for).nth(occurrence - 1) {
        Some((at, _)) => {
            let mut result = String::with_capacity(text.len());
            result.push_str(&text[..at]);
            result.push_str(&replace_with);
            result.push_str(&text[at + search_for.len()..]);
            Ok(result.into())
        }
        None => Ok(text.into()),
    }
}

/// REPT(text, number_of_replications)
pub fn fn_rept(args: &[Arg], ctx: &CallContext) -> FormulaResult<FunctionOutput> {
    let text = ctx.string(&args[0])?;
    let times = count(ctx, &args[1], "number_of_replications")?;
    Ok(text.repeat(times).into())
}
