//! Criterion matching for conditional aggregations
//!
//! A criterion is a value such as `5`, `">=10"`, `"<>ab*"` or `"=TRUE"`.
//! It is compiled once into a [`Predicate`] and then tested against every
//! candidate cell.

use std::cmp::Ordering;

use gridcalc_core::{Locale, Value};
use regex::Regex;

use crate::args::Arg;
use crate::coerce::{text_to_number, to_string};
use crate::error::{FormulaError, FormulaResult};

/// Comparison operator of a criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
}

impl Operator {
    /// Split a leading operator off a criterion; `=` when there is none
    fn split(criterion: &str) -> (Operator, &str) {
        const OPERATORS: [(&str, Operator); 6] = [
            ("<=", Operator::LessEqual),
            (">=", Operator::GreaterEqual),
            ("<>", Operator::NotEqual),
            ("<", Operator::Less),
            (">", Operator::Greater),
            ("=", Operator::Equal),
        ];
        for (prefix, operator) in OPERATORS {
            if let Some(rest) = criterion.strip_prefix(prefix) {
                return (operator, rest);
            }
        }
        (Operator::Equal, criterion)
    }
}

/// A compiled criterion
#[derive(Debug, Clone)]
pub struct Predicate {
    pub operator: Operator,
    pub operand: Value,
    /// Wildcard pattern of text operands
    pub pattern: Option<Regex>,
}

/// Compile a criterion
///
/// In query mode (database functions) text operands match as prefixes.
pub fn get_predicate(criterion: &Value, locale: &Locale, is_query: bool) -> FormulaResult<Predicate> {
    let text = match criterion {
        Value::Error(e) => return Err(e.clone().into()),
        Value::Number(_) | Value::Boolean(_) => {
            return Ok(Predicate {
                operator: Operator::Equal,
                operand: criterion.clone(),
                pattern: None,
            })
        }
        Value::Empty => "",
        Value::Text(s) => s.as_str(),
    };

    let (operator, operand) = Operator::split(text);
    if !operand.is_empty() {
        if let Some(n) = text_to_number(operand, locale) {
            return Ok(Predicate {
                operator,
                operand: Value::Number(n),
                pattern: None,
            });
        }
    }
    if operand.eq_ignore_ascii_case("TRUE") || operand.eq_ignore_ascii_case("FALSE") {
        return Ok(Predicate {
            operator,
            operand: Value::Boolean(operand.eq_ignore_ascii_case("TRUE")),
            pattern: None,
        });
    }

    Ok(Predicate {
        operator,
        operand: Value::text(operand),
        pattern: Some(wildcard_to_regex(operand, is_query)?),
    })
}

/// Compile a wildcard pattern: `*` any run, `?` one character, `~` escapes
pub fn wildcard_to_regex(pattern: &str, is_query: bool) -> FormulaResult<Regex> {
    let mut regex = String::with_capacity(pattern.len() + 12);
    regex.push_str("(?is)^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '~' if matches!(chars.peek(), Some('*') | Some('?') | Some('~')) => {
                if let Some(escaped) = chars.next() {
                    regex.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    if is_query {
        regex.push_str(".*");
    }
    regex.push('$');
    Regex::new(&regex).map_err(|e| FormulaError::evaluation(format!("Invalid criterion pattern: {}", e)))
}

/// Test a value against a compiled criterion
///
/// Empty cells never match. Error cells compare through their error text.
pub fn evaluate_predicate(value: &Value, predicate: &Predicate, locale: &Locale) -> bool {
    let value = match value {
        Value::Empty => return false,
        Value::Error(e) => Value::text(e.kind().as_str()),
        other => other.clone(),
    };

    match predicate.operator {
        Operator::Equal | Operator::NotEqual => {
            let equal = match (&predicate.operand, &predicate.pattern) {
                (Value::Text(_), Some(pattern)) => match &value {
                    Value::Text(s) => pattern.is_match(s.as_str()),
                    _ => false,
                },
                (Value::Boolean(operand), _) => value == Value::Boolean(*operand),
                (operand, _) => match (to_string(&value, locale), to_string(operand, locale)) {
                    (Ok(a), Ok(b)) => a.to_lowercase() == b.to_lowercase(),
                    _ => false,
                },
            };
            (predicate.operator == Operator::Equal) == equal
        }
        operator => {
            let Some(ordering) = compare_same_type(&value, &predicate.operand) else {
                return false;
            };
            match operator {
                Operator::Less => ordering == Ordering::Less,
                Operator::Greater => ordering == Ordering::Greater,
                Operator::LessEqual => ordering != Ordering::Greater,
                Operator::GreaterEqual => ordering != Ordering::Less,
                Operator::Equal | Operator::NotEqual => false,
            }
        }
    }
}

fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.as_str().to_lowercase().cmp(&b.as_str().to_lowercase())),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Call `f(col, row)` for every position where all criteria hold
///
/// `args` alternates criteria ranges and criteria; all ranges must share
/// one size. Positions are visited column by column.
pub fn visit_matching_ranges<F>(args: &[Arg], locale: &Locale, is_query: bool, mut f: F) -> FormulaResult<()>
where
    F: FnMut(usize, usize) -> FormulaResult<()>,
{
    if args.len() % 2 != 0 {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects criteria_range and criterion to be in pairs.",
        ));
    }

    let mut conditions = Vec::with_capacity(args.len() / 2);
    for pair in args.chunks(2) {
        let range = pair[0].expect_range()?;
        let predicate = get_predicate(&pair[1].to_value()?, locale, is_query)?;
        conditions.push((range, predicate));
    }
    let Some((first, _)) = conditions.first() else {
        return Ok(());
    };
    let (width, height) = (first.width(), first.height());
    if conditions
        .iter()
        .any(|(r, _)| r.width() != width || r.height() != height)
    {
        return Err(FormulaError::argument(
            "Function [[FUNCTION_NAME]] expects criteria_range to have the same dimension",
        ));
    }

    for col in 0..width {
        for row in 0..height {
            let mut matches = true;
            for (range, predicate) in &conditions {
                if !evaluate_predicate(&range.get(col, row)?.value, predicate, locale) {
                    matches = false;
                    break;
                }
            }
            if matches {
                f(col, row)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::RangeArg;
    use gridcalc_core::{CellError, CellResult, ErrorKind, Matrix};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn matches(value: Value, criterion: Value) -> bool {
        let locale = Locale::en_us();
        let predicate = get_predicate(&criterion, &locale, false).unwrap();
        evaluate_predicate(&value, &predicate, &locale)
    }

    #[test]
    fn test_operator_parsing() {
        let locale = Locale::en_us();
        let p = get_predicate(&Value::text(">=10"), &locale, false).unwrap();
        assert_eq!(p.operator, Operator::GreaterEqual);
        assert_eq!(p.operand, Value::Number(10.0));
        let p = get_predicate(&Value::text("<>abc"), &locale, false).unwrap();
        assert_eq!(p.operator, Operator::NotEqual);
        assert_eq!(p.operand, Value::text("abc"));
        let p = get_predicate(&Value::text("true"), &locale, false).unwrap();
        assert_eq!(p.operand, Value::Boolean(true));
    }

    #[test]
    fn test_numeric_equality_matches_text_form() {
        assert!(matches(Value::Number(5.0), Value::Number(5.0)));
        assert!(matches(Value::text("5"), Value::Number(5.0)));
        assert!(matches(Value::text("5"), Value::text("=5")));
        assert!(!matches(Value::Number(6.0), Value::text("5")));
    }

    #[test]
    fn test_wildcards() {
        assert!(matches(Value::text("apple"), Value::text("ap*")));
        assert!(matches(Value::text("APPLE"), Value::text("a?ple")));
        assert!(!matches(Value::text("apple"), Value::text("a?le")));
        assert!(matches(Value::text("a*b"), Value::text("a~*b")));
        assert!(!matches(Value::text("axb"), Value::text("a~*b")));
        assert!(matches(Value::text("1+1"), Value::text("1+1")));
    }

    #[test]
    fn test_type_asymmetry() {
        // Mismatched types never satisfy "=" and always satisfy "<>"
        assert!(!matches(Value::Number(1.0), Value::text("abc")));
        assert!(matches(Value::Number(1.0), Value::text("<>abc")));
        // Ordering across types never matches
        assert!(!matches(Value::text("abc"), Value::text("<5")));
        assert!(matches(Value::text("abc"), Value::text("<b")));
    }

    #[test]
    fn test_boolean_operands_match_booleans_only() {
        assert!(matches(Value::Boolean(true), Value::Boolean(true)));
        assert!(matches(Value::Boolean(false), Value::text("=FALSE")));
        assert!(!matches(Value::text("TRUE"), Value::Boolean(true)));
        assert!(!matches(Value::text("false"), Value::text("=FALSE")));
        assert!(!matches(Value::Number(1.0), Value::Boolean(true)));
        assert!(!matches(Value::Number(0.0), Value::text("FALSE")));
        // "<>" holds across types
        assert!(matches(Value::text("true"), Value::text("<>TRUE")));
        assert!(matches(Value::Number(1.0), Value::text("<>TRUE")));
        assert!(!matches(Value::Boolean(true), Value::text("<>true")));
        assert!(matches(Value::Boolean(true), Value::text(">FALSE")));
    }

    #[test]
    fn test_empty_never_matches() {
        assert!(!matches(Value::Empty, Value::text("")));
        assert!(!matches(Value::Empty, Value::text("<>1")));
        assert!(matches(Value::text(""), Value::text("")));
    }

    #[test]
    fn test_errors_compare_through_text() {
        assert!(matches(Value::error(ErrorKind::NotAvailable), Value::text("#N/A")));
        let locale = Locale::en_us();
        let err = CellError::new(ErrorKind::DivisionByZero);
        assert_eq!(
            get_predicate(&Value::Error(err.clone()), &locale, false).err(),
            Some(err.into())
        );
    }

    #[test]
    fn test_query_mode_is_prefix_match() {
        let locale = Locale::en_us();
        let predicate = get_predicate(&Value::text("App"), &locale, true).unwrap();
        assert!(evaluate_predicate(&Value::text("Apple"), &predicate, &locale));
        let predicate = get_predicate(&Value::text("App"), &locale, false).unwrap();
        assert!(!evaluate_predicate(&Value::text("Apple"), &predicate, &locale));
    }

    #[test]
    fn test_less_than_selects_smaller_numbers() {
        let locale = Locale::en_us();
        let values = Matrix::from_columns(vec![vec![
            CellResult::new(3.0),
            CellResult::new(5.0),
            CellResult::new(7.0),
        ]])
        .unwrap();
        let args = vec![
            Arg::Range(RangeArg::Matrix(values)),
            Arg::Value(CellResult::new("<5")),
        ];
        let mut rows = Vec::new();
        visit_matching_ranges(&args, &locale, false, |_, row| {
            rows.push(row);
            Ok(())
        })
        .unwrap();
        assert_eq!(rows, vec![0]);
    }

    #[test]
    fn test_pairs_and_dimensions() {
        let locale = Locale::en_us();
        let a = Matrix::from_columns(vec![vec![CellResult::new(1.0)]]).unwrap();
        let b = Matrix::from_columns(vec![vec![CellResult::new(1.0), CellResult::new(2.0)]]).unwrap();
        let odd = vec![Arg::Range(RangeArg::Matrix(a.clone()))];
        assert!(visit_matching_ranges(&odd, &locale, false, |_, _| Ok(())).is_err());
        let mismatched = vec![
            Arg::Range(RangeArg::Matrix(a)),
            Arg::Value(CellResult::new(1.0)),
            Arg::Range(RangeArg::Matrix(b)),
            Arg::Value(CellResult::new(1.0)),
        ];
        assert!(visit_matching_ranges(&mismatched, &locale, false, |_, _| Ok(())).is_err());
    }

    proptest! {
        #[test]
        fn prop_predicate_compilation_is_idempotent(n in -1000i32..1000, op in 0usize..6) {
            let locale = Locale::en_us();
            let ops = ["", "=", "<>", "<", ">=", "<="];
            let criterion = Value::text(format!("{}{}", ops[op], n));
            let first = get_predicate(&criterion, &locale, false).unwrap();
            let second = get_predicate(&criterion, &locale, false).unwrap();
            for candidate in [-2000.0, n as f64, 0.5, 2000.0] {
                let value = Value::Number(candidate);
                prop_assert_eq!(
                    evaluate_predicate(&value, &first, &locale),
                    evaluate_predicate(&value, &second, &locale)
                );
            }
        }
    }
}
