//! Value coercions
//!
//! Every coercion takes the active [`Locale`]. An error value short-circuits:
//! it is returned unchanged as [`FormulaError::Value`] before any conversion.
//! Messages name the calling function through the
//! [`FUNCTION_NAME_PLACEHOLDER`](crate::error::FUNCTION_NAME_PLACEHOLDER).

use crate::dates;
use crate::error::{FormulaError, FormulaResult};
use chrono::NaiveDateTime;
use gridcalc_core::{format_number, Locale, Value};

/// Coerce to a number
///
/// Empty and `""` are 0, booleans 1/0, numeric text parses per locale and
/// date/time text converts to its serial number.
pub fn to_number(value: &Value, locale: &Locale) -> FormulaResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Empty => Ok(0.0),
        Value::Error(e) => Err(e.clone().into()),
        Value::Text(s) => {
            if s.is_empty() {
                return Ok(0.0);
            }
            text_to_number(s.as_str(), locale).ok_or_else(|| {
                FormulaError::evaluation(format!(
                    "The function [[FUNCTION_NAME]] expects a number value, but '{}' is a string, and cannot be coerced to a number.",
                    s
                ))
            })
        }
    }
}

/// Like [`to_number`], but the empty string is an error
pub fn to_number_strict(value: &Value, locale: &Locale) -> FormulaResult<f64> {
    if let Value::Text(s) = value {
        if s.is_empty() {
            return Err(FormulaError::evaluation(
                "The function [[FUNCTION_NAME]] expects a number value, but '' is a string, and cannot be coerced to a number.",
            ));
        }
    }
    to_number(value, locale)
}

/// Parse text as a locale number or a date/time
pub fn text_to_number(text: &str, locale: &Locale) -> Option<f64> {
    locale
        .parse_number(text)
        .or_else(|| dates::parse_date_time(text, locale).map(|d| d.serial))
}

/// Coerce to text
pub fn to_string(value: &Value, locale: &Locale) -> FormulaResult<String> {
    match value {
        Value::Text(s) => Ok(s.to_string()),
        Value::Number(n) => Ok(locale.format_number(*n)),
        Value::Boolean(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Empty => Ok(String::new()),
        Value::Error(e) => Err(e.clone().into()),
    }
}

/// Coerce to a boolean
///
/// Numbers are true when non-zero; only `TRUE`/`FALSE` text (any case)
/// converts, the empty string being `false`.
pub fn to_boolean(value: &Value, _locale: &Locale) -> FormulaResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Number(n) => Ok(*n != 0.0),
        Value::Empty => Ok(false),
        Value::Error(e) => Err(e.clone().into()),
        Value::Text(s) => {
            if s.is_empty() {
                return Ok(false);
            }
            match s.as_str().to_uppercase().as_str() {
                "TRUE" => Ok(true),
                "FALSE" => Ok(false),
                _ => Err(FormulaError::evaluation(format!(
                    "The function [[FUNCTION_NAME]] expects a boolean value, but '{}' is a text, and cannot be coerced to a boolean.",
                    s
                ))),
            }
        }
    }
}

/// Like [`to_boolean`], but the empty string is an error
pub fn to_boolean_strict(value: &Value, locale: &Locale) -> FormulaResult<bool> {
    if let Value::Text(s) = value {
        if s.is_empty() {
            return Err(FormulaError::evaluation(
                "The function [[FUNCTION_NAME]] expects a boolean value, but '' is a text, and cannot be coerced to a boolean.",
            ));
        }
    }
    to_boolean(value, locale)
}

/// Coerce to an integer, truncating toward zero
pub fn to_integer(value: &Value, locale: &Locale) -> FormulaResult<i64> {
    let n = to_number(value, locale)?;
    if !n.is_finite() {
        return Err(FormulaError::evaluation(format!(
            "The function [[FUNCTION_NAME]] expects an integer, but got {}.",
            format_number(n)
        )));
    }
    Ok(n.trunc() as i64)
}

/// Coerce to a date and time
pub fn to_date(value: &Value, locale: &Locale) -> FormulaResult<NaiveDateTime> {
    let serial = to_number(value, locale)?;
    dates::serial_to_datetime(serial).ok_or_else(|| {
        FormulaError::evaluation(format!(
            "The function [[FUNCTION_NAME]] expects a date, but {} is out of range.",
            format_number(serial)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::{CellError, ErrorKind};
    use proptest::prelude::*;

    fn en() -> Locale {
        Locale::en_us()
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(&Value::Empty, &en()).unwrap(), 0.0);
        assert_eq!(to_number(&Value::text(""), &en()).unwrap(), 0.0);
        assert_eq!(to_number(&Value::Boolean(true), &en()).unwrap(), 1.0);
        assert_eq!(to_number(&Value::text("1,000.5"), &en()).unwrap(), 1000.5);
        assert_eq!(to_number(&Value::text("12%"), &en()).unwrap(), 0.12);
        assert_eq!(to_number(&Value::text("1/15/2024"), &en()).unwrap(), 45306.0);
        assert_eq!(to_number(&Value::text("1,5"), &Locale::fr_fr()).unwrap(), 1.5);

        let err = to_number(&Value::text("abc"), &en()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn test_strict_rejects_empty_string() {
        assert!(to_number_strict(&Value::text(""), &en()).is_err());
        assert_eq!(to_number_strict(&Value::Empty, &en()).unwrap(), 0.0);
        assert!(to_boolean_strict(&Value::text(""), &en()).is_err());
        assert!(!to_boolean(&Value::text(""), &en()).unwrap());
    }

    #[test]
    fn test_error_short_circuits() {
        let error = CellError::with_message(ErrorKind::NotAvailable, "lookup failed");
        let value = Value::Error(error.clone());
        assert_eq!(to_number(&value, &en()), Err(FormulaError::Value(error.clone())));
        assert_eq!(to_string(&value, &en()), Err(FormulaError::Value(error.clone())));
        assert_eq!(to_boolean(&value, &en()), Err(FormulaError::Value(error)));
    }

    #[test]
    fn test_to_string_and_boolean() {
        assert_eq!(to_string(&Value::Number(0.1 + 0.2), &en()).unwrap(), "0.3");
        assert_eq!(to_string(&Value::Number(2.5), &Locale::fr_fr()).unwrap(), "2,5");
        assert_eq!(to_string(&Value::Boolean(false), &en()).unwrap(), "FALSE");
        assert!(to_boolean(&Value::text("true"), &en()).unwrap());
        assert!(to_boolean(&Value::text("yes"), &en()).is_err());
        assert!(to_boolean(&Value::Number(-2.0), &en()).unwrap());
    }

    #[test]
    fn test_to_integer_and_date() {
        assert_eq!(to_integer(&Value::Number(-3.7), &en()).unwrap(), -3);
        let dt = to_date(&Value::Number(45306.5), &en()).unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 12:00:00");
    }

    proptest! {
        #[test]
        fn prop_to_number_is_total_on_numbers(n in -1e12f64..1e12) {
            prop_assert_eq!(to_number(&Value::Number(n), &en()).unwrap(), n);
            prop_assert_eq!(to_number_strict(&Value::Number(n), &en()).unwrap(), n);
        }

        #[test]
        fn prop_printed_integers_parse_back(n in -1_000_000i64..1_000_000) {
            let text = to_string(&Value::Number(n as f64), &en()).unwrap();
            prop_assert_eq!(to_number(&Value::text(text), &en()).unwrap(), n as f64);
        }
    }
}
