//! Value types flowing through formula evaluation

use std::fmt;
use std::sync::Arc;

/// A scalar value
///
/// Error values are ordinary values: they are stored on cells, passed to
/// functions and returned from them like any other variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Empty cell or omitted value
    #[default]
    Empty,

    /// Boolean value (TRUE/FALSE)
    Boolean(bool),

    /// Numeric value (all numbers stored as f64, including dates)
    Number(f64),

    /// Text value
    Text(SharedString),

    /// Error value
    Error(CellError),
}

impl Value {
    /// Create a new text value
    pub fn text<S: AsRef<str>>(s: S) -> Self {
        Value::Text(SharedString::new(s))
    }

    /// Create an error value of the given kind without a message
    pub fn error(kind: ErrorKind) -> Self {
        Value::Error(CellError::new(kind))
    }

    /// Check if the value is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Check if the value is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Check if the value is a number
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// Check if the value is text
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Check if the value is a boolean
    pub fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    /// Get the number if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the text if this is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get the error if this is one
    pub fn as_error(&self) -> Option<&CellError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s.as_str()),
            Value::Error(e) => write!(f, "{}", e),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::text(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::text(s)
    }
}

impl From<CellError> for Value {
    fn from(e: CellError) -> Self {
        Value::Error(e)
    }
}

/// Format a number the way cells display it without a format: integers
/// without decimals, other values rounded to 15 significant digits.
pub fn format_number(n: f64) -> String {
    if n.is_nan() || n.is_infinite() {
        return ErrorKind::Generic.as_str().to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        return format!("{}", n as i64);
    }
    let rounded: f64 = format!("{:.14e}", n).parse().unwrap_or(n);
    format!("{}", rounded)
}

/// Kind of an error value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// #ERROR - Generic evaluation error (wrong argument type, out of domain, ...)
    Generic,
    /// #BAD_EXPR - The formula could not be compiled
    BadExpression,
    /// #CYCLE - Circular reference
    Cycle,
    /// #REF - Invalid reference
    InvalidReference,
    /// #N/A - Value not available
    NotAvailable,
    /// #DIV/0! - Division by zero
    DivisionByZero,
    /// #NAME? - Unknown function
    UnknownFunction,
    /// #SPILL! - A matrix result cannot spill
    Spill,
    /// Loading... - Waiting for an asynchronous result
    Loading,
}

impl ErrorKind {
    /// Get the display string for this error
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Generic => "#ERROR",
            ErrorKind::BadExpression => "#BAD_EXPR",
            ErrorKind::Cycle => "#CYCLE",
            ErrorKind::InvalidReference => "#REF",
            ErrorKind::NotAvailable => "#N/A",
            ErrorKind::DivisionByZero => "#DIV/0!",
            ErrorKind::UnknownFunction => "#NAME?",
            ErrorKind::Spill => "#SPILL!",
            ErrorKind::Loading => "Loading...",
        }
    }

    /// Parse an error literal
    ///
    /// The common `#VALUE!`, `#NUM!` and `#REF!` spellings are accepted as
    /// aliases of the matching kinds.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "#ERROR" | "#VALUE!" | "#NUM!" => Some(ErrorKind::Generic),
            "#BAD_EXPR" => Some(ErrorKind::BadExpression),
            "#CYCLE" => Some(ErrorKind::Cycle),
            "#REF" | "#REF!" => Some(ErrorKind::InvalidReference),
            "#N/A" => Some(ErrorKind::NotAvailable),
            "#DIV/0!" => Some(ErrorKind::DivisionByZero),
            "#NAME?" => Some(ErrorKind::UnknownFunction),
            "#SPILL!" => Some(ErrorKind::Spill),
            "LOADING..." => Some(ErrorKind::Loading),
            _ => None,
        }
    }

    /// Default message attached to an error of this kind
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Generic => "Error",
            ErrorKind::BadExpression => "Invalid expression",
            ErrorKind::Cycle => "Circular reference",
            ErrorKind::InvalidReference => "Invalid reference",
            ErrorKind::NotAvailable => "Value not available",
            ErrorKind::DivisionByZero => "Division by zero",
            ErrorKind::UnknownFunction => "Unknown function",
            ErrorKind::Spill => "Array result was not expanded because it would overwrite data",
            ErrorKind::Loading => "Loading...",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error value: a kind plus an optional human readable message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CellError {
    kind: ErrorKind,
    message: Option<String>,
}

impl CellError {
    /// Create an error without a message
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    /// Create an error with a message
    pub fn with_message<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }

    /// The error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The message, falling back to the kind's default message
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.kind.default_message())
    }

    /// The explicit message, if one was set
    pub fn explicit_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Replace every occurrence of `placeholder` in the message
    pub fn replace_in_message(&mut self, placeholder: &str, replacement: &str) {
        if let Some(message) = self.message.as_mut() {
            if message.contains(placeholder) {
                *message = message.replace(placeholder, replacement);
            }
        }
    }
}

impl From<ErrorKind> for CellError {
    fn from(kind: ErrorKind) -> Self {
        CellError::new(kind)
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())
    }
}

/// A value together with its optional format hint (e.g. `m/d/yyyy`, `0%`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellResult {
    pub value: Value,
    pub format: Option<String>,
}

impl CellResult {
    /// Create an unformatted result
    pub fn new<V: Into<Value>>(value: V) -> Self {
        Self {
            value: value.into(),
            format: None,
        }
    }

    /// Create a formatted result
    pub fn with_format<V: Into<Value>, S: Into<String>>(value: V, format: S) -> Self {
        Self {
            value: value.into(),
            format: Some(format.into()),
        }
    }

    /// Empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Error result with a message
    pub fn error<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self::new(CellError::with_message(kind, message))
    }

    /// Get the error if the value is one
    pub fn as_error(&self) -> Option<&CellError> {
        self.value.as_error()
    }

    /// Check if the value is an error
    pub fn is_error(&self) -> bool {
        self.value.is_error()
    }
}

impl From<Value> for CellResult {
    fn from(value: Value) -> Self {
        CellResult::new(value)
    }
}

impl From<CellError> for CellResult {
    fn from(e: CellError) -> Self {
        CellResult::new(Value::Error(e))
    }
}

impl From<f64> for CellResult {
    fn from(n: f64) -> Self {
        CellResult::new(n)
    }
}

impl From<bool> for CellResult {
    fn from(b: bool) -> Self {
        CellResult::new(b)
    }
}

impl From<&str> for CellResult {
    fn from(s: &str) -> Self {
        CellResult::new(s)
    }
}

impl From<String> for CellResult {
    fn from(s: String) -> Self {
        CellResult::new(s)
    }
}

/// Reference-counted string shared between cells and results
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SharedString(Arc<str>);

impl SharedString {
    /// Create a new shared string
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        SharedString(Arc::from(s.as_ref()))
    }

    /// Get the string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the length of the string in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the string is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for SharedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SharedString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SharedString {
    fn from(s: &str) -> Self {
        SharedString::new(s)
    }
}

impl From<String> for SharedString {
    fn from(s: String) -> Self {
        SharedString::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(42), Value::Number(42.0));
        assert_eq!(Value::from(3.14), Value::Number(3.14));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from("hello").as_text(), Some("hello"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(f64::NAN), "#ERROR");
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::DivisionByZero.to_string(), "#DIV/0!");
        assert_eq!(ErrorKind::Cycle.to_string(), "#CYCLE");
        assert_eq!(ErrorKind::NotAvailable.to_string(), "#N/A");
        assert_eq!(ErrorKind::Loading.to_string(), "Loading...");
    }

    #[test]
    fn test_error_kind_parse() {
        assert_eq!(ErrorKind::from_str("#DIV/0!"), Some(ErrorKind::DivisionByZero));
        assert_eq!(ErrorKind::from_str("#n/a"), Some(ErrorKind::NotAvailable));
        assert_eq!(ErrorKind::from_str("#VALUE!"), Some(ErrorKind::Generic));
        assert_eq!(ErrorKind::from_str("#REF!"), Some(ErrorKind::InvalidReference));
        assert_eq!(ErrorKind::from_str("invalid"), None);
    }

    #[test]
    fn test_error_message_placeholder() {
        let mut err = CellError::with_message(ErrorKind::Generic, "[[NAME]] expects a number");
        err.replace_in_message("[[NAME]]", "SQRT");
        assert_eq!(err.message(), "SQRT expects a number");

        let err = CellError::new(ErrorKind::Cycle);
        assert_eq!(err.message(), "Circular reference");
        assert_eq!(err.explicit_message(), None);
    }

    #[test]
    fn test_cell_result_constructors() {
        let result = CellResult::with_format(43831.0, "m/d/yyyy");
        assert_eq!(result.value, Value::Number(43831.0));
        assert_eq!(result.format.as_deref(), Some("m/d/yyyy"));

        let result = CellResult::error(ErrorKind::NotAvailable, "missing");
        assert!(result.is_error());
        assert_eq!(result.as_error().map(|e| e.message()), Some("missing"));
    }
}
