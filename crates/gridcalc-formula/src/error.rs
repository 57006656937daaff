//! Formula error types

use gridcalc_core::{CellError, ErrorKind};
use thiserror::Error;

/// Placeholder substituted with the failing function's name at the call boundary
pub const FUNCTION_NAME_PLACEHOLDER: &str = "[[FUNCTION_NAME]]";

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// Most variants become error values at the function call boundary. The
/// control signals (`NotReady`, `Pending`, `CircularReference`) are never
/// converted there; they unwind to the cell being evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("{0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("{0}")]
    Argument(String),

    /// Unknown function
    #[error("Invalid formula. Function {0} is not defined.")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Invalid number of arguments for the {function} function. Expected {expected}, but got {actual} instead.")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference to invalid cell or sheet
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Division by zero
    #[error("{0}")]
    DivisionByZero(String),

    /// Value not available
    #[error("{0}")]
    NotAvailable(String),

    /// An error value met during evaluation, propagated unchanged
    #[error("{0}")]
    Value(CellError),

    /// Circular reference
    #[error("Circular reference detected")]
    CircularReference,

    /// A dependency has no value yet
    #[error("A dependency is not computed yet")]
    NotReady,

    /// The formula is waiting for one of its own asynchronous calls
    #[error("Waiting for an asynchronous result")]
    Pending,
}

impl FormulaError {
    /// Create a generic evaluation error
    pub fn evaluation<S: Into<String>>(msg: S) -> Self {
        FormulaError::Evaluation(msg.into())
    }

    /// Create an invalid-argument error
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        FormulaError::Argument(msg.into())
    }

    /// Create a division-by-zero error
    pub fn div_zero<S: Into<String>>(msg: S) -> Self {
        FormulaError::DivisionByZero(msg.into())
    }

    /// Create a not-available error
    pub fn not_available<S: Into<String>>(msg: S) -> Self {
        FormulaError::NotAvailable(msg.into())
    }

    /// The error kind this error becomes once stored as a value
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::Parse(_) => ErrorKind::BadExpression,
            FormulaError::Evaluation(_)
            | FormulaError::Argument(_)
            | FormulaError::ArgumentCount { .. } => ErrorKind::Generic,
            FormulaError::UnknownFunction(_) => ErrorKind::UnknownFunction,
            FormulaError::InvalidReference(_) => ErrorKind::InvalidReference,
            FormulaError::DivisionByZero(_) => ErrorKind::DivisionByZero,
            FormulaError::NotAvailable(_) => ErrorKind::NotAvailable,
            FormulaError::Value(e) => e.kind(),
            FormulaError::CircularReference => ErrorKind::Cycle,
            FormulaError::NotReady | FormulaError::Pending => ErrorKind::Loading,
        }
    }

    /// Whether this is a control signal that must reach the cell boundary
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            FormulaError::CircularReference | FormulaError::NotReady | FormulaError::Pending
        )
    }

    /// Convert into an error value
    pub fn into_cell_error(self) -> CellError {
        match self {
            FormulaError::Value(e) => e,
            other => {
                let kind = other.kind();
                CellError::with_message(kind, other.to_string())
            }
        }
    }

    /// Convert into an error value, naming the function in its message
    pub fn into_cell_error_for(self, function: &str) -> CellError {
        let mut error = self.into_cell_error();
        error.replace_in_message(FUNCTION_NAME_PLACEHOLDER, function);
        error
    }
}

/// Errors raised when registering a function
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Function names are restricted to `[A-Z0-9_.]+`
    #[error("Invalid function name {0}. Function names can exclusively contain alphanumerical values separated by dots (.) or underscore (_)")]
    InvalidFunctionName(String),

    /// A function with the same normalized name is registered already
    #[error("A function named {0} is already registered")]
    Duplicate(String),

    /// Invalid argument declaration
    #[error("Invalid argument declaration for {function}: {reason}")]
    InvalidArgument { function: String, reason: String },
}

impl From<CellError> for FormulaError {
    fn from(e: CellError) -> Self {
        FormulaError::Value(e)
    }
}

impl From<gridcalc_core::Error> for FormulaError {
    fn from(e: gridcalc_core::Error) -> Self {
        match e {
            gridcalc_core::Error::RaggedMatrix { .. } => {
                FormulaError::evaluation("Formula depends on invalid values")
            }
            gridcalc_core::Error::InvalidAddress(_)
            | gridcalc_core::Error::InvalidRange(_)
            | gridcalc_core::Error::RowOutOfBounds(..)
            | gridcalc_core::Error::ColumnOutOfBounds(..)
            | gridcalc_core::Error::SheetOutOfBounds(..) => FormulaError::InvalidReference(e.to_string()),
            other => FormulaError::evaluation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(FormulaError::Parse("x".into()).kind(), ErrorKind::BadExpression);
        assert_eq!(FormulaError::div_zero("x").kind(), ErrorKind::DivisionByZero);
        assert_eq!(FormulaError::CircularReference.kind(), ErrorKind::Cycle);
        assert!(FormulaError::NotReady.is_control());
        assert!(!FormulaError::evaluation("x").is_control());
    }

    #[test]
    fn test_placeholder_substitution() {
        let err = FormulaError::evaluation("The function [[FUNCTION_NAME]] expects a number.");
        let cell = err.into_cell_error_for("SQRT");
        assert_eq!(cell.kind(), ErrorKind::Generic);
        assert_eq!(cell.message(), "The function SQRT expects a number.");
    }

    #[test]
    fn test_propagated_value_is_unchanged() {
        let original = CellError::with_message(ErrorKind::NotAvailable, "missing");
        let err: FormulaError = original.clone().into();
        assert_eq!(err.into_cell_error_for("SUM"), original);
    }

    #[test]
    fn test_ragged_matrix_message() {
        let err: FormulaError = gridcalc_core::Error::RaggedMatrix {
            column: 1,
            expected: 2,
            actual: 1,
        }
        .into();
        assert_eq!(err.to_string(), "Formula depends on invalid values");
    }
}
