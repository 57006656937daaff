//! Error types for the engine API

use std::time::Duration;

use gridcalc_formula::RegistrationError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`Engine`](crate::Engine) methods
///
/// Formula failures are never reported here: they are error values stored
/// on the cells.
#[derive(Debug, Error)]
pub enum Error {
    /// Grid error (addresses, sheets)
    #[error(transparent)]
    Core(#[from] gridcalc_core::Error),

    /// Invalid custom function
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Asynchronous results did not settle in time
    #[error("Asynchronous results still pending after {0:?}")]
    AsyncTimeout(Duration),
}
