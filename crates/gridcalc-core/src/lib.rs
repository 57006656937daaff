//! # gridcalc-core
//!
//! Core data structures for the gridcalc formula engine.
//!
//! This crate provides the fundamental types used throughout gridcalc:
//! - [`Value`], [`CellError`] and [`CellResult`] - Scalar values, error values and formatted results
//! - [`Matrix`] - Column-major two-dimensional values
//! - [`CellAddress`] and [`CellRange`] - Cell addressing and zones
//! - [`Locale`] - Number and date conventions used by coercions
//! - [`Workbook`], [`Worksheet`] - The grid the engine evaluates
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{CellContent, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_content("A1", "42").unwrap();
//! sheet.set_content("A2", "=A1*2").unwrap();
//!
//! assert_eq!(sheet.content_at(0, 0), CellContent::Number(42.0));
//! assert_eq!(sheet.formula_at(1, 0), Some("=A1*2"));
//! ```

pub mod cell;
pub mod error;
pub mod locale;
pub mod matrix;
pub mod workbook;
pub mod worksheet;

// Re-exports for convenience
pub use cell::{
    format_number, CellAddress, CellContent, CellData, CellError, CellId, CellRange, CellResult,
    ErrorKind, SharedString, Value,
};
pub use error::{Error, Result};
pub use locale::{DateOrder, Locale};
pub use matrix::Matrix;
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
