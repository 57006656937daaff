//! Cell-related types and utilities
//!
//! This module contains:
//! - [`Value`] - A scalar value produced or consumed by formulas
//! - [`CellResult`] - A value with its optional format hint
//! - [`CellAddress`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A rectangular zone of cells (e.g., "A1:B10")
//! - [`CellData`] - Raw cell content, format and identity

mod address;
mod storage;
mod value;

pub use address::{CellAddress, CellRange, ZoneIterator};
pub use storage::{CellContent, CellData, CellId, CellStorage};
pub use value::{format_number, CellError, CellResult, ErrorKind, SharedString, Value};
