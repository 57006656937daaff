//! Errors raised by the grid data structures

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Text that is not an A1 address
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Text that is not an A1 zone
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    #[error("Row {0} is outside the grid (last row: {1})")]
    RowOutOfBounds(u32, u32),

    #[error("Column {0} is outside the grid (last column: {1})")]
    ColumnOutOfBounds(u16, u16),

    /// No sheet at this index
    #[error("Sheet index {0} out of bounds (count: {1})")]
    SheetOutOfBounds(usize, usize),

    #[error("Invalid sheet name: {0}")]
    InvalidSheetName(String),

    /// Sheet names are unique ignoring case
    #[error("Sheet name already exists: {0}")]
    DuplicateSheetName(String),

    #[error("A workbook must keep at least one sheet")]
    LastSheet,

    /// Matrix columns of different heights
    #[error("Ragged matrix: column {column} has {actual} rows, expected {expected}")]
    RaggedMatrix {
        column: usize,
        expected: usize,
        actual: usize,
    },
}
