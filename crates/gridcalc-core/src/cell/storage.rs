//! Cell storage implementation
//!
//! Sparse storage for raw cell content. Only non-empty cells are stored,
//! using a row-based BTreeMap structure.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CellError, ErrorKind, SharedString, Value};
use crate::locale::Locale;

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a cell, preserved across row/column shifts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        CellId(NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Raw content of a cell, as entered by the user
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellContent {
    /// No content
    #[default]
    Empty,
    /// Boolean literal
    Boolean(bool),
    /// Number literal
    Number(f64),
    /// Text literal
    Text(SharedString),
    /// Error literal (e.g. `#N/A` typed in a cell)
    Error(ErrorKind),
    /// Formula text, including the leading `=`
    Formula(String),
}

impl CellContent {
    /// Interpret user input with the given locale
    ///
    /// `=` starts a formula. Otherwise numbers are parsed per locale,
    /// `TRUE`/`FALSE` become booleans, error literals become errors and
    /// everything else is text.
    pub fn parse(input: &str, locale: &Locale) -> Self {
        if input.is_empty() {
            return CellContent::Empty;
        }
        if input.starts_with('=') {
            return CellContent::Formula(input.to_string());
        }
        if let Some(n) = locale.parse_number(input) {
            return CellContent::Number(n);
        }
        match input.trim().to_uppercase().as_str() {
            "TRUE" => return CellContent::Boolean(true),
            "FALSE" => return CellContent::Boolean(false),
            _ => {}
        }
        if let Some(kind) = ErrorKind::from_str(input.trim()) {
            if kind != ErrorKind::Loading {
                return CellContent::Error(kind);
            }
        }
        CellContent::Text(SharedString::new(input))
    }

    /// Check if the content is empty
    pub fn is_empty(&self) -> bool {
        matches!(self, CellContent::Empty)
    }

    /// Check if the content is a formula
    pub fn is_formula(&self) -> bool {
        matches!(self, CellContent::Formula(_))
    }

    /// Formula text, if this is a formula
    pub fn formula_text(&self) -> Option<&str> {
        match self {
            CellContent::Formula(text) => Some(text),
            _ => None,
        }
    }

    /// The literal value of a non-formula cell
    ///
    /// Formulas have no literal value; `None` is returned for them.
    pub fn literal_value(&self) -> Option<Value> {
        match self {
            CellContent::Empty => Some(Value::Empty),
            CellContent::Boolean(b) => Some(Value::Boolean(*b)),
            CellContent::Number(n) => Some(Value::Number(*n)),
            CellContent::Text(s) => Some(Value::Text(s.clone())),
            CellContent::Error(kind) => Some(Value::Error(CellError::new(*kind))),
            CellContent::Formula(_) => None,
        }
    }
}

impl From<f64> for CellContent {
    fn from(n: f64) -> Self {
        CellContent::Number(n)
    }
}

impl From<bool> for CellContent {
    fn from(b: bool) -> Self {
        CellContent::Boolean(b)
    }
}

/// Complete data for a single cell
#[derive(Debug, Clone)]
pub struct CellData {
    /// Stable identity
    pub id: CellId,
    /// Raw content
    pub content: CellContent,
    /// Format hint (e.g. `0.00%`), if any
    pub format: Option<String>,
}

impl CellData {
    /// Create a new cell with fresh identity
    pub fn new(content: CellContent) -> Self {
        Self {
            id: CellId::next(),
            content,
            format: None,
        }
    }

    /// Create a new cell with a format hint
    pub fn with_format(content: CellContent, format: Option<String>) -> Self {
        Self {
            id: CellId::next(),
            content,
            format,
        }
    }

    /// Check if this cell is effectively empty (no content and no format)
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.format.is_none()
    }
}

/// Sparse cell storage
#[derive(Debug, Default)]
pub struct CellStorage {
    /// Row index -> (column index -> cell)
    rows: BTreeMap<u32, BTreeMap<u16, CellData>>,
}

impl CellStorage {
    /// Create a new empty cell storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cell
    pub fn get(&self, row: u32, col: u16) -> Option<&CellData> {
        self.rows.get(&row).and_then(|r| r.get(&col))
    }

    /// Get a mutable cell
    pub fn get_mut(&mut self, row: u32, col: u16) -> Option<&mut CellData> {
        self.rows.get_mut(&row).and_then(|r| r.get_mut(&col))
    }

    /// Set the content of a cell, keeping its identity and format
    ///
    /// A cell left with no content and no format is removed.
    pub fn set_content(&mut self, row: u32, col: u16, content: CellContent) {
        if let Some(cell) = self.get_mut(row, col) {
            cell.content = content;
            if cell.is_empty() {
                self.remove(row, col);
            }
        } else if !content.is_empty() {
            self.rows
                .entry(row)
                .or_default()
                .insert(col, CellData::new(content));
        }
    }

    /// Set the format hint of a cell, keeping its content
    pub fn set_format(&mut self, row: u32, col: u16, format: Option<String>) {
        if let Some(cell) = self.get_mut(row, col) {
            cell.format = format;
            if cell.is_empty() {
                self.remove(row, col);
            }
        } else if format.is_some() {
            self.rows
                .entry(row)
                .or_default()
                .insert(col, CellData::with_format(CellContent::Empty, format));
        }
    }

    /// Remove a cell
    pub fn remove(&mut self, row: u32, col: u16) -> Option<CellData> {
        let row_map = self.rows.get_mut(&row)?;
        let result = row_map.remove(&col);
        if row_map.is_empty() {
            self.rows.remove(&row);
        }
        result
    }

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.rows.values().map(|r| r.len()).sum()
    }

    /// Check if storage is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over all cells in row order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.rows
            .iter()
            .flat_map(|(&row, cols)| cols.iter().map(move |(&col, data)| (row, col, data)))
    }

    /// Find the position of a cell by identity
    pub fn position_of(&self, id: CellId) -> Option<(u32, u16)> {
        self.iter()
            .find(|(_, _, data)| data.id == id)
            .map(|(row, col, _)| (row, col))
    }

    /// Insert `count` empty rows before `at`, shifting later rows down
    pub fn insert_rows(&mut self, at: u32, count: u32) {
        let moved = self.rows.split_off(&at);
        for (row, cells) in moved {
            self.rows.insert(row.saturating_add(count), cells);
        }
    }

    /// Delete `count` rows starting at `at`, shifting later rows up
    pub fn delete_rows(&mut self, at: u32, count: u32) {
        let mut moved = self.rows.split_off(&at);
        let kept = moved.split_off(&at.saturating_add(count));
        for (row, cells) in kept {
            self.rows.insert(row - count, cells);
        }
    }

    /// Insert `count` empty columns before `at`, shifting later columns right
    pub fn insert_columns(&mut self, at: u16, count: u16) {
        for cols in self.rows.values_mut() {
            let moved = cols.split_off(&at);
            for (col, cell) in moved {
                cols.insert(col.saturating_add(count), cell);
            }
        }
    }

    /// Delete `count` columns starting at `at`, shifting later columns left
    pub fn delete_columns(&mut self, at: u16, count: u16) {
        for cols in self.rows.values_mut() {
            let mut moved = cols.split_off(&at);
            let kept = moved.split_off(&at.saturating_add(count));
            for (col, cell) in kept {
                cols.insert(col - count, cell);
            }
        }
        self.rows.retain(|_, cols| !cols.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content() {
        let en = Locale::en_us();
        assert_eq!(CellContent::parse("", &en), CellContent::Empty);
        assert_eq!(CellContent::parse("12.5", &en), CellContent::Number(12.5));
        assert_eq!(CellContent::parse("true", &en), CellContent::Boolean(true));
        assert_eq!(
            CellContent::parse("=A1+1", &en),
            CellContent::Formula("=A1+1".into())
        );
        assert_eq!(
            CellContent::parse("#N/A", &en),
            CellContent::Error(ErrorKind::NotAvailable)
        );
        assert_eq!(
            CellContent::parse("hello", &en),
            CellContent::Text("hello".into())
        );
    }

    #[test]
    fn test_set_and_clear_keeps_identity() {
        let mut storage = CellStorage::new();
        storage.set_content(0, 0, CellContent::Number(1.0));
        let id = storage.get(0, 0).unwrap().id;

        storage.set_content(0, 0, CellContent::Number(2.0));
        assert_eq!(storage.get(0, 0).unwrap().id, id);

        storage.set_content(0, 0, CellContent::Empty);
        assert!(storage.get(0, 0).is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_insert_and_delete_rows() {
        let mut storage = CellStorage::new();
        storage.set_content(0, 0, CellContent::Number(1.0));
        storage.set_content(2, 0, CellContent::Number(3.0));
        let id = storage.get(2, 0).unwrap().id;

        storage.insert_rows(1, 2);
        assert!(storage.get(2, 0).is_none());
        assert_eq!(storage.get(4, 0).unwrap().content, CellContent::Number(3.0));
        assert_eq!(storage.position_of(id), Some((4, 0)));

        storage.delete_rows(0, 2);
        assert!(storage.get(0, 0).is_none());
        assert_eq!(storage.get(2, 0).unwrap().content, CellContent::Number(3.0));
        assert_eq!(storage.cell_count(), 1);
    }

    #[test]
    fn test_insert_and_delete_columns() {
        let mut storage = CellStorage::new();
        storage.set_content(0, 0, CellContent::Number(1.0));
        storage.set_content(0, 1, CellContent::Number(2.0));

        storage.insert_columns(1, 1);
        assert_eq!(storage.get(0, 2).unwrap().content, CellContent::Number(2.0));

        storage.delete_columns(0, 2);
        assert_eq!(storage.get(0, 0).unwrap().content, CellContent::Number(2.0));
        assert_eq!(storage.cell_count(), 1);
    }
}
