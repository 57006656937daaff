//! Worksheet type

use crate::cell::{CellAddress, CellContent, CellData, CellId, CellRange, CellStorage};
use crate::error::{Error, Result};
use crate::locale::Locale;
use crate::{MAX_COLS, MAX_ROWS};

/// A worksheet (single sheet in a workbook)
///
/// Holds raw cell content only. Evaluated values live in the engine.
#[derive(Debug)]
pub struct Worksheet {
    /// Sheet name
    name: String,
    /// Cell storage
    cells: CellStorage,
}

impl Worksheet {
    /// Create a new worksheet with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell Access ===

    /// Get a cell by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.get(addr.row, addr.col))
    }

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Raw content at a position (`Empty` when nothing is stored)
    pub fn content_at(&self, row: u32, col: u16) -> CellContent {
        self.cells
            .get(row, col)
            .map(|c| c.content.clone())
            .unwrap_or_default()
    }

    /// Formula text at a position, if the cell holds a formula
    pub fn formula_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells
            .get(row, col)
            .and_then(|c| c.content.formula_text())
    }

    /// Format hint at a position
    pub fn format_at(&self, row: u32, col: u16) -> Option<&str> {
        self.cells.get(row, col).and_then(|c| c.format.as_deref())
    }

    /// Find a cell's position by identity
    pub fn position_of(&self, id: CellId) -> Option<CellAddress> {
        self.cells
            .position_of(id)
            .map(|(row, col)| CellAddress::new(row, col))
    }

    // === Cell Modification ===

    /// Set a cell from user input, parsed with the default locale
    pub fn set_content(&mut self, address: &str, input: &str) -> Result<()> {
        self.set_input(address, input, &Locale::default())
    }

    /// Set a cell from user input, parsed with the given locale
    pub fn set_input(&mut self, address: &str, input: &str, locale: &Locale) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_content_at(addr.row, addr.col, CellContent::parse(input, locale))
    }

    /// Set a cell's content by row and column indices
    pub fn set_content_at<C: Into<CellContent>>(
        &mut self,
        row: u32,
        col: u16,
        content: C,
    ) -> Result<()> {
        self.validate_cell_position(row, col)?;
        self.cells.set_content(row, col, content.into());
        Ok(())
    }

    /// Set a cell's format hint by address string
    pub fn set_format(&mut self, address: &str, format: Option<&str>) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.cells
            .set_format(addr.row, addr.col, format.map(str::to_string));
        Ok(())
    }

    /// Clear a cell
    pub fn clear_cell_at(&mut self, row: u32, col: u16) {
        self.cells.remove(row, col);
    }

    // === Structure ===

    /// Insert `count` rows before `at`
    pub fn insert_rows(&mut self, at: u32, count: u32) -> Result<()> {
        if at >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(at, MAX_ROWS - 1));
        }
        self.cells.insert_rows(at, count);
        Ok(())
    }

    /// Delete `count` rows starting at `at`
    pub fn delete_rows(&mut self, at: u32, count: u32) -> Result<()> {
        if at >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(at, MAX_ROWS - 1));
        }
        self.cells.delete_rows(at, count);
        Ok(())
    }

    /// Insert `count` columns before `at`
    pub fn insert_columns(&mut self, at: u16, count: u16) -> Result<()> {
        if at >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(at, MAX_COLS - 1));
        }
        self.cells.insert_columns(at, count);
        Ok(())
    }

    /// Delete `count` columns starting at `at`
    pub fn delete_columns(&mut self, at: u16, count: u16) -> Result<()> {
        if at >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(at, MAX_COLS - 1));
        }
        self.cells.delete_columns(at, count);
        Ok(())
    }

    // === Iteration ===

    /// Get the number of stored cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Check if the worksheet is empty
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all stored cells in row order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    /// Iterate over all formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter()
            .filter_map(|(row, col, cell)| cell.content.formula_text().map(|t| (row, col, t)))
    }

    /// Smallest zone containing every stored cell
    pub fn used_range(&self) -> Option<CellRange> {
        let mut cells = self.cells.iter();
        let (row, col, _) = cells.next()?;
        let (mut min_row, mut max_row, mut min_col, mut max_col) = (row, row, col, col);
        for (row, col, _) in cells {
            min_row = min_row.min(row);
            max_row = max_row.max(row);
            min_col = min_col.min(col);
            max_col = max_col.max(col);
        }
        Some(CellRange::from_indices(min_row, min_col, max_row, max_col))
    }

    fn validate_cell_position(&self, row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row, MAX_ROWS - 1));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS - 1));
        }
        Ok(())
    }
}
