//! Access to the grid from formula evaluation
//!
//! Functions never see the grid directly: references are resolved through
//! the [`Getters`] collaborator. The engine implements it with lazy,
//! memoized evaluation of referenced formula cells; [`GridGetters`]
//! evaluates a workbook on the fly without any caching.

use std::cell::RefCell;

use ahash::AHashSet;
use gridcalc_core::{CellRange, CellResult, Locale, Workbook};

use crate::deferred::Deferred;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate_formula, EvaluationContext, FormulaOutput};
use crate::functions::FunctionRegistry;
use crate::parser::parse_formula;

/// Position of a cell in a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Sheet index
    pub sheet: usize,
    /// Row index (0-based)
    pub row: u32,
    /// Column index (0-based)
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }
}

/// What is known about one asynchronous call site
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncSlot {
    /// Never invoked: the function must be called
    Vacant,
    /// Invoked, result not available yet
    Pending,
    /// Settled; rejections are already error values
    Resolved(CellResult),
}

/// Grid access used by the evaluator
pub trait Getters {
    /// Locale for coercions
    fn locale(&self) -> &Locale;

    /// Evaluated value of a cell, computing formula cells on demand
    ///
    /// Fails with [`FormulaError::CircularReference`] when the cell is being
    /// computed already and with [`FormulaError::NotReady`] when its value
    /// depends on a pending asynchronous call.
    fn evaluated_cell(&self, sheet: usize, row: u32, col: u16) -> FormulaResult<CellResult>;

    /// Index of a sheet by name (case-insensitive)
    fn sheet_index(&self, name: &str) -> Option<usize>;

    /// Zone covered by the matrix result spilled from a cell
    fn spread_zone(&self, _sheet: usize, _row: u32, _col: u16) -> Option<CellRange> {
        None
    }

    /// State of the `call`-th asynchronous call made by the formula of `cell`
    fn async_slot(&self, _cell: CellKey, _call: usize) -> AsyncSlot {
        AsyncSlot::Vacant
    }

    /// Record a deferred returned by the `call`-th asynchronous call of `cell`
    fn register_deferred(&self, _cell: CellKey, _call: usize, _function: &str, _deferred: Deferred) {
    }
}

/// Straightforward [`Getters`] over a workbook
///
/// Every read of a formula cell re-evaluates it. Cycles are detected with
/// an in-progress set. Deferred results are not awaited: cells calling
/// asynchronous functions stay `Loading...`.
pub struct GridGetters<'a> {
    workbook: &'a Workbook,
    registry: &'a FunctionRegistry,
    in_progress: RefCell<AHashSet<CellKey>>,
}

impl<'a> GridGetters<'a> {
    /// Create getters over a workbook
    pub fn new(workbook: &'a Workbook, registry: &'a FunctionRegistry) -> Self {
        Self {
            workbook,
            registry,
            in_progress: RefCell::new(AHashSet::new()),
        }
    }

    /// Evaluate formula text as if it were entered in `cell`
    pub fn evaluate_text(&self, formula: &str, cell: CellKey) -> FormulaResult<FormulaOutput> {
        let expr = match parse_formula(formula) {
            Ok(expr) => expr,
            Err(e) => return Ok(FormulaOutput::Value(e.into_cell_error().into())),
        };
        let ctx = EvaluationContext::new(self, self.registry, cell);
        evaluate_formula(&expr, &ctx)
    }
}

impl Getters for GridGetters<'_> {
    fn locale(&self) -> &Locale {
        self.workbook.locale()
    }

    fn evaluated_cell(&self, sheet: usize, row: u32, col: u16) -> FormulaResult<CellResult> {
        let worksheet = self.workbook.worksheet(sheet).ok_or_else(|| {
            FormulaError::InvalidReference(format!("Sheet index {} does not exist", sheet))
        })?;
        let Some(cell) = worksheet.cell_at(row, col) else {
            return Ok(CellResult::empty());
        };

        let Some(formula) = cell.content.formula_text() else {
            let value = cell.content.literal_value().unwrap_or_default();
            return Ok(CellResult {
                value,
                format: cell.format.clone(),
            });
        };

        let key = CellKey::new(sheet, row, col);
        if !self.in_progress.borrow_mut().insert(key) {
            return Err(FormulaError::CircularReference);
        }
        let output = self.evaluate_text(formula, key);
        self.in_progress.borrow_mut().remove(&key);

        match output {
            Ok(output) => Ok(output.into_top_left()),
            Err(FormulaError::CircularReference) => {
                Ok(FormulaError::CircularReference.into_cell_error().into())
            }
            Err(e) => Err(e),
        }
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.workbook.sheet_index(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_core::{ErrorKind, Value};

    #[test]
    fn test_literal_and_formula_cells() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_content("A1", "20").unwrap();
        sheet.set_content("A2", "=A1*2+1").unwrap();
        sheet.set_format("A1", Some("0.00")).unwrap();

        let registry = FunctionRegistry::builtin();
        let getters = GridGetters::new(&workbook, &registry);
        let a1 = getters.evaluated_cell(0, 0, 0).unwrap();
        assert_eq!(a1.value, Value::Number(20.0));
        assert_eq!(a1.format.as_deref(), Some("0.00"));
        assert_eq!(getters.evaluated_cell(0, 1, 0).unwrap().value, Value::Number(41.0));
        assert_eq!(getters.evaluated_cell(0, 5, 5).unwrap().value, Value::Empty);
    }

    #[test]
    fn test_cycle_is_an_error_value() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_content("A1", "=B1+1").unwrap();
        sheet.set_content("B1", "=A1+1").unwrap();

        let registry = FunctionRegistry::builtin();
        let getters = GridGetters::new(&workbook, &registry);
        let result = getters.evaluated_cell(0, 0, 0).unwrap();
        assert_eq!(result.as_error().map(|e| e.kind()), Some(ErrorKind::Cycle));
    }
}
