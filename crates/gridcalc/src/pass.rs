//! A single evaluation pass
//!
//! The pass owns the visitation state of every formula cell it touches.
//! Referenced formula cells are computed on first read (depth-first) and
//! memoized until the pass ends. Matrix results spill into the empty
//! cells next to their origin.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use gridcalc_core::{
    CellAddress, CellError, CellId, CellRange, CellResult, ErrorKind, Locale, Matrix, Value,
    Workbook, MAX_COLS, MAX_ROWS,
};
use gridcalc_formula::{
    evaluate_formula, AsyncSlot, CellKey, Deferred, DeferredState, EvaluationContext,
    FormulaError, FormulaOutput, FormulaResult, FunctionRegistry, Getters,
};

use crate::calculation::{compile, FormulaCache};

/// Evaluation state of a formula cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    /// Not reached yet in the current pass
    Unvisited,
    /// Being computed; reading it again is a cycle
    InProgress,
    /// Waiting for one of its own asynchronous calls
    PendingAsync,
    /// Blocked on a pending dependency
    Waiting,
    /// Done, including terminal cycle errors
    Computed,
}

impl CellState {
    /// Whether the cell still waits on asynchronous work
    pub fn is_pending(self) -> bool {
        matches!(self, CellState::PendingAsync | CellState::Waiting)
    }
}

/// What the engine keeps for one formula cell
#[derive(Debug, Clone)]
pub(crate) struct CellRecord {
    pub state: CellState,
    /// Cell value; the top-left element for spilled matrices
    pub result: CellResult,
    /// Full matrix when the result spilled
    pub matrix: Option<Matrix<CellResult>>,
}

impl CellRecord {
    fn in_progress() -> Self {
        Self::with_state(CellState::InProgress, CellResult::empty())
    }

    fn computed(result: CellResult) -> Self {
        Self::with_state(CellState::Computed, result)
    }

    fn loading(state: CellState) -> Self {
        Self::with_state(state, CellError::new(ErrorKind::Loading).into())
    }

    fn with_state(state: CellState, result: CellResult) -> Self {
        Self {
            state,
            result,
            matrix: None,
        }
    }

    /// Element of the spilled matrix at an offset from the origin
    pub fn spilled(&self, col: usize, row: usize) -> Option<&CellResult> {
        self.matrix.as_ref().and_then(|m| m.get(col, row))
    }
}

/// Zones covered by spilled matrices
#[derive(Debug, Clone, Default)]
pub(crate) struct SpillMap {
    /// Origin → covered zone (origin included)
    zones: AHashMap<CellKey, CellRange>,
    /// Covered cell → origin (origin excluded)
    owners: AHashMap<CellKey, CellKey>,
}

impl SpillMap {
    pub fn zone(&self, origin: CellKey) -> Option<CellRange> {
        self.zones.get(&origin).copied()
    }

    pub fn owner(&self, cell: CellKey) -> Option<CellKey> {
        self.owners.get(&cell).copied()
    }

    fn insert(&mut self, origin: CellKey, zone: CellRange) {
        for address in zone.cells() {
            let key = CellKey::new(origin.sheet, address.row, address.col);
            if key != origin {
                self.owners.insert(key, origin);
            }
        }
        self.zones.insert(origin, zone);
    }

    pub fn remove(&mut self, origin: CellKey) {
        if self.zones.remove(&origin).is_some() {
            self.owners.retain(|_, owner| *owner != origin);
        }
    }

    pub fn remove_sheet(&mut self, sheet: usize) {
        self.zones.retain(|origin, _| origin.sheet != sheet);
        self.owners.retain(|cell, _| cell.sheet != sheet);
    }

    /// Whether this map holds a zone that `before` did not
    pub fn has_new_zones(&self, before: &SpillMap) -> bool {
        self.zones
            .iter()
            .any(|(origin, zone)| before.zone(*origin) != Some(*zone))
    }
}

/// An asynchronous call whose result is still outstanding
#[derive(Debug)]
pub(crate) struct PendingCall {
    pub function: String,
    pub deferred: Deferred,
}

/// Asynchronous call sites, keyed by cell and ordinal of the call in its formula
#[derive(Debug, Default)]
pub(crate) struct AsyncCalls {
    pub resolved: AHashMap<(CellKey, usize), CellResult>,
    pub pending: AHashMap<(CellKey, usize), PendingCall>,
}

impl AsyncCalls {
    pub fn clear(&mut self) {
        self.resolved.clear();
        self.pending.clear();
    }

    pub fn retain_cells<F: Fn(CellKey) -> bool>(&mut self, keep: F) {
        self.resolved.retain(|(cell, _), _| keep(*cell));
        self.pending.retain(|(cell, _), _| keep(*cell));
    }

    pub fn has_pending(&self, cell: CellKey) -> bool {
        self.pending.keys().any(|(c, _)| *c == cell)
    }

    /// Poll every pending deferred and record the settled ones
    ///
    /// Returns how many settled.
    pub fn poll(&mut self) -> usize {
        let mut settled = Vec::new();
        for (site, call) in self.pending.iter_mut() {
            if let DeferredState::Settled(result) = call.deferred.poll() {
                let result = match result {
                    Ok(value) => value,
                    Err(e) => {
                        log::debug!("{} at {:?} was rejected: {}", call.function, site.0, e);
                        e.into_cell_error_for(&call.function).into()
                    }
                };
                log::trace!("{} at {:?} (call {}) settled", call.function, site.0, site.1);
                settled.push((*site, result));
            }
        }

        let count = settled.len();
        for (site, result) in settled {
            self.pending.remove(&site);
            self.resolved.insert(site, result);
        }
        count
    }
}

/// Deferred handed out during a pass
#[derive(Debug)]
pub(crate) struct NewDeferred {
    pub cell: CellKey,
    pub call: usize,
    pub function: String,
    pub deferred: Deferred,
}

/// State left by a finished pass
#[derive(Debug)]
pub(crate) struct PassOutcome {
    pub cells: AHashMap<CellKey, CellRecord>,
    pub spills: SpillMap,
    pub deferreds: Vec<NewDeferred>,
    /// A spill covered a cell that was read as empty earlier in the pass
    pub spill_conflict: bool,
    pub computed: usize,
}

/// Lazy, memoized evaluation of formula cells
pub(crate) struct EvaluationPass<'a> {
    workbook: &'a Workbook,
    registry: &'a FunctionRegistry,
    formulas: &'a FormulaCache,
    async_calls: &'a AsyncCalls,
    /// Spill zones of the previous pass
    hints: &'a SpillMap,
    cells: RefCell<AHashMap<CellKey, CellRecord>>,
    spills: RefCell<SpillMap>,
    read_empty: RefCell<AHashSet<CellKey>>,
    spill_conflict: Cell<bool>,
    deferreds: RefCell<Vec<NewDeferred>>,
    computed: Cell<usize>,
}

impl<'a> EvaluationPass<'a> {
    pub fn new(
        workbook: &'a Workbook,
        registry: &'a FunctionRegistry,
        formulas: &'a FormulaCache,
        async_calls: &'a AsyncCalls,
        hints: &'a SpillMap,
    ) -> Self {
        Self {
            workbook,
            registry,
            formulas,
            async_calls,
            hints,
            cells: RefCell::new(AHashMap::new()),
            spills: RefCell::new(SpillMap::default()),
            read_empty: RefCell::new(AHashSet::new()),
            spill_conflict: Cell::new(false),
            deferreds: RefCell::new(Vec::new()),
            computed: Cell::new(0),
        }
    }

    /// Start from records kept from an earlier pass
    pub fn with_state(self, cells: AHashMap<CellKey, CellRecord>, spills: SpillMap) -> Self {
        self.cells.replace(cells);
        self.spills.replace(spills);
        self
    }

    /// Compute a formula cell unless this pass already did
    pub fn visit(&self, key: CellKey) {
        // Control signals are already recorded in the cell state
        let _ = self.evaluated_cell(key.sheet, key.row, key.col);
    }

    pub fn finish(self) -> PassOutcome {
        PassOutcome {
            cells: self.cells.into_inner(),
            spills: self.spills.into_inner(),
            deferreds: self.deferreds.into_inner(),
            spill_conflict: self.spill_conflict.get(),
            computed: self.computed.get(),
        }
    }

    fn state(&self, key: CellKey) -> CellState {
        self.cells
            .borrow()
            .get(&key)
            .map_or(CellState::Unvisited, |r| r.state)
    }

    fn formula_value(&self, key: CellKey, id: CellId, formula: &str) -> FormulaResult<CellResult> {
        if self.state(key) == CellState::Unvisited {
            self.compute(key, id, formula);
        }

        let cells = self.cells.borrow();
        let Some(record) = cells.get(&key) else {
            return Ok(CellResult::empty());
        };
        match record.state {
            CellState::Computed => Ok(record.result.clone()),
            CellState::InProgress => Err(FormulaError::CircularReference),
            CellState::PendingAsync | CellState::Waiting => Err(FormulaError::NotReady),
            CellState::Unvisited => Ok(CellResult::empty()),
        }
    }

    fn compute(&self, key: CellKey, id: CellId, formula: &str) {
        self.cells.borrow_mut().insert(key, CellRecord::in_progress());

        let compiled = self
            .formulas
            .get(id, formula)
            .unwrap_or_else(|| Arc::new(compile(formula)));
        let outcome = match compiled.as_ref() {
            Ok(expr) => {
                let ctx = EvaluationContext::new(self, self.registry, key);
                evaluate_formula(expr, &ctx)
            }
            Err(e) => Ok(FormulaOutput::Value(e.clone().into())),
        };
        self.computed.set(self.computed.get() + 1);

        let record = match outcome {
            Ok(FormulaOutput::Value(result)) => CellRecord::computed(result),
            Ok(FormulaOutput::Matrix(matrix)) => self.place_spill(key, matrix),
            Err(FormulaError::Pending) => CellRecord::loading(CellState::PendingAsync),
            Err(FormulaError::NotReady) => CellRecord::loading(CellState::Waiting),
            Err(e) => CellRecord::computed(e.into_cell_error().into()),
        };
        self.cells.borrow_mut().insert(key, record);
    }

    fn place_spill(&self, origin: CellKey, matrix: Matrix<CellResult>) -> CellRecord {
        if matrix.is_empty() {
            return CellRecord::computed(CellResult::error(
                ErrorKind::Generic,
                "The formula result is an empty matrix.",
            ));
        }

        let (width, height) = (matrix.width(), matrix.height());
        let fits = origin.row as usize + height <= MAX_ROWS as usize
            && origin.col as usize + width <= MAX_COLS as usize;
        let zone = CellRange::with_size(CellAddress::new(origin.row, origin.col), width, height);
        let blocked = if fits {
            self.spill_blocker(origin, &zone).map(|a| a.to_a1_string())
        } else {
            Some("the sheet edge".to_string())
        };
        if let Some(blocker) = blocked {
            log::warn!(
                "Cannot spill {}x{} matrix from {:?}: blocked by {}",
                width,
                height,
                origin,
                blocker
            );
            return CellRecord::computed(CellResult::error(
                ErrorKind::Spill,
                "Spill range is not blank.",
            ));
        }

        self.spills.borrow_mut().insert(origin, zone);
        let read_empty = self.read_empty.borrow();
        let conflict = zone
            .cells()
            .any(|a| read_empty.contains(&CellKey::new(origin.sheet, a.row, a.col)));
        if conflict {
            log::debug!("Spill from {:?} covers cells already read as empty", origin);
            self.spill_conflict.set(true);
        }

        CellRecord {
            state: CellState::Computed,
            result: matrix.get(0, 0).cloned().unwrap_or_default(),
            matrix: Some(matrix),
        }
    }

    /// First cell of the zone that prevents the spill, if any
    fn spill_blocker(&self, origin: CellKey, zone: &CellRange) -> Option<CellAddress> {
        let worksheet = self.workbook.worksheet(origin.sheet)?;
        let spills = self.spills.borrow();
        zone.cells()
            .filter(|a| (a.row, a.col) != (origin.row, origin.col))
            .find(|a| {
                let has_content = worksheet
                    .cell_at(a.row, a.col)
                    .map_or(false, |c| !c.content.is_empty());
                let claimed = spills
                    .owner(CellKey::new(origin.sheet, a.row, a.col))
                    .map_or(false, |owner| owner != origin);
                has_content || claimed
            })
    }

    /// Value spilled into an empty cell
    ///
    /// An origin hinted by the previous pass is computed first so that its
    /// spill is known before the cell is read.
    fn spilled_value(&self, key: CellKey) -> FormulaResult<Option<CellResult>> {
        let known = self.spills.borrow().owner(key);
        if known.is_none() {
            if let Some(origin) = self.hints.owner(key) {
                if self.state(origin) == CellState::Unvisited {
                    self.evaluated_cell(origin.sheet, origin.row, origin.col)?;
                }
            }
        }

        let Some(origin) = self.spills.borrow().owner(key) else {
            return Ok(None);
        };
        let cells = self.cells.borrow();
        let element = cells
            .get(&origin)
            .and_then(|r| r.spilled((key.col - origin.col) as usize, (key.row - origin.row) as usize))
            .cloned();
        Ok(element)
    }
}

impl Getters for EvaluationPass<'_> {
    fn locale(&self) -> &Locale {
        self.workbook.locale()
    }

    fn evaluated_cell(&self, sheet: usize, row: u32, col: u16) -> FormulaResult<CellResult> {
        let worksheet = self.workbook.worksheet(sheet).ok_or_else(|| {
            FormulaError::InvalidReference(format!("Sheet index {} does not exist", sheet))
        })?;
        let key = CellKey::new(sheet, row, col);

        let cell = worksheet.cell_at(row, col);
        if let Some(cell) = cell {
            if let Some(formula) = cell.content.formula_text() {
                return self.formula_value(key, cell.id, formula);
            }
            if !cell.content.is_empty() {
                return Ok(CellResult {
                    value: cell.content.literal_value().unwrap_or_default(),
                    format: cell.format.clone(),
                });
            }
        }

        if let Some(result) = self.spilled_value(key)? {
            return Ok(result);
        }
        self.read_empty.borrow_mut().insert(key);
        Ok(CellResult {
            value: Value::Empty,
            format: cell.and_then(|c| c.format.clone()),
        })
    }

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.workbook.sheet_index(name)
    }

    fn spread_zone(&self, sheet: usize, row: u32, col: u16) -> Option<CellRange> {
        self.spills.borrow().zone(CellKey::new(sheet, row, col))
    }

    fn async_slot(&self, cell: CellKey, call: usize) -> AsyncSlot {
        if let Some(result) = self.async_calls.resolved.get(&(cell, call)) {
            return AsyncSlot::Resolved(result.clone());
        }
        let started = self.async_calls.pending.contains_key(&(cell, call))
            || self
                .deferreds
                .borrow()
                .iter()
                .any(|d| d.cell == cell && d.call == call);
        if started {
            AsyncSlot::Pending
        } else {
            AsyncSlot::Vacant
        }
    }

    fn register_deferred(&self, cell: CellKey, call: usize, function: &str, deferred: Deferred) {
        self.deferreds.borrow_mut().push(NewDeferred {
            cell,
            call,
            function: function.to_string(),
            deferred,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(workbook: &Workbook) -> PassOutcome {
        let registry = FunctionRegistry::shared();
        let mut formulas = FormulaCache::default();
        formulas.refresh(workbook);
        let async_calls = AsyncCalls::default();
        let hints = SpillMap::default();
        let pass = EvaluationPass::new(workbook, &registry, &formulas, &async_calls, &hints);
        let mut keys: Vec<CellKey> = workbook
            .worksheet(0)
            .unwrap()
            .formula_cells()
            .map(|(row, col, _)| CellKey::new(0, row, col))
            .collect();
        keys.sort();
        for key in keys {
            pass.visit(key);
        }
        pass.finish()
    }

    #[test]
    fn test_each_cell_computed_once() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_content("A1", "=B1+C1").unwrap();
        sheet.set_content("B1", "=C1*2").unwrap();
        sheet.set_content("C1", "=1+1").unwrap();

        let outcome = run(&workbook);
        assert_eq!(outcome.computed, 3);
        let a1 = &outcome.cells[&CellKey::new(0, 0, 0)];
        assert_eq!(a1.state, CellState::Computed);
        assert_eq!(a1.result.value, Value::Number(6.0));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut workbook = Workbook::new();
        workbook
            .worksheet_mut(0)
            .unwrap()
            .set_content("A1", "=A1+1")
            .unwrap();

        let outcome = run(&workbook);
        let a1 = &outcome.cells[&CellKey::new(0, 0, 0)];
        assert_eq!(a1.state, CellState::Computed);
        assert_eq!(a1.result.as_error().map(|e| e.kind()), Some(ErrorKind::Cycle));
    }

    #[test]
    fn test_spill_conflict_is_flagged() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        // A1 reads B2 before B1 spills into it
        sheet.set_content("A1", "=B2*10").unwrap();
        sheet.set_content("B1", "={1;2}").unwrap();

        let outcome = run(&workbook);
        assert!(outcome.spill_conflict);
        assert_eq!(outcome.spills.zone(CellKey::new(0, 0, 1)).unwrap().to_string(), "B1:B2");
        assert_eq!(outcome.spills.owner(CellKey::new(0, 1, 1)), Some(CellKey::new(0, 0, 1)));
    }

    #[test]
    fn test_spill_blocked_by_content() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_content("A1", "={1,2,3}").unwrap();
        sheet.set_content("C1", "x").unwrap();

        let outcome = run(&workbook);
        let a1 = &outcome.cells[&CellKey::new(0, 0, 0)];
        assert_eq!(a1.result.as_error().map(|e| e.kind()), Some(ErrorKind::Spill));
        assert_eq!(outcome.spills.zone(CellKey::new(0, 0, 0)), None);
    }

    #[test]
    fn test_spill_map_removal() {
        let origin = CellKey::new(0, 0, 0);
        let mut spills = SpillMap::default();
        spills.insert(origin, CellRange::parse("A1:B2").unwrap());
        assert_eq!(spills.owner(CellKey::new(0, 1, 1)), Some(origin));
        assert_eq!(spills.owner(origin), None);

        let before = SpillMap::default();
        assert!(spills.has_new_zones(&before));
        spills.remove(origin);
        assert_eq!(spills.owner(CellKey::new(0, 1, 1)), None);
        assert!(!spills.has_new_zones(&before));
    }
}
