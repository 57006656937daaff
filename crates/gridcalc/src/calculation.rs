//! Dependency-driven workbook evaluation
//!
//! The [`Engine`] owns a workbook and the evaluated value of every formula
//! cell. Passes visit formula cells precedents first, in an order taken from
//! the references of the compiled formulas; a reference the order missed
//! computes its cell on demand.
//! Asynchronous functions leave their cell `Loading...` until
//! [`Engine::tick`] sees their result settle.
//!
//! # Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_content("A1", "10").unwrap();
//! sheet.set_content("A2", "=A1*4").unwrap();
//!
//! let mut engine = Engine::new(workbook);
//! let stats = engine.evaluate_all();
//! assert_eq!(stats.formula_count, 1);
//! assert_eq!(engine.value(0, "A2").unwrap().value, Value::Number(40.0));
//! ```

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use gridcalc_core::{
    CellAddress, CellContent, CellError, CellId, CellRange, CellResult, ErrorKind, Locale,
    Value, Workbook, Worksheet, MAX_COLS, MAX_ROWS,
};
use gridcalc_formula::{parse_formula, CellKey, FormulaExpr, FunctionDef, FunctionRegistry};

use crate::dependency::DependencyGraph;
use crate::error::{Error, Result};
use crate::pass::{AsyncCalls, CellRecord, CellState, EvaluationPass, PendingCall, SpillMap};
use crate::scheduler::RecomputeScheduler;

/// Options for the engine
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineOptions {
    /// Delay between ticks in [`Engine::run_until_idle`] (default: 10ms)
    pub poll_interval: Duration,
    /// Overall bound for [`Engine::run_until_idle`] (default: none)
    pub async_timeout: Option<Duration>,
    /// Passes allowed when spills cover cells read as empty (default: 3)
    pub max_spill_passes: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            async_timeout: None,
            max_spill_passes: 3,
        }
    }
}

impl EngineOptions {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_async_timeout(mut self, timeout: Duration) -> Self {
        self.async_timeout = Some(timeout);
        self
    }

    pub fn with_max_spill_passes(mut self, passes: usize) -> Self {
        self.max_spill_passes = passes.max(1);
        self
    }
}

/// Statistics from an evaluation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of formula cells
    pub formula_count: usize,
    /// Number of formula cells computed
    pub cells_computed: usize,
    /// Cells holding a circular reference error
    pub cycles: usize,
    /// Cells holding any other error value
    pub errors: usize,
    /// Cells waiting on asynchronous results
    pub pending: usize,
    /// Number of passes run
    pub passes: usize,
}

pub(crate) type Compiled = std::result::Result<FormulaExpr, CellError>;

pub(crate) fn compile(formula: &str) -> Compiled {
    parse_formula(formula).map_err(|e| {
        log::warn!("Failed to compile {}: {}", formula, e);
        e.into_cell_error()
    })
}

/// Compiled formulas keyed by cell identity
///
/// Entries follow their cell across row and column shifts; an edited
/// formula is recompiled.
#[derive(Debug, Default)]
pub(crate) struct FormulaCache {
    entries: AHashMap<CellId, (String, Arc<Compiled>)>,
}

impl FormulaCache {
    /// Compile new or edited formulas and drop the others
    ///
    /// Returns how many formulas were compiled.
    pub fn refresh(&mut self, workbook: &Workbook) -> usize {
        let mut live = AHashMap::with_capacity(self.entries.len());
        let mut compiled = 0;
        for worksheet in workbook.worksheets() {
            for (_, _, cell) in worksheet.iter_cells() {
                let Some(formula) = cell.content.formula_text() else {
                    continue;
                };
                let entry = match self.entries.remove(&cell.id) {
                    Some((text, expr)) if text == formula => (text, expr),
                    _ => {
                        compiled += 1;
                        (formula.to_string(), Arc::new(compile(formula)))
                    }
                };
                live.insert(cell.id, entry);
            }
        }
        self.entries = live;
        compiled
    }

    pub fn get(&self, id: CellId, formula: &str) -> Option<Arc<Compiled>> {
        self.entries
            .get(&id)
            .filter(|(text, _)| text == formula)
            .map(|(_, expr)| expr.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Formula engine over an owned workbook
pub struct Engine {
    workbook: Workbook,
    registry: Arc<FunctionRegistry>,
    options: EngineOptions,
    formulas: FormulaCache,
    /// Records of the formula cells, from the last pass
    cells: AHashMap<CellKey, CellRecord>,
    spills: SpillMap,
    async_calls: AsyncCalls,
    scheduler: RecomputeScheduler,
    up_to_date: bool,
    last_stats: Option<CalculationStats>,
}

impl Engine {
    /// Create an engine with the built-in functions
    pub fn new(workbook: Workbook) -> Self {
        Self::with_registry(workbook, FunctionRegistry::shared())
    }

    /// Create an engine with a specific function registry
    pub fn with_registry(workbook: Workbook, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            workbook,
            registry,
            options: EngineOptions::default(),
            formulas: FormulaCache::default(),
            cells: AHashMap::new(),
            spills: SpillMap::default(),
            async_calls: AsyncCalls::default(),
            scheduler: RecomputeScheduler::new(),
            up_to_date: false,
            last_stats: None,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Register a custom function
    pub fn register_function(&mut self, name: &str, def: FunctionDef) -> Result<()> {
        Arc::make_mut(&mut self.registry).register(name, def)?;
        self.invalidate();
        Ok(())
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    /// Mutable access to the workbook; the next read re-evaluates
    pub fn workbook_mut(&mut self) -> &mut Workbook {
        self.invalidate();
        &mut self.workbook
    }

    /// Take the workbook back
    pub fn into_workbook(self) -> Workbook {
        self.workbook
    }

    pub fn is_up_to_date(&self) -> bool {
        self.up_to_date
    }

    /// Statistics of the last evaluation run
    pub fn last_stats(&self) -> Option<&CalculationStats> {
        self.last_stats.as_ref()
    }

    pub fn scheduler(&self) -> &RecomputeScheduler {
        &self.scheduler
    }

    /// Number of cells waiting on asynchronous results
    pub fn pending_count(&self) -> usize {
        self.cells.values().filter(|r| r.state.is_pending()).count()
    }

    fn invalidate(&mut self) {
        if self.up_to_date {
            log::trace!("Engine invalidated");
        }
        self.up_to_date = false;
    }

    // === Evaluation ===

    /// Evaluate every formula cell of the workbook
    ///
    /// Outstanding asynchronous calls are dropped and invoked again.
    pub fn evaluate_all(&mut self) -> CalculationStats {
        log::debug!(
            "Evaluating {} sheet(s) with {} pending call(s) dropped",
            self.workbook.sheet_count(),
            self.async_calls.pending.len()
        );
        self.async_calls.clear();
        self.recompute_all()
    }

    /// Evaluate the formula cells of one sheet
    ///
    /// Cells of other sheets keep their values unless a formula of this
    /// sheet reads them before they were ever computed.
    pub fn evaluate(&mut self, sheet: usize) -> Result<CalculationStats> {
        self.sheet(sheet)?;
        if self.workbook.sheet_count() == 1 {
            return Ok(self.evaluate_all());
        }

        log::debug!("Evaluating sheet {}", sheet);
        self.async_calls.retain_cells(|cell| cell.sheet != sheet);
        self.formulas.refresh(&self.workbook);

        let targets = self.formula_keys(Some(sheet));
        let mut base_cells = self.cells.clone();
        base_cells.retain(|key, _| key.sheet != sheet);
        let mut base_spills = self.spills.clone();
        base_spills.remove_sheet(sheet);

        let (passes, computed) = self.run_passes(&targets, base_cells, base_spills);
        Ok(self.finish_run(passes, computed))
    }

    /// Recompute the cells waiting on asynchronous results
    ///
    /// Waiting cells and cells whose asynchronous calls all settled are
    /// computed again; every other cell keeps its value. Falls back to a
    /// full pass, keeping settled results, when the workbook changed or a
    /// new spill appeared.
    pub fn evaluate_waiting(&mut self) -> CalculationStats {
        if !self.up_to_date {
            return self.recompute_all();
        }

        let mut targets: Vec<CellKey> = self
            .cells
            .iter()
            .filter(|(key, record)| match record.state {
                CellState::Waiting => true,
                CellState::PendingAsync => !self.async_calls.has_pending(**key),
                _ => false,
            })
            .map(|(key, _)| *key)
            .collect();
        targets.sort_unstable();
        log::debug!("Recomputing {} waiting cell(s)", targets.len());

        let before = self.spills.clone();
        let mut base_cells = self.cells.clone();
        let mut base_spills = self.spills.clone();
        for key in &targets {
            base_cells.remove(key);
            base_spills.remove(*key);
        }

        let (passes, computed) = self.run_passes(&targets, base_cells, base_spills);
        if self.spills.has_new_zones(&before) {
            log::debug!("New spill zones after partial pass, recomputing everything");
            return self.recompute_all();
        }
        self.finish_run(passes, computed)
    }

    /// Poll pending asynchronous calls and recompute what they unblock
    ///
    /// Returns the statistics of the partial pass when something settled.
    pub fn tick(&mut self) -> Option<CalculationStats> {
        let settled = self.async_calls.poll();
        let stats = if settled > 0 {
            log::debug!("{} asynchronous result(s) settled", settled);
            Some(self.evaluate_waiting())
        } else {
            None
        };
        self.sync_scheduler();
        stats
    }

    /// Evaluate if needed, then tick until no asynchronous result is pending
    ///
    /// Fails with [`Error::AsyncTimeout`] once `async_timeout` elapses.
    pub async fn run_until_idle(&mut self) -> Result<CalculationStats> {
        let options = self.options.clone();
        let drive = async {
            let mut stats = if self.up_to_date {
                self.last_stats.clone().unwrap_or_default()
            } else {
                self.evaluate_all()
            };
            while self.scheduler.is_armed() {
                tokio::time::sleep(options.poll_interval).await;
                if let Some(next) = self.tick() {
                    stats = next;
                }
            }
            stats
        };

        match options.async_timeout {
            Some(limit) => tokio::time::timeout(limit, drive)
                .await
                .map_err(|_| Error::AsyncTimeout(limit)),
            None => Ok(drive.await),
        }
    }

    fn recompute_all(&mut self) -> CalculationStats {
        self.formulas.refresh(&self.workbook);
        let targets = self.formula_keys(None);
        let (passes, computed) = self.run_passes(&targets, AHashMap::new(), SpillMap::default());
        self.up_to_date = true;
        self.finish_run(passes, computed)
    }

    /// Run passes over `targets` until no spill conflicts remain
    ///
    /// Returns the number of passes and of computed cells.
    fn run_passes(
        &mut self,
        targets: &[CellKey],
        base_cells: AHashMap<CellKey, CellRecord>,
        base_spills: SpillMap,
    ) -> (usize, usize) {
        let order = DependencyGraph::build(&self.workbook, &self.formulas, targets).recalc_order(targets);
        let mut hints = self.spills.clone();
        let mut passes = 0;
        let mut computed = 0;

        loop {
            passes += 1;
            let pass = EvaluationPass::new(
                &self.workbook,
                &self.registry,
                &self.formulas,
                &self.async_calls,
                &hints,
            )
            .with_state(base_cells.clone(), base_spills.clone());
            for key in &order {
                pass.visit(*key);
            }
            let outcome = pass.finish();
            computed += outcome.computed;

            for new in outcome.deferreds {
                self.async_calls.pending.insert(
                    (new.cell, new.call),
                    PendingCall {
                        function: new.function,
                        deferred: new.deferred,
                    },
                );
            }

            if !outcome.spill_conflict || passes >= self.options.max_spill_passes {
                self.cells = outcome.cells;
                self.spills = outcome.spills;
                break;
            }
            log::debug!("Spill zones moved during pass {}, repeating", passes);
            hints = outcome.spills;
        }
        (passes, computed)
    }

    fn finish_run(&mut self, passes: usize, computed: usize) -> CalculationStats {
        let mut stats = CalculationStats {
            formula_count: self.formulas.len(),
            cells_computed: computed,
            passes,
            ..Default::default()
        };
        for record in self.cells.values() {
            if record.state.is_pending() {
                stats.pending += 1;
            } else if let Some(error) = record.result.as_error() {
                match error.kind() {
                    ErrorKind::Cycle => stats.cycles += 1,
                    _ => stats.errors += 1,
                }
            }
        }

        log::debug!(
            "Evaluated {} formula(s): {} computed in {} pass(es), {} cycle(s), {} error(s), {} pending",
            stats.formula_count,
            stats.cells_computed,
            stats.passes,
            stats.cycles,
            stats.errors,
            stats.pending
        );
        self.sync_scheduler();
        self.last_stats = Some(stats.clone());
        stats
    }

    fn sync_scheduler(&mut self) {
        if self.async_calls.pending.is_empty() {
            self.scheduler.disarm();
        } else {
            self.scheduler.arm();
        }
    }

    /// Formula cells in row-major order, of one sheet or all of them
    fn formula_keys(&self, sheet: Option<usize>) -> Vec<CellKey> {
        let mut keys: Vec<CellKey> = self
            .workbook
            .worksheets()
            .enumerate()
            .filter(|(index, _)| sheet.map_or(true, |s| s == *index))
            .flat_map(|(index, worksheet)| {
                worksheet
                    .formula_cells()
                    .map(move |(row, col, _)| CellKey::new(index, row, col))
            })
            .collect();
        keys.sort_unstable();
        keys
    }

    // === Values ===

    /// Evaluated value of a cell by address string
    pub fn value(&mut self, sheet: usize, address: &str) -> Result<CellResult> {
        let addr = CellAddress::parse(address)?;
        self.value_at(sheet, addr.row, addr.col)
    }

    /// Evaluated value of a cell, evaluating the workbook if it changed
    pub fn value_at(&mut self, sheet: usize, row: u32, col: u16) -> Result<CellResult> {
        check_position(row, col)?;
        self.sheet(sheet)?;
        self.ensure_evaluated();

        let key = CellKey::new(sheet, row, col);
        let cell = self.sheet(sheet)?.cell_at(row, col);
        if let Some(cell) = cell {
            if cell.content.is_formula() {
                return Ok(self
                    .cells
                    .get(&key)
                    .map(|r| r.result.clone())
                    .unwrap_or_default());
            }
            if !cell.content.is_empty() {
                return Ok(CellResult {
                    value: cell.content.literal_value().unwrap_or_default(),
                    format: cell.format.clone(),
                });
            }
        }

        let spilled = self.spills.owner(key).and_then(|origin| {
            self.cells
                .get(&origin)?
                .spilled((col - origin.col) as usize, (row - origin.row) as usize)
                .cloned()
        });
        Ok(spilled.unwrap_or_else(|| CellResult {
            value: Value::Empty,
            format: cell.and_then(|c| c.format.clone()),
        }))
    }

    /// Evaluation state of a formula cell in the last pass
    pub fn state_at(&self, sheet: usize, row: u32, col: u16) -> CellState {
        self.cells
            .get(&CellKey::new(sheet, row, col))
            .map_or(CellState::Unvisited, |r| r.state)
    }

    /// Zone covered by the matrix spilled from a cell
    pub fn spread_zone(&mut self, sheet: usize, address: &str) -> Result<Option<CellRange>> {
        let addr = CellAddress::parse(address)?;
        self.sheet(sheet)?;
        self.ensure_evaluated();
        Ok(self.spills.zone(CellKey::new(sheet, addr.row, addr.col)))
    }

    /// Current sheet and position of a cell by identity
    pub fn cell_position(&self, id: CellId) -> Option<(usize, CellAddress)> {
        self.workbook
            .worksheets()
            .enumerate()
            .find_map(|(index, worksheet)| worksheet.position_of(id).map(|addr| (index, addr)))
    }

    fn ensure_evaluated(&mut self) {
        if !self.up_to_date {
            self.evaluate_all();
        }
    }

    // === Modification ===

    /// Set a cell from user input, parsed with the workbook locale
    pub fn set_content(&mut self, sheet: usize, address: &str, input: &str) -> Result<()> {
        let locale = self.workbook.locale().clone();
        self.sheet_mut(sheet)?.set_input(address, input, &locale)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_content_at<C: Into<CellContent>>(
        &mut self,
        sheet: usize,
        row: u32,
        col: u16,
        content: C,
    ) -> Result<()> {
        self.sheet_mut(sheet)?.set_content_at(row, col, content)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_format(&mut self, sheet: usize, address: &str, format: Option<&str>) -> Result<()> {
        self.sheet_mut(sheet)?.set_format(address, format)?;
        self.invalidate();
        Ok(())
    }

    pub fn clear_cell(&mut self, sheet: usize, address: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.sheet_mut(sheet)?.clear_cell_at(addr.row, addr.col);
        self.invalidate();
        Ok(())
    }

    pub fn insert_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.sheet_mut(sheet)?.insert_rows(at, count)?;
        self.invalidate();
        Ok(())
    }

    pub fn delete_rows(&mut self, sheet: usize, at: u32, count: u32) -> Result<()> {
        self.sheet_mut(sheet)?.delete_rows(at, count)?;
        self.invalidate();
        Ok(())
    }

    pub fn insert_columns(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.sheet_mut(sheet)?.insert_columns(at, count)?;
        self.invalidate();
        Ok(())
    }

    pub fn delete_columns(&mut self, sheet: usize, at: u16, count: u16) -> Result<()> {
        self.sheet_mut(sheet)?.delete_columns(at, count)?;
        self.invalidate();
        Ok(())
    }

    /// Add a sheet at the end; returns its index
    pub fn add_sheet(&mut self, name: &str) -> Result<usize> {
        let index = self.workbook.add_worksheet_with_name(name)?;
        self.invalidate();
        Ok(index)
    }

    pub fn rename_sheet(&mut self, index: usize, name: &str) -> Result<()> {
        self.workbook.rename_worksheet(index, name)?;
        self.invalidate();
        Ok(())
    }

    pub fn remove_sheet(&mut self, index: usize) -> Result<()> {
        self.workbook.remove_worksheet(index)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_locale(&mut self, locale: Locale) {
        self.workbook.settings_mut().locale = locale;
        self.invalidate();
    }

    fn sheet(&self, index: usize) -> Result<&Worksheet> {
        let count = self.workbook.sheet_count();
        self.workbook
            .worksheet(index)
            .ok_or(Error::Core(gridcalc_core::Error::SheetOutOfBounds(index, count)))
    }

    fn sheet_mut(&mut self, index: usize) -> Result<&mut Worksheet> {
        let count = self.workbook.sheet_count();
        self.workbook
            .worksheet_mut(index)
            .ok_or(Error::Core(gridcalc_core::Error::SheetOutOfBounds(index, count)))
    }
}

fn check_position(row: u32, col: u16) -> Result<()> {
    if row >= MAX_ROWS {
        return Err(gridcalc_core::Error::RowOutOfBounds(row, MAX_ROWS - 1).into());
    }
    if col >= MAX_COLS {
        return Err(gridcalc_core::Error::ColumnOutOfBounds(col, MAX_COLS - 1).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn engine_with(cells: &[(&str, &str)]) -> Engine {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        for (address, input) in cells {
            sheet.set_content(address, input).unwrap();
        }
        Engine::new(workbook)
    }

    #[test]
    fn test_formula_cache_follows_edits() {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_content("A1", "=1+1").unwrap();
        sheet.set_content("A2", "=1+").unwrap();

        let mut cache = FormulaCache::default();
        assert_eq!(cache.refresh(&workbook), 2);
        assert_eq!(cache.refresh(&workbook), 0);

        let id = workbook.worksheet(0).unwrap().cell_at(1, 0).unwrap().id;
        let bad = cache.get(id, "=1+").unwrap();
        assert!(bad.is_err());

        let sheet = workbook.worksheet_mut(0).unwrap();
        sheet.set_content("A1", "=2+2").unwrap();
        sheet.clear_cell_at(1, 0);
        assert_eq!(cache.refresh(&workbook), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(id, "=1+").is_none());
    }

    #[test]
    fn test_parse_failure_is_bad_expression() {
        let mut engine = engine_with(&[("A1", "=SUM(1,")]);
        let value = engine.value(0, "A1").unwrap().value;
        assert_eq!(value.as_error().map(|e| e.kind()), Some(ErrorKind::BadExpression));
    }

    #[test]
    fn test_lazy_reevaluation_after_edit() {
        let mut engine = engine_with(&[("A1", "2"), ("A2", "=A1*3")]);
        assert_eq!(engine.value(0, "A2").unwrap().value, Value::Number(6.0));
        assert!(engine.is_up_to_date());

        engine.set_content(0, "A1", "5").unwrap();
        assert!(!engine.is_up_to_date());
        assert_eq!(engine.value(0, "A2").unwrap().value, Value::Number(15.0));
    }

    #[test]
    fn test_direct_workbook_edits_invalidate() {
        let mut engine = engine_with(&[("A1", "2"), ("A2", "=A1+1")]);
        assert_eq!(engine.value(0, "A2").unwrap().value, Value::Number(3.0));

        let sheet = engine.workbook_mut().worksheet_mut(0).unwrap();
        sheet.set_content("A1", "9").unwrap();
        assert!(!engine.is_up_to_date());
        assert_eq!(engine.value(0, "A2").unwrap().value, Value::Number(10.0));

        let workbook = engine.into_workbook();
        assert_eq!(workbook.sheet_count(), 1);
    }

    #[test]
    fn test_literal_and_empty_values() {
        let mut engine = engine_with(&[("A1", "hello")]);
        engine.set_format(0, "B1", Some("0.00")).unwrap();
        assert_eq!(engine.value(0, "A1").unwrap().value, Value::text("hello"));
        let b1 = engine.value(0, "B1").unwrap();
        assert_eq!(b1.value, Value::Empty);
        assert_eq!(b1.format.as_deref(), Some("0.00"));
        assert!(engine.value(3, "A1").is_err());
    }

    #[test]
    fn test_stats_count_errors_and_cycles() {
        let mut engine = engine_with(&[("A1", "=1/0"), ("B1", "=B2"), ("B2", "=B1"), ("C1", "=1")]);
        let stats = engine.evaluate_all();
        assert_eq!(stats.formula_count, 4);
        assert_eq!(stats.cells_computed, 4);
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.passes, 1);
        assert_eq!(engine.last_stats(), Some(&stats));
    }

    #[test]
    fn test_options_builder() {
        let options = EngineOptions::default()
            .with_poll_interval(Duration::from_millis(1))
            .with_async_timeout(Duration::from_secs(2))
            .with_max_spill_passes(0);
        assert_eq!(options.poll_interval, Duration::from_millis(1));
        assert_eq!(options.async_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.max_spill_passes, 1);
    }
}
