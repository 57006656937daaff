//! Static dependency ordering of formula cells
//!
//! References are read from the compiled formulas before a pass starts, and
//! the pass visits cells precedents first. Each visit then finds the cells
//! it reads already computed, which keeps evaluation shallow however long
//! a reference chain is. References only known at evaluation time (spilled
//! cells, ranges returned by functions) are still resolved lazily.

use std::collections::BTreeSet;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use gridcalc_core::{CellRange, Workbook};
use gridcalc_formula::{CellKey, FormulaExpr};

use crate::calculation::{Compiled, FormulaCache};

/// Precedents of a set of formula cells, restricted to that set
#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    precedents: AHashMap<CellKey, Vec<CellKey>>,
}

impl DependencyGraph {
    /// Extract the references of every cell in `cells`
    pub fn build(workbook: &Workbook, formulas: &FormulaCache, cells: &[CellKey]) -> Self {
        let mut by_sheet: AHashMap<usize, BTreeSet<(u32, u16)>> = AHashMap::new();
        for key in cells {
            by_sheet.entry(key.sheet).or_default().insert((key.row, key.col));
        }
        let members = Members { by_sheet };

        let mut precedents = AHashMap::with_capacity(cells.len());
        for &key in cells {
            let Some(compiled) = compiled_formula(workbook, formulas, key) else {
                continue;
            };
            let Ok(expr) = compiled.as_ref() else {
                continue;
            };
            let mut refs = Vec::new();
            collect_references(expr, key.sheet, workbook, &members, &mut refs);
            refs.sort_unstable();
            refs.dedup();
            if !refs.is_empty() {
                precedents.insert(key, refs);
            }
        }
        Self { precedents }
    }

    pub fn precedents(&self, cell: CellKey) -> &[CellKey] {
        self.precedents.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Order `roots` and their precedents so that precedents come first
    ///
    /// Roots keep their relative order where no dependency forces another
    /// one. References closing a cycle are skipped; the pass reports them.
    pub fn recalc_order(&self, roots: &[CellKey]) -> Vec<CellKey> {
        let mut order = Vec::with_capacity(roots.len());
        let mut visited = AHashSet::with_capacity(roots.len());
        let mut stack: Vec<(CellKey, usize)> = Vec::new();

        for &root in roots {
            if !visited.insert(root) {
                continue;
            }
            stack.push((root, 0));
            while let Some((cell, next)) = stack.last_mut() {
                let cell = *cell;
                match self.precedents(cell).get(*next) {
                    Some(&precedent) => {
                        *next += 1;
                        if visited.insert(precedent) {
                            stack.push((precedent, 0));
                        }
                    }
                    None => {
                        stack.pop();
                        order.push(cell);
                    }
                }
            }
        }
        order
    }
}

struct Members {
    by_sheet: AHashMap<usize, BTreeSet<(u32, u16)>>,
}

impl Members {
    fn contains(&self, key: CellKey) -> bool {
        self.by_sheet
            .get(&key.sheet)
            .map_or(false, |cells| cells.contains(&(key.row, key.col)))
    }

    fn within(&self, sheet: usize, range: &CellRange, out: &mut Vec<CellKey>) {
        let Some(cells) = self.by_sheet.get(&sheet) else {
            return;
        };
        let (start, end) = (range.start, range.end);
        out.extend(
            cells
                .range((start.row, 0)..=(end.row, u16::MAX))
                .filter(|(_, col)| *col >= start.col && *col <= end.col)
                .map(|&(row, col)| CellKey::new(sheet, row, col)),
        );
    }
}

fn compiled_formula(workbook: &Workbook, formulas: &FormulaCache, key: CellKey) -> Option<Arc<Compiled>> {
    let cell = workbook.worksheet(key.sheet)?.cell_at(key.row, key.col)?;
    formulas.get(cell.id, cell.content.formula_text()?)
}

/// Unknown sheet names reference nothing; the pass turns them into `#REF`
fn target_sheet(sheet: Option<&String>, current: usize, workbook: &Workbook) -> Option<usize> {
    match sheet {
        Some(name) => workbook.sheet_index(name),
        None => Some(current),
    }
}

fn collect_references(
    expr: &FormulaExpr,
    current: usize,
    workbook: &Workbook,
    members: &Members,
    refs: &mut Vec<CellKey>,
) {
    match expr {
        FormulaExpr::CellRef(cell) | FormulaExpr::SpreadRef(cell) => {
            if let Some(sheet) = target_sheet(cell.sheet.as_ref(), current, workbook) {
                let key = CellKey::new(sheet, cell.address.row, cell.address.col);
                if members.contains(key) {
                    refs.push(key);
                }
            }
        }
        FormulaExpr::RangeRef(range) => {
            if let Some(sheet) = target_sheet(range.sheet.as_ref(), current, workbook) {
                members.within(sheet, &range.range, refs);
            }
        }
        FormulaExpr::BinaryOp { left, right, .. } => {
            collect_references(left, current, workbook, members, refs);
            collect_references(right, current, workbook, members, refs);
        }
        FormulaExpr::UnaryOp { operand, .. } => {
            collect_references(operand, current, workbook, members, refs);
        }
        FormulaExpr::Function { args, .. } => {
            for arg in args {
                collect_references(arg, current, workbook, members, refs);
            }
        }
        FormulaExpr::Array(rows) => {
            for expr in rows.iter().flatten() {
                collect_references(expr, current, workbook, members, refs);
            }
        }
        FormulaExpr::Number(_)
        | FormulaExpr::String(_)
        | FormulaExpr::Boolean(_)
        | FormulaExpr::Error(_)
        | FormulaExpr::NameRef(_)
        | FormulaExpr::Missing => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph_for(cells: &[(&str, &str)]) -> (DependencyGraph, Vec<CellKey>) {
        let mut workbook = Workbook::new();
        let sheet = workbook.worksheet_mut(0).unwrap();
        for (address, input) in cells {
            sheet.set_content(address, input).unwrap();
        }
        let mut formulas = FormulaCache::default();
        formulas.refresh(&workbook);
        let mut keys: Vec<CellKey> = workbook
            .worksheet(0)
            .unwrap()
            .formula_cells()
            .map(|(row, col, _)| CellKey::new(0, row, col))
            .collect();
        keys.sort_unstable();
        (DependencyGraph::build(&workbook, &formulas, &keys), keys)
    }

    #[test]
    fn test_precedents_are_formula_cells() {
        let (graph, _) = graph_for(&[
            ("A1", "1"),
            ("A2", "=A1+1"),
            ("A3", "=SUM(A1:A2)*B1#"),
            ("B1", "={1,2}"),
        ]);
        assert!(graph.precedents(CellKey::new(0, 1, 0)).is_empty());
        assert_eq!(
            graph.precedents(CellKey::new(0, 2, 0)),
            &[CellKey::new(0, 0, 1), CellKey::new(0, 1, 0)]
        );
    }

    #[test]
    fn test_order_puts_precedents_first() {
        let (graph, keys) = graph_for(&[("A1", "=A2+1"), ("A2", "=A3+1"), ("A3", "=B1"), ("B1", "4")]);
        assert_eq!(
            graph.recalc_order(&keys),
            vec![CellKey::new(0, 2, 0), CellKey::new(0, 1, 0), CellKey::new(0, 0, 0)]
        );
    }

    #[test]
    fn test_cycles_and_unknown_sheets() {
        let (graph, keys) = graph_for(&[("A1", "=B1"), ("B1", "=A1+Nowhere!A1"), ("C1", "=C1")]);
        assert_eq!(graph.precedents(CellKey::new(0, 0, 1)), &[CellKey::new(0, 0, 0)]);
        let order = graph.recalc_order(&keys);
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], CellKey::new(0, 0, 1));
    }
}
