//! Evaluation helpers for unit tests

use gridcalc_core::{ErrorKind, Value, Workbook};

use crate::evaluator::FormulaOutput;
use crate::functions::FunctionRegistry;
use crate::getters::{CellKey, GridGetters};

/// Evaluate `formula` on a sheet holding `cells`, away from them
pub(crate) fn eval_output(cells: &[(&str, &str)], formula: &str) -> FormulaOutput {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for (address, content) in cells {
        sheet.set_content(address, content).unwrap();
    }
    let registry = FunctionRegistry::shared();
    let getters = GridGetters::new(&workbook, &registry);
    getters
        .evaluate_text(formula, CellKey::new(0, 10_000, 200))
        .unwrap()
}

pub(crate) fn eval_with(cells: &[(&str, &str)], formula: &str) -> Value {
    eval_output(cells, formula).into_top_left().value
}

pub(crate) fn eval(formula: &str) -> Value {
    eval_with(&[], formula)
}

pub(crate) fn number(value: Value) -> f64 {
    match value {
        Value::Number(n) => n,
        other => panic!("expected a number, got {:?}", other),
    }
}

pub(crate) fn eval_number(formula: &str) -> f64 {
    number(eval(formula))
}

pub(crate) fn error_kind(value: &Value) -> Option<ErrorKind> {
    value.as_error().map(|e| e.kind())
}

pub(crate) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}
