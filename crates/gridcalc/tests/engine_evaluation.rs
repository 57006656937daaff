//! Tests for workbook evaluation through the engine

use gridcalc::prelude::*;
use gridcalc::RegistrationError;
use pretty_assertions::assert_eq;

fn engine_with(cells: &[(&str, &str)]) -> Engine {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for (address, input) in cells {
        sheet.set_content(address, input).unwrap();
    }
    Engine::new(workbook)
}

fn value(engine: &mut Engine, address: &str) -> Value {
    engine.value(0, address).unwrap().value
}

fn kind(engine: &mut Engine, address: &str) -> Option<ErrorKind> {
    value(engine, address).as_error().map(|e| e.kind())
}

/// Test conditional sums over cells holding numbers and formulas
#[test]
fn test_sumif_over_formula_cells() {
    let mut engine = engine_with(&[
        ("A1", "10"),
        ("A2", "=A1*3"),
        ("A3", "2"),
        ("B1", "=SUMIF(A1:A3, \">5\")"),
    ]);
    assert_eq!(value(&mut engine, "B1"), Value::Number(40.0));
}

/// Test that a two-cell cycle gives #CYCLE on both cells
#[test]
fn test_two_cell_cycle() {
    let mut engine = engine_with(&[("A1", "=B1+1"), ("B1", "=A1+1"), ("C1", "=A1*2")]);
    let stats = engine.evaluate_all();
    assert_eq!(kind(&mut engine, "A1"), Some(ErrorKind::Cycle));
    assert_eq!(kind(&mut engine, "B1"), Some(ErrorKind::Cycle));
    // Readers of a cycle receive the error value
    assert_eq!(kind(&mut engine, "C1"), Some(ErrorKind::Cycle));
    assert_eq!(engine.state_at(0, 0, 0), CellState::Computed);
    assert_eq!(stats.cycles, 3);
}

/// Test that a reference chain evaluates in dependency order
#[test]
fn test_reference_chain() {
    let mut cells = vec![("A1".to_string(), "1".to_string())];
    for row in 2..=40 {
        cells.push((format!("A{}", row), format!("=A{}+1", row - 1)));
    }
    let refs: Vec<(&str, &str)> = cells.iter().map(|(a, c)| (a.as_str(), c.as_str())).collect();
    let mut engine = engine_with(&refs);
    let stats = engine.evaluate_all();
    assert_eq!(stats.formula_count, 39);
    assert_eq!(stats.cells_computed, 39);
    assert_eq!(value(&mut engine, "A40"), Value::Number(40.0));
}

/// Test a long chain whose first cell depends on all the others
#[test]
fn test_long_downward_chain() {
    const LEN: usize = 10_000;
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for row in 1..=LEN {
        sheet.set_content(&format!("A{}", row), &format!("=A{}+1", row + 1)).unwrap();
    }
    sheet.set_content(&format!("A{}", LEN + 1), "0").unwrap();

    let mut engine = Engine::new(workbook);
    let stats = engine.evaluate_all();
    assert_eq!(stats.cells_computed, LEN);
    assert_eq!(stats.errors, 0);
    assert_eq!(value(&mut engine, "A1"), Value::Number(LEN as f64));
}

/// Test a long running total read through ranges
#[test]
fn test_long_running_total() {
    const LEN: usize = 10_000;
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for row in 1..LEN {
        sheet.set_content(&format!("B{}", row), &format!("=SUM(B{0}:B{0})+1", row + 1)).unwrap();
    }
    sheet.set_content(&format!("B{}", LEN), "1").unwrap();

    let mut engine = Engine::new(workbook);
    assert_eq!(value(&mut engine, "B1"), Value::Number(LEN as f64));
}

/// Test cross-sheet references and sheet renames
#[test]
fn test_cross_sheet_references() {
    let mut engine = engine_with(&[("A1", "=Data!B2*2")]);
    engine.add_sheet("Data").unwrap();
    engine.set_content(1, "B2", "21").unwrap();
    assert_eq!(value(&mut engine, "A1"), Value::Number(42.0));

    engine.rename_sheet(1, "Inputs").unwrap();
    assert!(!engine.is_up_to_date());
    assert_eq!(kind(&mut engine, "A1"), Some(ErrorKind::InvalidReference));

    engine.set_content(0, "A1", "=inputs!B2*2").unwrap();
    assert_eq!(value(&mut engine, "A1"), Value::Number(42.0));
}

/// Test evaluating a single sheet of a workbook
#[test]
fn test_evaluate_one_sheet() {
    let mut engine = engine_with(&[("A1", "5")]);
    engine.add_sheet("Other").unwrap();
    engine.set_content(1, "A1", "=Sheet1!A1+1").unwrap();
    engine.set_content(0, "B1", "=A1*2").unwrap();

    let stats = engine.evaluate(1).unwrap();
    assert_eq!(stats.cells_computed, 1);
    assert_eq!(engine.state_at(1, 0, 0), CellState::Computed);
    assert_eq!(engine.state_at(0, 0, 1), CellState::Unvisited);
    assert!(engine.evaluate(5).is_err());
}

/// Test that structural changes invalidate evaluated values
#[test]
fn test_structural_changes_invalidate() {
    let mut engine = engine_with(&[("A1", "4"), ("B1", "=SUM(A1:A3)")]);
    assert_eq!(value(&mut engine, "B1"), Value::Number(4.0));

    let id = engine.workbook().worksheet(0).unwrap().cell_at(0, 1).unwrap().id;
    engine.insert_rows(0, 0, 1).unwrap();
    assert!(!engine.is_up_to_date());
    // The formula moved with its cell; its text is unchanged
    assert_eq!(engine.cell_position(id), Some((0, CellAddress::new(1, 1))));
    assert_eq!(value(&mut engine, "B2"), Value::Number(4.0));

    engine.set_content(0, "A3", "6").unwrap();
    assert_eq!(value(&mut engine, "B2"), Value::Number(10.0));

    engine.delete_rows(0, 0, 1).unwrap();
    assert_eq!(engine.cell_position(id), Some((0, CellAddress::new(0, 1))));
    assert_eq!(value(&mut engine, "B1"), Value::Number(10.0));
}

/// Test matrix results spilling into neighbouring cells
#[test]
fn test_matrix_spills() {
    let mut engine = engine_with(&[("A1", "={1,2;3,4}"), ("D1", "=SUM(A1#)"), ("D2", "=B2*10")]);
    assert_eq!(value(&mut engine, "A1"), Value::Number(1.0));
    assert_eq!(value(&mut engine, "B1"), Value::Number(2.0));
    assert_eq!(value(&mut engine, "A2"), Value::Number(3.0));
    assert_eq!(value(&mut engine, "B2"), Value::Number(4.0));
    assert_eq!(value(&mut engine, "D1"), Value::Number(10.0));
    assert_eq!(value(&mut engine, "D2"), Value::Number(40.0));
    assert_eq!(
        engine.spread_zone(0, "A1").unwrap().map(|z| z.to_string()),
        Some("A1:B2".to_string())
    );
    assert_eq!(engine.spread_zone(0, "D1").unwrap(), None);
}

/// Test that a reader computed before the spilling cell sees the spill
#[test]
fn test_spill_read_before_origin() {
    // A1 is visited first and reads C2 before C1 spilled
    let mut engine = engine_with(&[("A1", "=C2+1"), ("C1", "={10;20}")]);
    let stats = engine.evaluate_all();
    assert_eq!(stats.passes, 2);
    assert_eq!(value(&mut engine, "A1"), Value::Number(21.0));

    // Previous spills are hints: one pass is enough now
    let stats = engine.evaluate_all();
    assert_eq!(stats.passes, 1);
    assert_eq!(value(&mut engine, "A1"), Value::Number(21.0));
}

/// Test #SPILL! when the spill zone is not blank
#[test]
fn test_spill_conflicts() {
    let mut engine = engine_with(&[("A1", "={1,2,3}"), ("C1", "x")]);
    assert_eq!(kind(&mut engine, "A1"), Some(ErrorKind::Spill));
    assert_eq!(value(&mut engine, "B1"), Value::Empty);

    engine.clear_cell(0, "C1").unwrap();
    assert_eq!(value(&mut engine, "C1"), Value::Number(3.0));

    // Two spills claiming the same cell
    engine.set_content(0, "B2", "={7;8}").unwrap();
    engine.set_content(0, "A3", "={5,6}").unwrap();
    assert_eq!(value(&mut engine, "B3"), Value::Number(8.0));
    assert_eq!(kind(&mut engine, "A3"), Some(ErrorKind::Spill));
}

/// Test format hints flowing from functions and cells
#[test]
fn test_format_hints() {
    let mut engine = engine_with(&[("A1", "=DATE(2024,1,15)"), ("A2", "=A1+1")]);
    let a1 = engine.value(0, "A1").unwrap();
    assert_eq!(a1.value, Value::Number(45306.0));
    assert_eq!(a1.format.as_deref(), Some("m/d/yyyy"));
    assert_eq!(engine.value(0, "A2").unwrap().value, Value::Number(45307.0));

    engine.set_format(0, "B1", Some("0%")).unwrap();
    engine.set_content(0, "B1", "0.25").unwrap();
    assert_eq!(engine.value(0, "B1").unwrap().format.as_deref(), Some("0%"));
}

/// Test locale-aware input and coercions
#[test]
fn test_locale_changes() {
    let mut engine = engine_with(&[("A1", "=B1*2")]);
    engine.set_locale(Locale::fr_fr());
    engine.set_content(0, "B1", "1,5").unwrap();
    assert_eq!(value(&mut engine, "A1"), Value::Number(3.0));
}

/// Test custom function registration
#[test]
fn test_custom_function() {
    let mut engine = engine_with(&[("A1", "=TWICE(21)"), ("A2", "=TWICE(A1:A1)")]);
    let twice = FunctionDef::new(
        "Doubles a number.",
        vec![ArgDef::new("value", &[ArgType::Number])],
        |args, ctx| Ok((ctx.number(&args[0])? * 2.0).into()),
    );
    engine.register_function("twice", twice.clone()).unwrap();
    assert_eq!(value(&mut engine, "A1"), Value::Number(42.0));
    assert_eq!(value(&mut engine, "A2"), Value::Number(84.0));

    assert!(matches!(
        engine.register_function("TWICE", twice),
        Err(Error::Registration(RegistrationError::Duplicate(_)))
    ));
    // The shared built-in registry is untouched
    assert!(!FunctionRegistry::shared().contains("TWICE"));
}

/// Test unknown functions and bad expressions
#[test]
fn test_invalid_formulas() {
    let mut engine = engine_with(&[("A1", "=NOPE(1)"), ("A2", "=1+*2"), ("A3", "=IFERROR(A1, \"ok\")")]);
    assert_eq!(kind(&mut engine, "A1"), Some(ErrorKind::UnknownFunction));
    assert_eq!(kind(&mut engine, "A2"), Some(ErrorKind::BadExpression));
    assert_eq!(value(&mut engine, "A3"), Value::text("ok"));
}

/// Test worked examples of the function library end to end
#[test]
fn test_library_examples() {
    let mut engine = engine_with(&[
        ("A1", "1"),
        ("A2", "2"),
        ("A3", "3"),
        ("A4", "4"),
        ("B1", "=PERCENTILE.EXC(A1:A4, 0.5)"),
        ("B2", "=PERCENTILE.EXC(A1:A4, 0.1)"),
        ("B3", "=RATE(10, 100, 1000)"),
        ("B4", "=COUNTIF(C1:C3, \"<5\")"),
        ("C1", "3"),
        ("C2", "5"),
        ("C3", "7"),
    ]);
    assert_eq!(value(&mut engine, "B1"), Value::Number(2.5));
    assert!(value(&mut engine, "B2").is_error());
    assert_eq!(kind(&mut engine, "B3"), Some(ErrorKind::Generic));
    assert_eq!(value(&mut engine, "B4"), Value::Number(1.0));
}
