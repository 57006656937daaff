//! Property tests for engine evaluation

use gridcalc::prelude::*;
use proptest::prelude::*;

fn engine_with(cells: &[(String, String)]) -> Engine {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for (address, input) in cells {
        sheet.set_content(address, input).unwrap();
    }
    Engine::new(workbook)
}

fn column(values: &[f64]) -> Vec<(String, String)> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("A{}", i + 1), v.to_string()))
        .collect()
}

proptest! {
    #[test]
    fn chains_evaluate_in_either_direction(len in 1usize..25, downwards in any::<bool>()) {
        // Downwards chains make the first visited cell depend on all others
        let mut cells: Vec<(String, String)> = (1..=len)
            .map(|row| {
                let (target, source) = if downwards { (row, row + 1) } else { (row + 1, row) };
                (format!("B{}", target), format!("=B{}+1", source))
            })
            .collect();
        let (seed, last) = if downwards { (len + 1, 1) } else { (1, len + 1) };
        cells.push((format!("B{}", seed), "0".to_string()));

        let mut engine = engine_with(&cells);
        let stats = engine.evaluate_all();
        prop_assert_eq!(stats.cells_computed, len);
        let value = engine.value(0, &format!("B{}", last)).unwrap().value;
        prop_assert_eq!(value, Value::Number(len as f64));
    }

    #[test]
    fn sum_matches_iterator_sum(values in prop::collection::vec(-1000i32..1000, 1..40)) {
        let numbers: Vec<f64> = values.iter().map(|v| f64::from(*v)).collect();
        let mut cells = column(&numbers);
        cells.push(("C1".to_string(), format!("=SUM(A1:A{})", numbers.len())));
        let mut engine = engine_with(&cells);
        let expected: f64 = numbers.iter().sum();
        prop_assert_eq!(engine.value(0, "C1").unwrap().value, Value::Number(expected));
    }

    #[test]
    fn approximate_match_agrees_with_linear_scan(
        steps in prop::collection::vec(1i32..10, 1..30),
        key in -5i32..200,
    ) {
        let sorted: Vec<f64> = steps
            .iter()
            .scan(0, |total, step| {
                *total += step;
                Some(f64::from(*total))
            })
            .collect();
        let mut cells = column(&sorted);
        cells.push(("C1".to_string(), format!("=MATCH({}, A1:A{}, 1)", key, sorted.len())));
        let mut engine = engine_with(&cells);

        let position = sorted.iter().filter(|v| **v <= f64::from(key)).count();
        let value = engine.value(0, "C1").unwrap().value;
        if position == 0 {
            prop_assert_eq!(value.as_error().map(|e| e.kind()), Some(ErrorKind::NotAvailable));
        } else {
            prop_assert_eq!(value, Value::Number(position as f64));
        }
    }

    #[test]
    fn equality_criterion_matches_numbers_and_numeric_text(n in 0i32..50, copies in 1usize..6) {
        let mut cells = Vec::new();
        for i in 0..copies {
            cells.push((format!("A{}", 2 * i + 1), n.to_string()));
            cells.push((format!("A{}", 2 * i + 2), format!("=\"{}\"", n)));
        }
        cells.push(("C1".to_string(), format!("=COUNTIF(A1:A{}, \"={}\")", 2 * copies, n)));
        cells.push(("C2".to_string(), format!("=COUNTIF(A1:A{}, \"{}\")", 2 * copies, n)));
        let mut engine = engine_with(&cells);
        let expected = Value::Number((2 * copies) as f64);
        prop_assert_eq!(engine.value(0, "C1").unwrap().value, expected.clone());
        prop_assert_eq!(engine.value(0, "C2").unwrap().value, expected);
    }

    #[test]
    fn cycles_never_overflow(len in 2usize..25) {
        let cells: Vec<(String, String)> = (1..=len)
            .map(|row| (format!("A{}", row), format!("=A{}+1", row % len + 1)))
            .collect();
        let mut engine = engine_with(&cells);
        let stats = engine.evaluate_all();
        prop_assert_eq!(stats.cycles, len);
        for row in 1..=len {
            let value = engine.value(0, &format!("A{}", row)).unwrap().value;
            prop_assert_eq!(value.as_error().map(|e| e.kind()), Some(ErrorKind::Cycle));
        }
    }
}
