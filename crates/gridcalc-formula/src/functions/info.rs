//! Information functions

use gridcalc_core::{ErrorKind, Value};

use super::{FunctionDef, FunctionRegistry};
use crate::args::{ArgDef, ArgType::Any};
use crate::error::FormulaError;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let checks: [(&str, &str, fn(&Value) -> bool); 8] = [
        ("ISBLANK", "Checks whether the referenced cell is empty.", Value::is_empty),
        ("ISERR", "Whether a value is an error other than #N/A.", |v| {
            v.as_error().map_or(false, |e| e.kind() != ErrorKind::NotAvailable)
        }),
        ("ISERROR", "Whether a value is an error.", Value::is_error),
        ("ISLOGICAL", "Whether a value is `true` or `false`.", Value::is_boolean),
        ("ISNA", "Whether a value is the error #N/A.", |v| {
            v.as_error().map_or(false, |e| e.kind() == ErrorKind::NotAvailable)
        }),
        ("ISNONTEXT", "Whether a value is non-textual.", |v| !v.is_text()),
        ("ISNUMBER", "Whether a value is a number.", Value::is_number),
        ("ISTEXT", "Whether a value is text.", Value::is_text),
    ];
    for (name, description, check) in checks {
        registry.add(
            name,
            FunctionDef::new(description, vec![ArgDef::new("value", &[Any])], move |args, _| {
                Ok(check(&args[0].to_value()?).into())
            }),
        );
    }

    registry.add(
        "NA",
        FunctionDef::new("Returns the error value #N/A.", vec![], |_, _| {
            Err(FormulaError::not_available("Not available."))
        }),
    );
}
