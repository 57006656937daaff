//! # gridcalc
//!
//! A dependency-driven spreadsheet formula engine.
//!
//! gridcalc evaluates the formulas of a workbook the way a spreadsheet
//! does, with a built-in function library and support for custom and
//! asynchronous functions.
//!
//! ## Features
//!
//! - Dependency-ordered, memoized evaluation with circular reference detection
//! - Matrix results spilling into neighbouring cells
//! - Asynchronous functions resolved by a polling scheduler
//! - Criteria, lookup, statistical, financial, date and text functions
//! - Locale-aware coercions (`en_US`, `fr_FR`)
//!
//! ## Example
//!
//! ```rust
//! use gridcalc::prelude::*;
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_content("A1", "10").unwrap();
//! sheet.set_content("A2", "30").unwrap();
//! sheet.set_content("B1", "=SUMIF(A1:A2, \">5\")").unwrap();
//! sheet.set_content("C1", "={1,2;3,4}").unwrap();
//!
//! let mut engine = Engine::new(workbook);
//! assert_eq!(engine.value(0, "B1").unwrap().value, Value::Number(40.0));
//!
//! // C1 spills into C1:D2
//! assert_eq!(engine.value(0, "D2").unwrap().value, Value::Number(4.0));
//! ```

pub mod calculation;
mod dependency;
pub mod error;
pub mod pass;
pub mod prelude;
pub mod scheduler;

pub use calculation::{CalculationStats, Engine, EngineOptions};
pub use error::{Error, Result};
pub use pass::CellState;
pub use scheduler::RecomputeScheduler;

// Re-export core types
pub use gridcalc_core::{
    CellAddress, CellContent, CellData, CellError, CellId, CellRange, CellResult, DateOrder,
    ErrorKind, Locale, Matrix, SharedString, Value, Workbook, WorkbookSettings, Worksheet,
};

// Re-export formula types
pub use gridcalc_formula::{
    deferred, parse_formula, Arg, ArgDef, ArgType, CallContext, Deferred, DeferredState,
    FormulaError, FormulaExpr, FormulaResult, FunctionDef, FunctionOutput, FunctionRegistry,
    RegistrationError, Resolver, ReturnFormat,
};
