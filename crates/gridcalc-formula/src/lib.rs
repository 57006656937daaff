//! # gridcalc-formula
//!
//! Formula parser, calling convention and function library for gridcalc.
//!
//! This crate provides:
//! - Formula parsing (text → AST)
//! - Formula evaluation against a [`Getters`] view of the grid
//! - Argument declarations, coercions and vectorization of scalar functions
//! - The built-in function library and an open [`FunctionRegistry`]
//! - Criterion matching, ordered search and numeric kernels shared by functions
//!
//! ## Example
//!
//! ```rust
//! use gridcalc_core::{Value, Workbook};
//! use gridcalc_formula::{CellKey, FunctionRegistry, GridGetters};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//! sheet.set_content("A1", "10").unwrap();
//! sheet.set_content("A2", "30").unwrap();
//!
//! let registry = FunctionRegistry::builtin();
//! let getters = GridGetters::new(&workbook, &registry);
//! let output = getters
//!     .evaluate_text("=SUMIF(A1:A2, \">15\")", CellKey::new(0, 5, 0))
//!     .unwrap();
//! assert_eq!(output.into_top_left().value, Value::Number(30.0));
//! ```

pub mod args;
pub mod ast;
pub mod coerce;
pub mod criteria;
pub mod dates;
pub mod deferred;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod getters;
pub mod kernels;
pub mod parser;
pub mod reduce;
pub mod search;

#[cfg(test)]
mod testing;

pub use args::{Arg, ArgDef, ArgType, FunctionOutput, Order, RangeArg, ReturnFormat, ZoneView};
pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use deferred::{deferred, Deferred, DeferredState, Resolver};
pub use error::{FormulaError, FormulaResult, RegistrationError, FUNCTION_NAME_PLACEHOLDER};
pub use evaluator::{evaluate_formula, CallContext, EvaluationContext, FormulaOutput};
pub use functions::{normalize_function_name, ComputeFn, FunctionDef, FunctionRegistry};
pub use getters::{AsyncSlot, CellKey, Getters, GridGetters};
pub use parser::parse_formula;
pub use search::{SearchMode, SortOrder};
