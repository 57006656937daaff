//! Prelude module - common imports for gridcalc users
//!
//! ```rust
//! use gridcalc::prelude::*;
//! ```

pub use crate::{
    // Engine types
    CalculationStats,
    CellState,
    Engine,
    EngineOptions,
    // Error types
    Error,
    Result,

    // Cell types
    CellAddress,
    CellContent,
    CellError,
    CellRange,
    CellResult,
    ErrorKind,
    Matrix,
    Value,

    // Grid
    Locale,
    Workbook,
    Worksheet,

    // Custom functions
    deferred,
    Arg,
    ArgDef,
    ArgType,
    FunctionDef,
    FunctionOutput,
    FunctionRegistry,
};
