//! Formula evaluator
//!
//! Evaluates a compiled formula for one cell. Operators and functions all go
//! through the registry's calling convention:
//!
//! - arguments are shaped per declaration (ranges stay lazy zone views,
//!   single cells are dereferenced for scalar parameters),
//! - a scalar-only parameter receiving a range vectorizes the call,
//! - failures become error values once per call, except the control
//!   signals which unwind to the cell.

use std::cell::Cell;

use gridcalc_core::{CellAddress, CellError, CellRange, CellResult, ErrorKind, Locale, Matrix, Value};

use crate::args::{check_arg_count, def_for, Arg, FunctionOutput, RangeArg, ReturnFormat, ZoneView};
use crate::ast::{CellReference, FormulaExpr};
use crate::coerce;
use crate::deferred::DeferredState;
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{FunctionDef, FunctionRegistry};
use crate::getters::{AsyncSlot, CellKey, Getters};

/// Result of evaluating a formula
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaOutput {
    Value(CellResult),
    Matrix(Matrix<CellResult>),
}

impl FormulaOutput {
    /// The value, or the top-left element of a matrix
    pub fn into_top_left(self) -> CellResult {
        match self {
            FormulaOutput::Value(v) => v,
            FormulaOutput::Matrix(m) => m.get(0, 0).cloned().unwrap_or_default(),
        }
    }
}

/// State shared by the evaluation of one formula
pub struct EvaluationContext<'a> {
    getters: &'a dyn Getters,
    registry: &'a FunctionRegistry,
    cell: CellKey,
    async_calls: Cell<usize>,
}

impl<'a> EvaluationContext<'a> {
    /// Context for evaluating the formula of `cell`
    pub fn new(getters: &'a dyn Getters, registry: &'a FunctionRegistry, cell: CellKey) -> Self {
        Self {
            getters,
            registry,
            cell,
            async_calls: Cell::new(0),
        }
    }

    /// The cell whose formula is evaluated
    pub fn cell(&self) -> CellKey {
        self.cell
    }

    fn next_async_call(&self) -> usize {
        let call = self.async_calls.get();
        self.async_calls.set(call + 1);
        call
    }

    fn resolve_sheet(&self, sheet: Option<&String>) -> FormulaResult<usize> {
        match sheet {
            None => Ok(self.cell.sheet),
            Some(name) => self
                .getters
                .sheet_index(name)
                .ok_or_else(|| FormulaError::InvalidReference(format!("Invalid sheet name: {}", name))),
        }
    }
}

/// What a compute function sees of its call site
pub struct CallContext<'a> {
    getters: &'a dyn Getters,
    function: &'a str,
    cell: CellKey,
}

impl<'a> CallContext<'a> {
    pub fn new(getters: &'a dyn Getters, function: &'a str, cell: CellKey) -> Self {
        Self {
            getters,
            function,
            cell,
        }
    }

    pub fn getters(&self) -> &'a dyn Getters {
        self.getters
    }

    pub fn locale(&self) -> &'a Locale {
        self.getters.locale()
    }

    /// Name of the function being called
    pub fn function_name(&self) -> &str {
        self.function
    }

    /// The cell whose formula makes the call
    pub fn cell(&self) -> CellKey {
        self.cell
    }

    pub fn number(&self, arg: &Arg) -> FormulaResult<f64> {
        coerce::to_number(&arg.to_value()?, self.locale())
    }

    pub fn string(&self, arg: &Arg) -> FormulaResult<String> {
        coerce::to_string(&arg.to_value()?, self.locale())
    }

    pub fn boolean(&self, arg: &Arg) -> FormulaResult<bool> {
        coerce::to_boolean(&arg.to_value()?, self.locale())
    }

    pub fn integer(&self, arg: &Arg) -> FormulaResult<i64> {
        coerce::to_integer(&arg.to_value()?, self.locale())
    }

    pub fn date(&self, arg: &Arg) -> FormulaResult<chrono::NaiveDateTime> {
        coerce::to_date(&arg.to_value()?, self.locale())
    }

    /// Optional number: `default` when the argument is omitted
    pub fn number_or(&self, arg: Option<&Arg>, default: f64) -> FormulaResult<f64> {
        match arg {
            None | Some(Arg::Missing) => Ok(default),
            Some(arg) => self.number(arg),
        }
    }
}

/// Intermediate result of an expression
enum Evaluated<'a> {
    Scalar(CellResult),
    Zone(ZoneView<'a>),
    Matrix(Matrix<CellResult>),
    Missing,
}

impl<'a> Evaluated<'a> {
    fn error(error: FormulaError) -> Self {
        Evaluated::Scalar(error.into_cell_error().into())
    }

    fn into_range(self) -> Option<RangeArg<'a>> {
        match self {
            Evaluated::Zone(z) => Some(RangeArg::Zone(z)),
            Evaluated::Matrix(m) => Some(RangeArg::Matrix(m)),
            _ => None,
        }
    }

    /// Collapse to one value; only 1x1 ranges qualify
    fn into_scalar(self) -> FormulaResult<CellResult> {
        match self {
            Evaluated::Scalar(v) => Ok(v),
            Evaluated::Missing => Ok(CellResult::empty()),
            other => {
                let Some(range) = other.into_range() else {
                    return Ok(CellResult::empty());
                };
                if range.width() == 1 && range.height() == 1 {
                    range.get(0, 0)
                } else {
                    Err(FormulaError::evaluation(
                        "Array literals can only contain scalar values",
                    ))
                }
            }
        }
    }
}

/// Evaluate a compiled formula
///
/// Only control signals are returned as `Err`: every other failure is an
/// error value. Empty results read as 0.
pub fn evaluate_formula(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaOutput> {
    let evaluated = match eval_expr(expr, ctx) {
        Ok(v) => v,
        Err(e) if e.is_control() => return Err(e),
        Err(e) => Evaluated::error(e),
    };

    let output = match evaluated {
        Evaluated::Scalar(v) => FormulaOutput::Value(v),
        Evaluated::Missing => FormulaOutput::Value(CellResult::empty()),
        other => match other.into_range().map(|r| r.to_matrix()) {
            Some(Ok(m)) if m.is_single() => {
                FormulaOutput::Value(m.get(0, 0).cloned().unwrap_or_default())
            }
            Some(Ok(m)) => FormulaOutput::Matrix(m),
            Some(Err(e)) if e.is_control() => return Err(e),
            Some(Err(e)) => FormulaOutput::Value(e.into_cell_error().into()),
            None => FormulaOutput::Value(CellResult::empty()),
        },
    };

    Ok(match output {
        FormulaOutput::Value(v) => FormulaOutput::Value(empty_as_zero(v)),
        FormulaOutput::Matrix(m) => FormulaOutput::Matrix(m.into_map(empty_as_zero)),
    })
}

fn empty_as_zero(result: CellResult) -> CellResult {
    if result.value.is_empty() {
        CellResult {
            value: Value::Number(0.0),
            format: result.format,
        }
    } else {
        result
    }
}

fn eval_expr<'a>(expr: &FormulaExpr, ctx: &EvaluationContext<'a>) -> FormulaResult<Evaluated<'a>> {
    match expr {
        FormulaExpr::Number(n) => Ok(Evaluated::Scalar(CellResult::new(*n))),
        FormulaExpr::String(s) => Ok(Evaluated::Scalar(CellResult::new(s.as_str()))),
        FormulaExpr::Boolean(b) => Ok(Evaluated::Scalar(CellResult::new(*b))),
        FormulaExpr::Error(kind) => Ok(Evaluated::Scalar(CellError::new(*kind).into())),
        FormulaExpr::Missing => Ok(Evaluated::Missing),

        FormulaExpr::CellRef(reference) => {
            let sheet = ctx.resolve_sheet(reference.sheet.as_ref())?;
            Ok(Evaluated::Zone(ZoneView::new(
                ctx.getters,
                sheet,
                CellRange::single(reference.address),
            )))
        }
        FormulaExpr::RangeRef(reference) => {
            let sheet = ctx.resolve_sheet(reference.sheet.as_ref())?;
            Ok(Evaluated::Zone(ZoneView::new(ctx.getters, sheet, reference.range)))
        }
        FormulaExpr::SpreadRef(reference) => eval_spread(reference, ctx),
        FormulaExpr::NameRef(name) => Ok(Evaluated::Scalar(
            CellError::with_message(ErrorKind::UnknownFunction, format!("Invalid name: {}", name))
                .into(),
        )),

        FormulaExpr::Array(rows) => {
            let mut values = Vec::with_capacity(rows.len());
            for row in rows {
                let mut values_row = Vec::with_capacity(row.len());
                for item in row {
                    values_row.push(eval_expr(item, ctx)?.into_scalar()?);
                }
                values.push(values_row);
            }
            Ok(Evaluated::Matrix(Matrix::from_rows(values)?))
        }

        FormulaExpr::BinaryOp { op, left, right } => {
            call_function(op.function_name(), &[left.as_ref(), right.as_ref()], ctx)
        }
        FormulaExpr::UnaryOp { op, operand } => {
            call_function(op.function_name(), &[operand.as_ref()], ctx)
        }
        FormulaExpr::Function { name, args } => {
            let args: Vec<&FormulaExpr> = args.iter().collect();
            call_function(name, &args, ctx)
        }
    }
}

fn eval_spread<'a>(reference: &CellReference, ctx: &EvaluationContext<'a>) -> FormulaResult<Evaluated<'a>> {
    let sheet = ctx.resolve_sheet(reference.sheet.as_ref())?;
    let CellAddress { row, col } = reference.address;
    // Computes the origin so that its spill is known
    ctx.getters.evaluated_cell(sheet, row, col)?;
    let zone = ctx
        .getters
        .spread_zone(sheet, row, col)
        .unwrap_or_else(|| CellRange::single(reference.address));
    Ok(Evaluated::Zone(ZoneView::new(ctx.getters, sheet, zone)))
}

/// Argument once shaped for its declaration
enum Shaped<'a> {
    Arg(Arg<'a>),
    /// A range given to a scalar-only parameter
    Vectorized(RangeArg<'a>),
}

fn call_function<'a>(
    name: &str,
    exprs: &[&FormulaExpr],
    ctx: &EvaluationContext<'a>,
) -> FormulaResult<Evaluated<'a>> {
    let Some(def) = ctx.registry.get(name) else {
        return Ok(Evaluated::error(FormulaError::UnknownFunction(name.to_string())));
    };
    match call_declared(name, def, exprs, ctx) {
        Ok(v) => Ok(v),
        Err(e) if e.is_control() => Err(e),
        Err(e) => Ok(Evaluated::Scalar(e.into_cell_error_for(name).into())),
    }
}

fn call_declared<'a>(
    name: &str,
    def: &FunctionDef,
    exprs: &[&FormulaExpr],
    ctx: &EvaluationContext<'a>,
) -> FormulaResult<Evaluated<'a>> {
    check_arg_count(name, &def.args, exprs.len())?;

    let mut shaped = Vec::with_capacity(exprs.len().max(def.args.len()));
    for (i, expr) in exprs.iter().enumerate() {
        let param = def_for(&def.args, i).ok_or_else(|| FormulaError::ArgumentCount {
            function: name.to_string(),
            expected: format!("at most {}", def.args.len()),
            actual: exprs.len(),
        })?;
        let evaluated = match eval_expr(expr, ctx) {
            Ok(v) => v,
            Err(e) if e.is_control() => return Err(e),
            Err(e) => Evaluated::error(e),
        };
        shaped.push(shape_argument(name, param, evaluated)?);
    }

    // Omitted trailing parameters get their default
    for param in def.args.iter().skip(exprs.len()).filter(|p| !p.repeating) {
        shaped.push(Shaped::Arg(default_arg(param)));
    }

    let has_vectorized = shaped.iter().any(|s| matches!(s, Shaped::Vectorized(_)));
    if has_vectorized {
        return call_vectorized(name, def, shaped, ctx);
    }

    let args: Vec<Arg<'a>> = shaped
        .into_iter()
        .map(|s| match s {
            Shaped::Arg(arg) => arg,
            Shaped::Vectorized(range) => Arg::Range(range),
        })
        .collect();
    let call_ctx = CallContext::new(ctx.getters, name, ctx.cell);

    let output = if def.is_async {
        let call = ctx.next_async_call();
        match ctx.getters.async_slot(ctx.cell, call) {
            AsyncSlot::Resolved(value) => FunctionOutput::Value(value),
            AsyncSlot::Pending => return Err(FormulaError::Pending),
            AsyncSlot::Vacant => match (def.compute)(&args, &call_ctx)? {
                FunctionOutput::Deferred(mut deferred) => match deferred.poll() {
                    DeferredState::Settled(result) => FunctionOutput::Value(result?),
                    DeferredState::Pending => {
                        log::trace!("{} at {:?} returned a pending result", name, ctx.cell);
                        ctx.getters.register_deferred(ctx.cell, call, name, deferred);
                        return Err(FormulaError::Pending);
                    }
                },
                output => output,
            },
        }
    } else {
        (def.compute)(&args, &call_ctx)?
    };

    finish_output(name, def, &args, output)
}

fn default_arg<'a>(param: &crate::args::ArgDef) -> Arg<'a> {
    match &param.default {
        Some(value) => Arg::Value(CellResult::new(value.clone())),
        None => Arg::Missing,
    }
}

fn shape_argument<'a>(
    name: &str,
    param: &crate::args::ArgDef,
    evaluated: Evaluated<'a>,
) -> FormulaResult<Shaped<'a>> {
    match evaluated {
        Evaluated::Missing => Ok(Shaped::Arg(default_arg(param))),
        Evaluated::Scalar(value) => {
            if param.accepts_scalar() {
                return Ok(Shaped::Arg(Arg::Value(value)));
            }
            if let Value::Error(e) = value.value {
                return Err(FormulaError::Value(e));
            }
            Err(FormulaError::argument(format!(
                "Function {} expects the parameter '{}' to be reference to a cell or range.",
                name, param.name
            )))
        }
        other => {
            let Some(range) = other.into_range() else {
                return Ok(Shaped::Arg(Arg::Missing));
            };
            if param.accepts_range() {
                Ok(Shaped::Arg(Arg::Range(range)))
            } else if range.width() == 1 && range.height() == 1 {
                Ok(Shaped::Arg(Arg::Value(range.get(0, 0)?)))
            } else {
                Ok(Shaped::Vectorized(range))
            }
        }
    }
}

/// Map a call element-wise over the ranges given to scalar parameters
fn call_vectorized<'a>(
    name: &str,
    def: &FunctionDef,
    shaped: Vec<Shaped<'a>>,
    ctx: &EvaluationContext<'a>,
) -> FormulaResult<Evaluated<'a>> {
    let (width, height) = shaped
        .iter()
        .filter_map(|s| match s {
            Shaped::Vectorized(r) => Some((r.width(), r.height())),
            Shaped::Arg(_) => None,
        })
        .fold((0, 0), |(w, h), (rw, rh)| (w.max(rw), h.max(rh)));

    let call_ctx = CallContext::new(ctx.getters, name, ctx.cell);
    let mut columns = Vec::with_capacity(width);
    for col in 0..width {
        let mut column = Vec::with_capacity(height);
        for row in 0..height {
            column.push(call_element(name, def, &shaped, col, row, &call_ctx)?);
        }
        columns.push(column);
    }
    Ok(Evaluated::Matrix(Matrix::from_columns(columns)?))
}

fn call_element(
    name: &str,
    def: &FunctionDef,
    shaped: &[Shaped<'_>],
    col: usize,
    row: usize,
    call_ctx: &CallContext<'_>,
) -> FormulaResult<CellResult> {
    let mut args = Vec::with_capacity(shaped.len());
    for s in shaped {
        match s {
            Shaped::Arg(arg) => args.push(arg.clone()),
            Shaped::Vectorized(range) => {
                if col >= range.width() || row >= range.height() {
                    return Ok(CellError::with_message(
                        ErrorKind::NotAvailable,
                        format!("Array arguments to {} are of different size.", name),
                    )
                    .into());
                }
                args.push(Arg::Value(range.get(col, row)?));
            }
        }
    }

    let result = (def.compute)(&args, call_ctx).and_then(|output| match output {
        FunctionOutput::Value(v) => finish_output(name, def, &args, FunctionOutput::Value(v)),
        FunctionOutput::Matrix(_) | FunctionOutput::Deferred(_) => Err(FormulaError::evaluation(
            "Formula depends on invalid values",
        )),
    });
    match result {
        Ok(Evaluated::Scalar(v)) => Ok(v),
        Ok(_) => Err(FormulaError::evaluation("Formula depends on invalid values")),
        Err(e) if e.is_control() => Err(e),
        Err(e) => Ok(e.into_cell_error_for(name).into()),
    }
}

fn finish_output<'a>(
    name: &str,
    def: &FunctionDef,
    args: &[Arg<'_>],
    output: FunctionOutput,
) -> FormulaResult<Evaluated<'a>> {
    let format = || match &def.return_format {
        ReturnFormat::Unformatted => None,
        ReturnFormat::FirstArgument => args.iter().find_map(Arg::format),
        ReturnFormat::Fixed(format) => Some(format.clone()),
    };

    match output {
        FunctionOutput::Value(mut value) => {
            if value.format.is_none() && !value.is_error() {
                value.format = format();
            }
            Ok(Evaluated::Scalar(value))
        }
        FunctionOutput::Matrix(matrix) => {
            if !def.returns_matrix {
                return Err(FormulaError::evaluation("Formula depends on invalid values"));
            }
            let fallback = format();
            if fallback.is_none() {
                return Ok(Evaluated::Matrix(matrix));
            }
            Ok(Evaluated::Matrix(matrix.into_map(|mut v| {
                if v.format.is_none() && !v.is_error() {
                    v.format = fallback.clone();
                }
                v
            })))
        }
        FunctionOutput::Deferred(_) => Err(FormulaError::evaluation(format!(
            "Function {} returned a deferred result but is not asynchronous",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ArgDef, ArgType};
    use crate::deferred::Deferred;
    use crate::testing::{error_kind, eval, eval_output, eval_with};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arithmetic_and_precedence() {
        assert_eq!(eval("=1+2*3"), Value::Number(7.0));
        assert_eq!(eval("=(1+2)*3"), Value::Number(9.0));
        assert_eq!(eval("=2^3^2"), Value::Number(512.0));
        assert_eq!(eval("=-2^2"), Value::Number(4.0));
        assert_eq!(eval("=50%"), Value::Number(0.5));
        assert_eq!(eval("=\"a\"&1+1"), Value::text("a2"));
    }

    #[test]
    fn test_references_and_empty_cells() {
        let cells = [("A1", "10"), ("A2", "=A1*2"), ("B1", "x")];
        assert_eq!(eval_with(&cells, "=A2+A1"), Value::Number(30.0));
        assert_eq!(eval_with(&cells, "=C9"), Value::Number(0.0));
        assert_eq!(eval_with(&cells, "=B1"), Value::text("x"));
        assert_eq!(
            error_kind(&eval_with(&cells, "=Nope!A1")),
            Some(ErrorKind::InvalidReference)
        );
    }

    #[test]
    fn test_errors_are_values() {
        assert_eq!(error_kind(&eval("=1/0")), Some(ErrorKind::DivisionByZero));
        assert_eq!(error_kind(&eval("=NOPE(1)")), Some(ErrorKind::UnknownFunction));
        assert_eq!(error_kind(&eval("=foo")), Some(ErrorKind::UnknownFunction));
        assert_eq!(error_kind(&eval("=#N/A+1")), Some(ErrorKind::NotAvailable));
        assert_eq!(eval("=IFERROR(1/0,\"caught\")"), Value::text("caught"));
        assert_eq!(eval("=IFERROR(NOPE(),2)"), Value::Number(2.0));
    }

    #[test]
    fn test_argument_count_errors_name_the_function() {
        let result = eval("=ABS()");
        let error = result.as_error().unwrap();
        assert_eq!(error.kind(), ErrorKind::Generic);
        assert!(error.message().contains("ABS"));
    }

    #[test]
    fn test_placeholder_replaced_by_function_name() {
        let result = eval("=SQRT(\"abc\")");
        let message = result.as_error().unwrap().message().to_string();
        assert!(message.contains("SQRT"), "{}", message);
        assert!(!message.contains("[[FUNCTION_NAME]]"));
    }

    #[test]
    fn test_vectorization_column_major() {
        let FormulaOutput::Matrix(m) = eval_output(&[], "={1,2;3,4}*10") else {
            panic!("expected a matrix");
        };
        let values: Vec<f64> = m.iter().map(|(_, _, v)| v.value.as_number().unwrap()).collect();
        assert_eq!(values, vec![10.0, 30.0, 20.0, 40.0]);
    }

    #[test]
    fn test_vectorization_size_mismatch_gives_na() {
        let FormulaOutput::Matrix(m) = eval_output(&[], "={1,2,3}+{10;20}") else {
            panic!("expected a matrix");
        };
        assert_eq!((m.width(), m.height()), (3, 2));
        assert_eq!(m.get(0, 0).unwrap().value, Value::Number(11.0));
        assert_eq!(
            m.get(1, 1).unwrap().as_error().map(|e| e.kind()),
            Some(ErrorKind::NotAvailable)
        );
    }

    #[test]
    fn test_single_cell_reference_to_range_parameter() {
        let cells = [("A1", "5")];
        assert_eq!(eval_with(&cells, "=ROWS(A1)"), Value::Number(1.0));
        assert_eq!(eval_with(&cells, "=SUM(A1)"), Value::Number(5.0));
    }

    #[test]
    fn test_scalar_given_to_range_parameter_is_an_error() {
        let result = eval("=SUMIF(5,\">1\")");
        assert_eq!(error_kind(&result), Some(ErrorKind::Generic));
    }

    #[test]
    fn test_format_propagation() {
        let FormulaOutput::Value(v) = eval_output(&[], "=DATE(2024,1,15)") else {
            panic!("expected a value");
        };
        assert_eq!(v.value, Value::Number(45306.0));
        assert_eq!(v.format.as_deref(), Some("m/d/yyyy"));

        let FormulaOutput::Value(v) = eval_output(&[], "=DATE(2024,1,15)+1") else {
            panic!("expected a value");
        };
        assert_eq!(v.format.as_deref(), Some("m/d/yyyy"));
    }

    #[test]
    fn test_ragged_array_literal() {
        let result = eval("={1,2;3}");
        let error = result.as_error().unwrap();
        assert_eq!(error.message(), "Formula depends on invalid values");
    }

    #[test]
    fn test_scalar_function_returning_matrix_is_invalid() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                "BROKEN",
                FunctionDef::new("", vec![], |_, _| {
                    Ok(Matrix::filled(2, 2, CellResult::new(1.0)).into())
                }),
            )
            .unwrap();
        let workbook = gridcalc_core::Workbook::new();
        let getters = crate::getters::GridGetters::new(&workbook, &registry);
        let output = getters
            .evaluate_text("=BROKEN()", CellKey::new(0, 10, 10))
            .unwrap();
        let FormulaOutput::Value(v) = output else {
            panic!("expected a value");
        };
        assert_eq!(v.as_error().unwrap().message(), "Formula depends on invalid values");
    }

    #[test]
    fn test_settled_deferred_is_used_immediately() {
        let mut registry = FunctionRegistry::new();
        registry
            .register(
                "FETCH",
                FunctionDef::new(
                    "",
                    vec![ArgDef::new("value", &[ArgType::Number])],
                    |args, ctx| Ok(Deferred::ready(ctx.number(&args[0])? * 2.0).into()),
                )
                .asynchronous(),
            )
            .unwrap();
        let workbook = gridcalc_core::Workbook::new();
        let getters = crate::getters::GridGetters::new(&workbook, &registry);
        let output = getters.evaluate_text("=FETCH(21)", CellKey::new(0, 0, 0));
        assert_eq!(output, Ok(FormulaOutput::Value(CellResult::new(42.0))));
    }
}
