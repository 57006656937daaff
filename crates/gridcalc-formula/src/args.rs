//! Argument declarations and runtime arguments
//!
//! Functions declare their parameters with [`ArgDef`]; at call time they
//! receive one [`Arg`] per supplied argument. Ranges reach them as a
//! [`RangeArg`], either materialized or as a lazy [`ZoneView`] over the
//! grid.

use std::fmt;

use gridcalc_core::{CellError, CellRange, CellResult, Matrix, Value};
use lazy_regex::regex_is_match;

use crate::deferred::Deferred;
use crate::error::{FormulaError, FormulaResult, RegistrationError};
use crate::getters::Getters;

/// Accepted argument type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Any,
    Number,
    String,
    Boolean,
    Date,
    /// A reference whose position matters (e.g. `ROW`)
    Range,
    RangeNumber,
    RangeString,
    RangeBoolean,
    RangeAny,
}

impl ArgType {
    /// Whether this type accepts ranges
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            ArgType::Range
                | ArgType::RangeNumber
                | ArgType::RangeString
                | ArgType::RangeBoolean
                | ArgType::RangeAny
        )
    }
}

/// Declaration of one function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDef {
    pub name: String,
    pub types: Vec<ArgType>,
    pub optional: bool,
    /// Repeating parameters form the group of arguments that may be
    /// supplied any number of times at the end of the call
    pub repeating: bool,
    pub default: Option<Value>,
}

impl ArgDef {
    /// A required parameter
    pub fn new(name: &str, types: &[ArgType]) -> Self {
        Self {
            name: name.to_string(),
            types: types.to_vec(),
            optional: false,
            repeating: false,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Repeating parameters are always optional
    pub fn repeating(mut self) -> Self {
        self.optional = true;
        self.repeating = true;
        self
    }

    /// Value used when the argument is omitted
    pub fn default_value<V: Into<Value>>(mut self, value: V) -> Self {
        self.optional = true;
        self.default = Some(value.into());
        self
    }

    /// Whether a range can be passed as is
    pub fn accepts_range(&self) -> bool {
        self.types.iter().any(ArgType::is_range)
    }

    /// Whether a scalar can be passed
    pub fn accepts_scalar(&self) -> bool {
        self.types.iter().any(|t| !t.is_range())
    }
}

/// Check a parameter list at registration time
pub(crate) fn validate_arg_defs(function: &str, defs: &[ArgDef]) -> Result<(), RegistrationError> {
    let invalid = |reason: String| RegistrationError::InvalidArgument {
        function: function.to_string(),
        reason,
    };

    let mut seen_optional = false;
    let mut repeating_group: Option<(usize, usize)> = None;
    for (i, def) in defs.iter().enumerate() {
        if !regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*$", &def.name) {
            return Err(invalid(format!("invalid parameter name '{}'", def.name)));
        }
        if defs[..i]
            .iter()
            .any(|other| other.name.eq_ignore_ascii_case(&def.name))
        {
            return Err(invalid(format!("duplicate parameter name '{}'", def.name)));
        }
        if def.types.is_empty() {
            return Err(invalid(format!("parameter '{}' accepts no type", def.name)));
        }

        if def.repeating {
            repeating_group = match repeating_group {
                None => Some((i, i)),
                Some((start, end)) if end + 1 == i => Some((start, i)),
                Some(_) => {
                    return Err(invalid(
                        "repeating parameters must form a single contiguous group".into(),
                    ))
                }
            };
        } else if repeating_group.is_some() {
            return Err(invalid("the repeating group must come last".into()));
        }

        if def.optional {
            seen_optional = true;
        } else if seen_optional {
            return Err(invalid(format!(
                "required parameter '{}' follows an optional parameter",
                def.name
            )));
        }
    }
    Ok(())
}

/// Number of non-repeating parameters and size of the repeating group
fn layout(defs: &[ArgDef]) -> (usize, usize) {
    let group = defs.iter().filter(|d| d.repeating).count();
    (defs.len() - group, group)
}

/// Check the number of supplied arguments against the declaration
pub(crate) fn check_arg_count(function: &str, defs: &[ArgDef], supplied: usize) -> FormulaResult<()> {
    let required = defs.iter().filter(|d| !d.optional).count();
    let (fixed, group) = layout(defs);

    if supplied < required {
        return Err(FormulaError::ArgumentCount {
            function: function.to_string(),
            expected: format!("at least {}", required),
            actual: supplied,
        });
    }
    if group == 0 && supplied > fixed {
        return Err(FormulaError::ArgumentCount {
            function: function.to_string(),
            expected: format!("at most {}", fixed),
            actual: supplied,
        });
    }
    if group > 1 && supplied > fixed && (supplied - fixed) % group != 0 {
        return Err(FormulaError::argument(format!(
            "Invalid number of arguments for the {} function. Expected all arguments after position {} to be supplied by groups of {} arguments",
            function, fixed, group
        )));
    }
    Ok(())
}

/// Declaration governing the `index`-th supplied argument
pub(crate) fn def_for(defs: &[ArgDef], index: usize) -> Option<&ArgDef> {
    let (fixed, group) = layout(defs);
    if index < fixed {
        defs.get(index)
    } else if group > 0 {
        defs.get(fixed + (index - fixed) % group)
    } else {
        None
    }
}

/// Traversal order of range elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Column then row within the column
    #[default]
    ColumnMajor,
    /// Row then column within the row
    RowMajor,
}

/// Lazy view of a zone of the grid
///
/// Dimensions come from the zone; cells are only evaluated when read.
#[derive(Clone, Copy)]
pub struct ZoneView<'a> {
    getters: &'a dyn Getters,
    sheet: usize,
    zone: CellRange,
}

impl<'a> ZoneView<'a> {
    pub fn new(getters: &'a dyn Getters, sheet: usize, zone: CellRange) -> Self {
        Self {
            getters,
            sheet,
            zone,
        }
    }

    pub fn sheet(&self) -> usize {
        self.sheet
    }

    pub fn zone(&self) -> CellRange {
        self.zone
    }

    pub fn width(&self) -> usize {
        self.zone.width()
    }

    pub fn height(&self) -> usize {
        self.zone.height()
    }

    /// Evaluated cell at `(col, row)` relative to the zone origin
    pub fn get(&self, col: usize, row: usize) -> FormulaResult<CellResult> {
        let addr = self.zone.address_at(col, row).ok_or_else(|| {
            FormulaError::InvalidReference(format!(
                "Position ({}, {}) is outside of {}",
                col, row, self.zone
            ))
        })?;
        self.getters.evaluated_cell(self.sheet, addr.row, addr.col)
    }
}

impl fmt::Debug for ZoneView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneView")
            .field("sheet", &self.sheet)
            .field("zone", &self.zone)
            .finish()
    }
}

/// A range argument
#[derive(Debug, Clone)]
pub enum RangeArg<'a> {
    /// Values computed by an expression or an array literal
    Matrix(Matrix<CellResult>),
    /// A zone of the grid
    Zone(ZoneView<'a>),
}

impl<'a> RangeArg<'a> {
    pub fn width(&self) -> usize {
        match self {
            RangeArg::Matrix(m) => m.width(),
            RangeArg::Zone(z) => z.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            RangeArg::Matrix(m) => m.height(),
            RangeArg::Zone(z) => z.height(),
        }
    }

    /// Element at `(col, row)`
    pub fn get(&self, col: usize, row: usize) -> FormulaResult<CellResult> {
        match self {
            RangeArg::Matrix(m) => m.get(col, row).cloned().ok_or_else(|| {
                FormulaError::InvalidReference(format!(
                    "Position ({}, {}) is outside of the range",
                    col, row
                ))
            }),
            RangeArg::Zone(z) => z.get(col, row),
        }
    }

    /// Sheet and zone, for ranges that are grid references
    pub fn zone(&self) -> Option<(usize, CellRange)> {
        match self {
            RangeArg::Zone(z) => Some((z.sheet(), z.zone())),
            RangeArg::Matrix(_) => None,
        }
    }

    /// Visit every element in the given order
    pub fn visit<F>(&self, order: Order, mut f: F) -> FormulaResult<()>
    where
        F: FnMut(usize, usize, &CellResult) -> FormulaResult<()>,
    {
        let (width, height) = (self.width(), self.height());
        match (self, order) {
            (RangeArg::Matrix(m), Order::ColumnMajor) => {
                for (col, row, value) in m.iter() {
                    f(col, row, value)?;
                }
            }
            (RangeArg::Matrix(m), Order::RowMajor) => {
                for (col, row, value) in m.iter_row_major() {
                    f(col, row, value)?;
                }
            }
            (RangeArg::Zone(z), Order::ColumnMajor) => {
                for col in 0..width {
                    for row in 0..height {
                        f(col, row, &z.get(col, row)?)?;
                    }
                }
            }
            (RangeArg::Zone(z), Order::RowMajor) => {
                for row in 0..height {
                    for col in 0..width {
                        f(col, row, &z.get(col, row)?)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Materialize every element
    pub fn to_matrix(&self) -> FormulaResult<Matrix<CellResult>> {
        match self {
            RangeArg::Matrix(m) => Ok(m.clone()),
            RangeArg::Zone(z) => {
                let mut columns = Vec::with_capacity(z.width());
                for col in 0..z.width() {
                    let mut column = Vec::with_capacity(z.height());
                    for row in 0..z.height() {
                        column.push(z.get(col, row)?);
                    }
                    columns.push(column);
                }
                Ok(Matrix::from_columns(columns)?)
            }
        }
    }

    /// Materialize the values only
    pub fn to_values(&self) -> FormulaResult<Matrix<Value>> {
        Ok(self.to_matrix()?.into_map(|r| r.value))
    }

    /// Elements of a single row or column, in order
    pub fn to_vector(&self) -> FormulaResult<Vec<CellResult>> {
        let mut values = Vec::with_capacity(self.width() * self.height());
        self.visit(Order::RowMajor, |_, _, v| {
            values.push(v.clone());
            Ok(())
        })?;
        Ok(values)
    }
}

/// One supplied argument
#[derive(Debug, Clone)]
pub enum Arg<'a> {
    /// A single value
    Value(CellResult),
    /// A range
    Range(RangeArg<'a>),
    /// Omitted optional argument without a default
    Missing,
}

impl<'a> Arg<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Arg::Missing)
    }

    pub fn as_range(&self) -> Option<&RangeArg<'a>> {
        match self {
            Arg::Range(r) => Some(r),
            _ => None,
        }
    }

    /// The argument as a range; scalars are an error
    pub fn expect_range(&self) -> FormulaResult<&RangeArg<'a>> {
        self.as_range().ok_or_else(|| {
            FormulaError::argument("Function [[FUNCTION_NAME]] expects a range argument.")
        })
    }

    /// Width and height; scalars are 1x1
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            Arg::Range(r) => (r.width(), r.height()),
            _ => (1, 1),
        }
    }

    /// The single value of the argument
    ///
    /// A 1x1 range yields its element; larger ranges are an error.
    pub fn to_result(&self) -> FormulaResult<CellResult> {
        match self {
            Arg::Value(v) => Ok(v.clone()),
            Arg::Missing => Ok(CellResult::empty()),
            Arg::Range(r) if r.width() == 1 && r.height() == 1 => r.get(0, 0),
            Arg::Range(_) => Err(FormulaError::argument(
                "The function [[FUNCTION_NAME]] expects a single value, but received a range.",
            )),
        }
    }

    /// The single value of the argument, without its format
    pub fn to_value(&self) -> FormulaResult<Value> {
        Ok(self.to_result()?.value)
    }

    /// Format of the argument; the top-left cell's for ranges
    pub fn format(&self) -> Option<String> {
        match self {
            Arg::Value(v) => v.format.clone(),
            Arg::Range(r) if r.width() > 0 && r.height() > 0 => {
                r.get(0, 0).ok().and_then(|v| v.format)
            }
            _ => None,
        }
    }

    /// Visit every value of the argument: once for scalars, every element
    /// for ranges; omitted arguments are skipped
    pub fn visit<F>(&self, order: Order, mut f: F) -> FormulaResult<()>
    where
        F: FnMut(&CellResult) -> FormulaResult<()>,
    {
        match self {
            Arg::Value(v) => f(v),
            Arg::Range(r) => r.visit(order, |_, _, v| f(v)),
            Arg::Missing => Ok(()),
        }
    }

    /// Materialize the argument as a matrix; scalars are 1x1
    pub fn to_matrix(&self) -> FormulaResult<Matrix<CellResult>> {
        match self {
            Arg::Range(r) => r.to_matrix(),
            Arg::Value(v) => Ok(Matrix::scalar(v.clone())),
            Arg::Missing => Ok(Matrix::scalar(CellResult::empty())),
        }
    }
}

/// How a function's result format is chosen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReturnFormat {
    #[default]
    Unformatted,
    /// Format of the first argument that has one
    FirstArgument,
    /// A fixed format
    Fixed(String),
}

/// What a compute function produces
#[derive(Debug)]
pub enum FunctionOutput {
    Value(CellResult),
    Matrix(Matrix<CellResult>),
    /// Result of an asynchronous function, available later
    Deferred(Deferred),
}

impl FunctionOutput {
    /// Number result with a format
    pub fn formatted<V: Into<Value>, S: Into<String>>(value: V, format: S) -> Self {
        FunctionOutput::Value(CellResult::with_format(value, format))
    }
}

impl From<CellResult> for FunctionOutput {
    fn from(v: CellResult) -> Self {
        FunctionOutput::Value(v)
    }
}

impl From<Value> for FunctionOutput {
    fn from(v: Value) -> Self {
        FunctionOutput::Value(v.into())
    }
}

impl From<f64> for FunctionOutput {
    fn from(n: f64) -> Self {
        FunctionOutput::Value(n.into())
    }
}

impl From<bool> for FunctionOutput {
    fn from(b: bool) -> Self {
        FunctionOutput::Value(b.into())
    }
}

impl From<String> for FunctionOutput {
    fn from(s: String) -> Self {
        FunctionOutput::Value(s.into())
    }
}

impl From<&str> for FunctionOutput {
    fn from(s: &str) -> Self {
        FunctionOutput::Value(s.into())
    }
}

impl From<CellError> for FunctionOutput {
    fn from(e: CellError) -> Self {
        FunctionOutput::Value(e.into())
    }
}

impl From<Matrix<CellResult>> for FunctionOutput {
    fn from(m: Matrix<CellResult>) -> Self {
        FunctionOutput::Matrix(m)
    }
}

impl From<Matrix<Value>> for FunctionOutput {
    fn from(m: Matrix<Value>) -> Self {
        FunctionOutput::Matrix(m.into_map(CellResult::from))
    }
}

impl From<Deferred> for FunctionOutput {
    fn from(d: Deferred) -> Self {
        FunctionOutput::Deferred(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ArgType::*;

    #[test]
    fn test_valid_declarations() {
        let defs = vec![
            ArgDef::new("sum_range", &[RangeNumber]),
            ArgDef::new("criteria_range", &[RangeAny]),
            ArgDef::new("criterion", &[String]),
            ArgDef::new("criteria_range2", &[RangeAny]).repeating(),
            ArgDef::new("criterion2", &[String]).repeating(),
        ];
        assert!(validate_arg_defs("SUMIFS", &defs).is_ok());
        assert!(check_arg_count("SUMIFS", &defs, 3).is_ok());
        assert!(check_arg_count("SUMIFS", &defs, 5).is_ok());
        assert!(check_arg_count("SUMIFS", &defs, 4).is_err());
        assert!(check_arg_count("SUMIFS", &defs, 2).is_err());
        assert_eq!(def_for(&defs, 5).unwrap().name, "criteria_range2");
        assert_eq!(def_for(&defs, 6).unwrap().name, "criterion2");
    }

    #[test]
    fn test_invalid_declarations() {
        let bad_name = vec![ArgDef::new("1st", &[Number])];
        assert!(validate_arg_defs("F", &bad_name).is_err());

        let duplicate = vec![ArgDef::new("a", &[Number]), ArgDef::new("A", &[Number])];
        assert!(validate_arg_defs("F", &duplicate).is_err());

        let required_after_optional = vec![
            ArgDef::new("a", &[Number]).optional(),
            ArgDef::new("b", &[Number]),
        ];
        assert!(validate_arg_defs("F", &required_after_optional).is_err());

        let split_group = vec![
            ArgDef::new("a", &[Number]).repeating(),
            ArgDef::new("b", &[Number]).optional(),
            ArgDef::new("c", &[Number]).repeating(),
        ];
        assert!(validate_arg_defs("F", &split_group).is_err());

        let group_not_last = vec![
            ArgDef::new("a", &[Number]).repeating(),
            ArgDef::new("b", &[Number]).optional(),
        ];
        assert!(validate_arg_defs("F", &group_not_last).is_err());
    }

    #[test]
    fn test_arg_count_without_repeating() {
        let defs = vec![
            ArgDef::new("number", &[Number]),
            ArgDef::new("digits", &[Number]).default_value(0.0),
        ];
        assert!(check_arg_count("ROUND", &defs, 0).is_err());
        assert!(check_arg_count("ROUND", &defs, 1).is_ok());
        assert!(check_arg_count("ROUND", &defs, 2).is_ok());
        let err = check_arg_count("ROUND", &defs, 3).unwrap_err();
        assert!(err.to_string().contains("ROUND"));
        assert!(def_for(&defs, 2).is_none());
    }

    #[test]
    fn test_matrix_range_visit_orders() {
        let m = Matrix::from_rows(vec![
            vec![CellResult::new(1.0), CellResult::new(2.0)],
            vec![CellResult::new(3.0), CellResult::new(4.0)],
        ])
        .unwrap();
        let range = RangeArg::Matrix(m);
        let mut seen = Vec::new();
        range
            .visit(Order::ColumnMajor, |_, _, v| {
                seen.push(v.value.as_number().unwrap());
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![1.0, 3.0, 2.0, 4.0]);
        assert_eq!(
            range
                .to_vector()
                .unwrap()
                .iter()
                .map(|v| v.value.as_number().unwrap())
                .collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_single_value_of_arguments() {
        assert_eq!(Arg::Missing.to_value().unwrap(), Value::Empty);
        let single = Arg::Range(RangeArg::Matrix(Matrix::scalar(CellResult::new(5.0))));
        assert_eq!(single.to_value().unwrap(), Value::Number(5.0));
        let wide = Arg::Range(RangeArg::Matrix(Matrix::filled(2, 1, CellResult::new(5.0))));
        assert!(wide.to_value().is_err());
    }
}
