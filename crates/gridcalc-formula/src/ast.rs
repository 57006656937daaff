//! Formula Abstract Syntax Tree types

use gridcalc_core::{CellAddress, CellRange, ErrorKind};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(ErrorKind),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Spill zone of a cell (`A1#`)
    SpreadRef(CellReference),
    /// Unresolved identifier
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },
    /// Omitted function argument (`IF(A1,,2)`)
    Missing,

    // === Array ===
    /// Array literal, rows as written in the formula
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Visit every function name in the expression
    pub fn function_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_function_names(&mut names);
        names
    }

    fn collect_function_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            FormulaExpr::Function { name, args } => {
                names.push(name);
                for arg in args {
                    arg.collect_function_names(names);
                }
            }
            FormulaExpr::BinaryOp { op, left, right } => {
                names.push(op.function_name());
                left.collect_function_names(names);
                right.collect_function_names(names);
            }
            FormulaExpr::UnaryOp { op, operand } => {
                names.push(op.function_name());
                operand.collect_function_names(names);
            }
            FormulaExpr::Array(rows) => {
                for expr in rows.iter().flatten() {
                    expr.collect_function_names(names);
                }
            }
            _ => {}
        }
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    /// Name of the registered function implementing the operator
    pub fn function_name(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "ADD",
            BinaryOperator::Subtract => "MINUS",
            BinaryOperator::Multiply => "MULTIPLY",
            BinaryOperator::Divide => "DIVIDE",
            BinaryOperator::Power => "POW",
            BinaryOperator::Equal => "EQ",
            BinaryOperator::NotEqual => "NE",
            BinaryOperator::LessThan => "LT",
            BinaryOperator::LessEqual => "LTE",
            BinaryOperator::GreaterThan => "GT",
            BinaryOperator::GreaterEqual => "GTE",
            BinaryOperator::Concat => "CONCATENATE",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Percent,
}

impl UnaryOperator {
    /// Name of the registered function implementing the operator
    pub fn function_name(&self) -> &'static str {
        match self {
            UnaryOperator::Negate => "UMINUS",
            UnaryOperator::Plus => "UPLUS",
            UnaryOperator::Percent => "UNARY.PERCENT",
        }
    }
}
