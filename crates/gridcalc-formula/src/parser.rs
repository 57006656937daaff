//! Formula parser
//!
//! A recursive descent parser for spreadsheet formulas with the usual
//! operator precedence. Array literals keep the row-major layout of the
//! source text; the evaluator turns them into column-major matrices.

use crate::ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use gridcalc_core::{CellAddress, CellRange, ErrorKind};

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use gridcalc_formula::parse_formula;
///
/// let ast = parse_formula("=1+2").unwrap();
/// let ast = parse_formula("=SUM(A1:A10)").unwrap();
/// let ast = parse_formula("=IF(A1>0,\"Yes\",\"No\")").unwrap();
/// let ast = parse_formula("='Q1 data'!B2:B9").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    let body = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Parse("Formula must start with '='".into()))?;

    let mut parser = FormulaParser::new(body);
    let expr = parser.parse_expression()?;

    match parser.current_token() {
        Token::Eof => Ok(expr),
        token => Err(FormulaError::Parse(format!(
            "Unexpected token after expression: {:?}",
            token
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),
    Error(ErrorKind),

    // Identifiers and references
    Identifier(String),
    CellRef(String),
    SpreadRef(String),
    SheetRef(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Semicolon,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    /// Text that cannot start any token
    Invalid(String),
    Eof,
}

struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
        };
        parser.current_token = parser.scan_token();
        parser
    }

    // === Token scanning ===

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        match c {
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        Token::LessEqual
                    }
                    Some('>') => {
                        self.advance();
                        Token::NotEqual
                    }
                    _ => Token::LessThan,
                }
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Token::GreaterEqual;
                }
                Token::GreaterThan
            }
            '"' => self.scan_string(),
            '\'' => self.scan_quoted_sheet(),
            '#' => self.scan_error(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).map_or(false, |d| d.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier_or_ref(),
            other => {
                self.advance();
                Token::Invalid(other.to_string())
            }
        }
    }

    /// Scan a quoted run, `''`/`""` standing for one quote character
    fn scan_quoted(&mut self, quote: char) -> Option<String> {
        self.advance();
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            self.advance();
            if c == quote {
                if self.peek_char() == Some(quote) {
                    s.push(quote);
                    self.advance();
                } else {
                    return Some(s);
                }
            } else {
                s.push(c);
            }
        }
        None
    }

    fn scan_string(&mut self) -> Token {
        match self.scan_quoted('"') {
            Some(s) => Token::String(s),
            None => Token::Invalid("unterminated string".into()),
        }
    }

    fn scan_quoted_sheet(&mut self) -> Token {
        match self.scan_quoted('\'') {
            Some(name) if self.peek_char() == Some('!') => {
                self.advance();
                Token::SheetRef(name)
            }
            Some(name) => Token::Invalid(format!("'{}'", name)),
            None => Token::Invalid("unterminated sheet name".into()),
        }
    }

    fn scan_error(&mut self) -> Token {
        let start = self.pos;
        self.advance();
        while self.peek_char().map_or(false, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '!' | '/' | '?' | '_')
        }) {
            self.advance();
        }
        let text = &self.input[start..self.pos];
        match ErrorKind::from_str(text) {
            Some(kind) => Token::Error(kind),
            None => Token::Invalid(text.to_string()),
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;
        self.skip_digits();

        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        if matches!(self.peek_char(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.advance();
            }
            self.skip_digits();
        }

        let text = &self.input[start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Invalid(text.to_string()),
        }
    }

    fn scan_identifier_or_ref(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return Token::SheetRef(text.to_string());
        }

        let is_call = self.peek_char_after_whitespace() == Some('(');
        if !is_call {
            match text.to_uppercase().as_str() {
                "TRUE" => return Token::Boolean(true),
                "FALSE" => return Token::Boolean(false),
                _ => {}
            }
            // LOG10(100) is a call, LOG10 alone a reference
            if is_cell_reference(text) {
                if self.peek_char() == Some('#') {
                    self.advance();
                    return Token::SpreadRef(text.to_string());
                }
                return Token::CellRef(text.to_string());
            }
        }

        Token::Identifier(text.to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn peek_char_after_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> Token {
        let next = self.scan_token();
        std::mem::replace(&mut self.current_token, next)
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: =, <>, <, <=, >, >=
    // 2. Concatenation: &
    // 3. Addition/Subtraction: +, -
    // 4. Multiplication/Division: *, /
    // 5. Exponentiation: ^ (right associative)
    // 6. Unary: prefix -, +, postfix %
    // 7. Range: :
    // 8. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> FormulaExpr {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.consume();
            let right = self.parse_concatenation()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume();
            let right = self.parse_additive()?;
            left = Self::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.consume();
            let right = self.parse_multiplicative()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };
            self.consume();
            let right = self.parse_exponent()?;
            left = Self::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume();
            let right = self.parse_exponent()?;
            return Ok(Self::binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        let prefix = match self.current_token() {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Plus => Some(UnaryOperator::Plus),
            _ => None,
        };
        if let Some(op) = prefix {
            self.consume();
            let operand = self.parse_unary()?;
            return Ok(FormulaExpr::UnaryOp {
                op,
                operand: Box::new(operand),
            });
        }

        let mut expr = self.parse_range()?;

        while matches!(self.current_token(), Token::Percent) {
            self.consume();
            expr = FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand: Box::new(expr),
            };
        }

        Ok(expr)
    }

    fn parse_range(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_primary()?;

        if !matches!(self.current_token(), Token::Colon) {
            return Ok(left);
        }
        self.consume();
        let right = self.parse_primary()?;

        match (left, right) {
            (FormulaExpr::CellRef(start), FormulaExpr::CellRef(end)) => {
                let same_sheet = match (&start.sheet, &end.sheet) {
                    (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                    (_, None) => true,
                    (None, Some(_)) => false,
                };
                if !same_sheet {
                    return Err(FormulaError::Parse(
                        "Range references must be on the same sheet".into(),
                    ));
                }
                Ok(FormulaExpr::RangeRef(RangeReference {
                    sheet: start.sheet,
                    range: CellRange::new(start.address, end.address),
                }))
            }
            _ => Err(FormulaError::Parse(
                "The range operator needs cell references on both sides".into(),
            )),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.consume() {
            Token::Number(n) => Ok(FormulaExpr::Number(n)),
            Token::String(s) => Ok(FormulaExpr::String(s)),
            Token::Boolean(b) => Ok(FormulaExpr::Boolean(b)),
            Token::Error(kind) => Ok(FormulaExpr::Error(kind)),

            Token::LeftParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBrace => self.parse_array(),

            Token::SheetRef(sheet) => match self.consume() {
                Token::CellRef(text) => parse_cell_reference(Some(sheet), &text)
                    .map(FormulaExpr::CellRef),
                Token::SpreadRef(text) => parse_cell_reference(Some(sheet), &text)
                    .map(FormulaExpr::SpreadRef),
                other => Err(FormulaError::Parse(format!(
                    "Expected cell reference after sheet name, got {:?}",
                    other
                ))),
            },

            Token::CellRef(text) => parse_cell_reference(None, &text).map(FormulaExpr::CellRef),
            Token::SpreadRef(text) => {
                parse_cell_reference(None, &text).map(FormulaExpr::SpreadRef)
            }

            Token::Identifier(name) => {
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    Ok(FormulaExpr::NameRef(name))
                }
            }

            Token::Invalid(text) => Err(FormulaError::Parse(format!("Invalid token: {}", text))),
            other => Err(FormulaError::Parse(format!("Unexpected token: {:?}", other))),
        }
    }

    fn parse_array(&mut self) -> FormulaResult<FormulaExpr> {
        let mut rows = Vec::new();
        let mut current_row = Vec::new();

        if !matches!(self.current_token(), Token::RightBrace) {
            current_row.push(self.parse_expression()?);

            loop {
                match self.current_token() {
                    Token::Comma => {
                        self.consume();
                        current_row.push(self.parse_expression()?);
                    }
                    Token::Semicolon => {
                        self.consume();
                        rows.push(std::mem::take(&mut current_row));
                        current_row.push(self.parse_expression()?);
                    }
                    Token::RightBrace => break,
                    _ => {
                        return Err(FormulaError::Parse(
                            "Expected ',' ';' or '}' in array".into(),
                        ))
                    }
                }
            }
        }

        if !current_row.is_empty() {
            rows.push(current_row);
        }

        self.expect(&Token::RightBrace)?;
        Ok(FormulaExpr::Array(rows))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<FormulaExpr> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        if !matches!(self.current_token(), Token::RightParen) {
            loop {
                if matches!(self.current_token(), Token::Comma | Token::RightParen) {
                    args.push(FormulaExpr::Missing);
                } else {
                    args.push(self.parse_expression()?);
                }
                if !matches!(self.current_token(), Token::Comma) {
                    break;
                }
                self.consume();
            }
        }

        self.expect(&Token::RightParen)?;

        Ok(FormulaExpr::Function {
            name: name.to_uppercase(),
            args,
        })
    }
}

/// `[$]letters[$]digits`
fn is_cell_reference(text: &str) -> bool {
    let rest = text.strip_prefix('$').unwrap_or(text);
    let letters = rest.chars().take_while(char::is_ascii_alphabetic).count();
    if letters == 0 {
        return false;
    }
    let rest = &rest[letters..];
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

fn parse_cell_reference(sheet: Option<String>, text: &str) -> FormulaResult<CellReference> {
    let address = CellAddress::parse(text)
        .map_err(|e| FormulaError::Parse(format!("Invalid cell reference '{}': {}", text, e)))?;
    Ok(CellReference { sheet, address })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(n: f64) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::Number(n))
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_formula("=42").unwrap(), FormulaExpr::Number(42.0));
        assert_eq!(parse_formula("=.5").unwrap(), FormulaExpr::Number(0.5));
        assert_eq!(parse_formula("=1e10").unwrap(), FormulaExpr::Number(1e10));
        assert_eq!(
            parse_formula("=\"Hello \"\"World\"\"\"").unwrap(),
            FormulaExpr::String("Hello \"World\"".into())
        );
        assert_eq!(parse_formula("=true").unwrap(), FormulaExpr::Boolean(true));
        assert_eq!(
            parse_formula("=#N/A").unwrap(),
            FormulaExpr::Error(ErrorKind::NotAvailable)
        );
        assert_eq!(
            parse_formula("=#DIV/0!").unwrap(),
            FormulaExpr::Error(ErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_formula("=1+2*3").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Add,
                left: num(1.0),
                right: Box::new(FormulaExpr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    left: num(2.0),
                    right: num(3.0),
                }),
            }
        );

        // 2^3^2 = 2^(3^2)
        assert_eq!(
            parse_formula("=2^3^2").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Power,
                left: num(2.0),
                right: Box::new(FormulaExpr::BinaryOp {
                    op: BinaryOperator::Power,
                    left: num(3.0),
                    right: num(2.0),
                }),
            }
        );

        assert!(matches!(
            parse_formula("=\"a\"&1+2").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::Concat,
                ..
            }
        ));
        assert!(matches!(
            parse_formula("=A1<>B1").unwrap(),
            FormulaExpr::BinaryOp {
                op: BinaryOperator::NotEqual,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_unary() {
        assert_eq!(
            parse_formula("=-5%").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Percent,
                    operand: num(5.0),
                }),
            }
        );
        assert!(matches!(
            parse_formula("=+A1").unwrap(),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Plus,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(
            parse_formula("=$B$2").unwrap(),
            FormulaExpr::CellRef(CellReference {
                sheet: None,
                address: CellAddress::new(1, 1),
            })
        );

        let FormulaExpr::RangeRef(range_ref) = parse_formula("=A1:B10").unwrap() else {
            panic!("Expected RangeRef");
        };
        assert_eq!(range_ref.range.to_string(), "A1:B10");

        let FormulaExpr::RangeRef(range_ref) = parse_formula("=Data!B3:A1").unwrap() else {
            panic!("Expected RangeRef");
        };
        assert_eq!(range_ref.sheet.as_deref(), Some("Data"));
        assert_eq!(range_ref.range.to_string(), "A1:B3");

        let FormulaExpr::CellRef(cell_ref) = parse_formula("='Q1 ''24'!C3").unwrap() else {
            panic!("Expected CellRef");
        };
        assert_eq!(cell_ref.sheet.as_deref(), Some("Q1 '24"));

        assert!(matches!(
            parse_formula("=A1#").unwrap(),
            FormulaExpr::SpreadRef(_)
        ));
        assert!(parse_formula("=Sheet1!A1:Sheet2!B2").is_err());
    }

    #[test]
    fn test_parse_function() {
        let FormulaExpr::Function { name, args } = parse_formula("=sum(1, A1:A10)").unwrap() else {
            panic!("Expected Function");
        };
        assert_eq!(name, "SUM");
        assert_eq!(args.len(), 2);
        assert!(matches!(&args[1], FormulaExpr::RangeRef(_)));

        // A name that looks like a reference is a call when followed by '('
        assert!(matches!(
            parse_formula("=LOG10(100)").unwrap(),
            FormulaExpr::Function { .. }
        ));

        assert_eq!(
            parse_formula("=PERCENTILE.EXC(A1:A4,0.5)")
                .unwrap()
                .function_names(),
            vec!["PERCENTILE.EXC"]
        );
    }

    #[test]
    fn test_omitted_arguments() {
        let FormulaExpr::Function { args, .. } = parse_formula("=IF(A1,,2)").unwrap() else {
            panic!("Expected Function");
        };
        assert_eq!(args.len(), 3);
        assert_eq!(args[1], FormulaExpr::Missing);

        let FormulaExpr::Function { args, .. } = parse_formula("=NOW()").unwrap() else {
            panic!("Expected Function");
        };
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_array() {
        let FormulaExpr::Array(rows) = parse_formula("={1,2;3,4;5,6}").unwrap() else {
            panic!("Expected Array");
        };
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec![FormulaExpr::Number(5.0), FormulaExpr::Number(6.0)]);
    }

    #[test]
    fn test_parse_failures() {
        assert!(parse_formula("1+2").is_err());
        assert!(parse_formula("=1+").is_err());
        assert!(parse_formula("=(1+2").is_err());
        assert!(parse_formula("=1 @ 2").is_err());
        assert!(parse_formula("=\"open").is_err());
        assert!(parse_formula("=1:2").is_err());
    }
}
