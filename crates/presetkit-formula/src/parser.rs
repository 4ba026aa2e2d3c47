//! Formula parser
//!
//! A recursive descent parser for setting formulas with proper operator
//! precedence. The grammar is expression-only: there are no statements,
//! assignments or host objects, and calls name built-ins directly.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions;
use std::sync::Arc;

/// Maximum nesting depth accepted by the parser
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use presetkit_formula::parse_formula;
///
/// let ast = parse_formula("1 + 2").unwrap();
/// let ast = parse_formula("nozzle_diameter * 0.5").unwrap();
/// let ast = parse_formula("adhesion_type == 'brim' ? 8 : 0").unwrap();
/// let ast = parse_formula("sum(map(x => x * 2, [1, 2, 3]))").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<Expr> {
    let mut parser = FormulaParser::new(formula);
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {} after expression",
            parser.current_token().describe()
        )));
    }

    // Operator chains are parsed in a loop but evaluated recursively
    if expr.depth() > MAX_NESTING_DEPTH {
        return Err(FormulaError::TooLarge(format!(
            "expression deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Identifiers (setting keys, parameters, dotted built-in names)
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    Comma,
    Arrow,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,

    /// Lexical error, reported when the parser reaches it
    Invalid(String),

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(s) => format!("string {:?}", s),
            Token::Boolean(b) => format!("boolean {}", b),
            Token::Identifier(name) => format!("identifier '{}'", name),
            Token::Invalid(msg) => msg.clone(),
            Token::Eof => "end of formula".to_string(),
            other => format!("{:?}", other),
        }
    }
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Option<Token>,
    depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> Self {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: None,
            depth: 0,
        };
        parser.advance_token();
        parser
    }

    // === Token scanning ===

    fn advance_token(&mut self) {
        self.current_token = Some(self.scan_token());
    }

    /// Scan the token after the current one without consuming it
    fn peek_next_token(&mut self) -> Token {
        let saved = self.pos;
        let token = self.scan_token();
        self.pos = saved;
        token
    }

    fn scan_token(&mut self) -> Token {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Token::Eof;
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '?' => Some(Token::Question),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return token;
        }

        // Multi-character operators
        match c {
            '*' => {
                self.advance();
                if self.eat('*') {
                    return Token::StarStar;
                }
                return Token::Star;
            }
            '<' => {
                self.advance();
                if self.eat('=') {
                    return Token::LessEqual;
                }
                return Token::LessThan;
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    return Token::GreaterEqual;
                }
                return Token::GreaterThan;
            }
            '=' => {
                self.advance();
                if self.eat('>') {
                    return Token::Arrow;
                }
                if self.eat('=') {
                    // `===` is the same comparison as `==`
                    self.eat('=');
                    return Token::Equal;
                }
                return Token::Invalid("assignment '=' is not allowed in formulas".into());
            }
            '!' => {
                self.advance();
                if self.eat('=') {
                    self.eat('=');
                    return Token::NotEqual;
                }
                return Token::Bang;
            }
            '&' => {
                self.advance();
                if self.eat('&') {
                    return Token::AndAnd;
                }
                return Token::Invalid("bitwise '&' is not supported".into());
            }
            '|' => {
                self.advance();
                if self.eat('|') {
                    return Token::OrOr;
                }
                return Token::Invalid("bitwise '|' is not supported".into());
            }
            _ => {}
        }

        // String literal
        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Identifier or boolean
        if c.is_ascii_alphabetic() || c == '_' {
            return self.scan_identifier();
        }

        // Unknown character
        self.advance();
        Token::Invalid(format!("unexpected character '{}'", c))
    }

    fn scan_string(&mut self, quote: char) -> Token {
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => return Token::Invalid("unterminated string literal".into()),
                Some(c) if c == quote => {
                    self.advance();
                    return Token::String(s);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('\'') => '\'',
                        Some('"') => '"',
                        Some(other) => {
                            return Token::Invalid(format!("unknown escape '\\{}'", other))
                        }
                        None => return Token::Invalid("unterminated string literal".into()),
                    };
                    s.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) if n.is_finite() => Token::Number(n),
            Ok(_) => Token::Invalid(format!("number out of range '{}'", num_str)),
            Err(_) => Token::Invalid(format!("malformed number '{}'", num_str)),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;

        // Dots are part of the identifier so `math.radians` and `obj.field`
        // arrive as one token; the parser splits member chains.
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        match text {
            "true" | "True" => Token::Boolean(true),
            "false" | "False" => Token::Boolean(false),
            _ => Token::Identifier(text.to_string()),
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> Token {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token();
        token
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume();
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {}",
                expected,
                self.current_token().describe()
            )))
        }
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> FormulaResult<T>) -> FormulaResult<T> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(FormulaError::TooLarge(format!(
                "nesting deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Lambda: x => ...
    // 2. Ternary: ? :
    // 3. Logical or: ||
    // 4. Logical and: &&
    // 5. Equality: ==, !=
    // 6. Comparison: <, <=, >, >=
    // 7. Addition/Subtraction: +, -
    // 8. Multiplication/Division/Modulo: *, /, %
    // 9. Unary: -, +, !
    // 10. Exponentiation: ** (right associative)
    // 11. Postfix: [index]
    // 12. Primary: literals, references, calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.nested(|p| {
            if let Token::Identifier(name) = p.current_token().clone() {
                if !name.contains('.') && p.peek_next_token() == Token::Arrow {
                    p.consume();
                    p.consume();
                    let body = p.parse_expression()?;
                    return Ok(Expr::Lambda {
                        param: name,
                        body: Arc::new(body),
                    });
                }
            }
            p.parse_ternary()
        })
    }

    fn parse_ternary(&mut self) -> FormulaResult<Expr> {
        let condition = self.parse_or()?;

        if matches!(self.current_token(), Token::Question) {
            self.consume();
            let then_branch = self.parse_expression()?;
            self.expect(&Token::Colon)?;
            let else_branch = self.parse_expression()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(condition)
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_and()?;

        while matches!(self.current_token(), Token::OrOr) {
            self.consume();
            let right = self.parse_and()?;
            left = binary(BinaryOperator::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_equality()?;

        while matches!(self.current_token(), Token::AndAnd) {
            self.consume();
            let right = self.parse_equality()?;
            left = binary(BinaryOperator::And, left, right);
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_comparison()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_comparison()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current_token() {
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        let op = match self.current_token() {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Bang => Some(UnaryOperator::Not),
            Token::Plus => None,
            _ => return self.parse_power(),
        };

        self.consume();
        let operand = self.nested(|p| p.parse_unary())?;
        Ok(match op {
            Some(op) => Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            // Prefix plus (no-op)
            None => operand,
        })
    }

    fn parse_power(&mut self) -> FormulaResult<Expr> {
        let left = self.parse_postfix()?;

        if matches!(self.current_token(), Token::StarStar) {
            self.consume();
            // Right associative; the exponent may carry its own sign
            let right = self.nested(|p| p.parse_unary())?;
            return Ok(binary(BinaryOperator::Power, left, right));
        }

        Ok(left)
    }

    fn parse_postfix(&mut self) -> FormulaResult<Expr> {
        let mut expr = self.parse_primary()?;

        while matches!(self.current_token(), Token::LeftBracket) {
            self.consume();
            let index = self.parse_expression()?;
            self.expect(&Token::RightBracket)?;
            expr = Expr::Index {
                object: Box::new(expr),
                index: Box::new(index),
            };
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume();
                Ok(Expr::Number(n))
            }

            Token::String(s) => {
                self.consume();
                Ok(Expr::String(s))
            }

            Token::Boolean(b) => {
                self.consume();
                Ok(Expr::Boolean(b))
            }

            Token::LeftParen => {
                self.consume();
                let expr = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }

            Token::LeftBracket => self.parse_list(),

            Token::LeftBrace => self.parse_object(),

            Token::Identifier(name) => {
                self.consume();
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name)
                } else {
                    self.parse_reference(name)
                }
            }

            Token::Invalid(msg) => Err(FormulaError::Parse(msg)),

            other => Err(FormulaError::Parse(format!(
                "Unexpected {}",
                other.describe()
            ))),
        }
    }

    /// Comma separated expressions up to `close`; a trailing comma is allowed
    fn parse_list_items(&mut self, close: &Token) -> FormulaResult<Vec<Expr>> {
        let mut items = Vec::new();

        while self.current_token() != close {
            items.push(self.parse_expression()?);
            if matches!(self.current_token(), Token::Comma) {
                self.consume();
            } else {
                break;
            }
        }

        self.expect(close)?;
        Ok(items)
    }

    fn parse_list(&mut self) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBracket)?;
        let items = self.parse_list_items(&Token::RightBracket)?;
        Ok(Expr::List(items))
    }

    fn parse_object(&mut self) -> FormulaResult<Expr> {
        self.expect(&Token::LeftBrace)?;

        let mut fields = Vec::new();
        while !matches!(self.current_token(), Token::RightBrace) {
            let key = match self.consume() {
                Token::Identifier(name) if !name.contains('.') => name,
                Token::String(s) => s,
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Expected object key, got {}",
                        other.describe()
                    )))
                }
            };
            self.expect(&Token::Colon)?;
            let value = self.parse_expression()?;
            fields.push((key, value));

            if matches!(self.current_token(), Token::Comma) {
                self.consume();
            } else {
                break;
            }
        }

        self.expect(&Token::RightBrace)?;
        Ok(Expr::Object(fields))
    }

    fn parse_function_call(&mut self, name: String) -> FormulaResult<Expr> {
        self.expect(&Token::LeftParen)?;
        let args = self.parse_list_items(&Token::RightParen)?;
        Ok(Expr::Call {
            function: name,
            args,
        })
    }

    fn parse_reference(&mut self, name: String) -> FormulaResult<Expr> {
        if !name.contains('.') {
            return Ok(Expr::Variable(name));
        }

        if functions::registry().get(&name).is_some() {
            return Ok(Expr::FunctionRef(name));
        }

        let mut segments = name.split('.');
        let head = segments.next().unwrap_or_default();
        if head.is_empty() {
            return Err(FormulaError::Parse(format!("Malformed reference '{}'", name)));
        }

        let mut expr = Expr::Variable(head.to_string());
        for field in segments {
            if field.is_empty() {
                return Err(FormulaError::Parse(format!("Malformed reference '{}'", name)));
            }
            expr = Expr::Member {
                object: Box::new(expr),
                field: field.to_string(),
            };
        }
        Ok(expr)
    }
}

fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
