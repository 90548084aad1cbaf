//! QSL parser
//!
//! Turns a filter string into an untyped expression tree. Field names are
//! checked against the field grammar here; whether they exist, and what type
//! they have, is decided by the compiler.

use super::compiler::CompileError;
use crate::schema::is_valid_field_name;

/// Deepest nesting of parentheses and `NOT` a filter may use.
pub const MAX_NESTING: usize = 64;

/// Comparison operator as written in the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Contains => "contains",
            CompareOp::StartsWith => "startswith",
        }
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge)
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Literal as written; coerced to a field type by the compiler
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string
    Text(String),
    /// Unquoted word that is neither a number nor a boolean
    Word(String),
    /// Numeric literal, kept as written
    Number(String),
    Bool(bool),
}

impl Literal {
    /// Textual form, used when a literal is compared against a string field.
    pub fn as_text(&self) -> String {
        match self {
            Literal::Text(s) | Literal::Word(s) | Literal::Number(s) => s.clone(),
            Literal::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        field: String,
        op: CompareOp,
        value: Literal,
    },
    Exists {
        field: String,
    },
}

impl Expr {
    /// Every field referenced, in order of first appearance.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::And(items) | Expr::Or(items) => {
                for item in items {
                    item.collect_fields(out);
                }
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::Compare { field, .. } | Expr::Exists { field } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Text(String),
    Op(CompareOp),
    LParen,
    RParen,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | ':' | '/' | '+')
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, CompileError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push((pos, Token::LParen));
            }
            ')' => {
                chars.next();
                tokens.push((pos, Token::RParen));
            }
            '=' => {
                chars.next();
                tokens.push((pos, Token::Op(CompareOp::Eq)));
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => tokens.push((pos, Token::Op(CompareOp::Ne))),
                    _ => return Err(CompileError::syntax(pos, "expected '=' after '!'")),
                }
            }
            '<' | '>' => {
                chars.next();
                let with_eq = matches!(chars.peek(), Some(&(_, '=')));
                if with_eq {
                    chars.next();
                }
                let op = match (c, with_eq) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                tokens.push((pos, Token::Op(op)));
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => match chars.next() {
                            Some((_, escaped)) => text.push(escaped),
                            None => return Err(CompileError::syntax(pos, "unterminated string")),
                        },
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => text.push(ch),
                        None => return Err(CompileError::syntax(pos, "unterminated string")),
                    }
                }
                tokens.push((pos, Token::Text(text)));
            }
            c if is_word_char(c) => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if !is_word_char(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push((pos, Token::Word(word)));
            }
            other => {
                return Err(CompileError::syntax(
                    pos,
                    format!("unexpected character '{}'", other),
                ))
            }
        }
    }

    Ok(tokens)
}

fn keyword(word: &str, expected: &str) -> bool {
    word.eq_ignore_ascii_case(expected)
}

fn classify_word(word: String) -> Literal {
    if keyword(&word, "true") {
        Literal::Bool(true)
    } else if keyword(&word, "false") {
        Literal::Bool(false)
    } else if word.parse::<i64>().is_ok() || word.parse::<f64>().is_ok() {
        Literal::Number(word)
    } else {
        Literal::Word(word)
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map(|(p, _)| *p).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, expected: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if keyword(w, expected))
    }

    fn or_expr(&mut self) -> Result<Expr, CompileError> {
        let mut items = vec![self.and_expr()?];
        while self.peek_keyword("or") {
            self.next();
            items.push(self.and_expr()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Or(items)
        })
    }

    fn and_expr(&mut self) -> Result<Expr, CompileError> {
        let mut items = vec![self.unary()?];
        while self.peek_keyword("and") {
            self.next();
            items.push(self.unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::And(items)
        })
    }

    fn descend(&mut self) -> Result<(), CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(CompileError::syntax(self.offset(), "filter nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        if self.peek_keyword("not") {
            self.descend()?;
            self.next();
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.descend()?;
            self.next();
            let inner = self.or_expr()?;
            let at = self.offset();
            self.depth -= 1;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                _ => Err(CompileError::syntax(at, "expected ')'")),
            };
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, CompileError> {
        let at = self.offset();
        let field = match self.next() {
            Some(Token::Word(w)) if is_valid_field_name(&w) => w,
            Some(Token::Word(w)) => {
                return Err(CompileError::syntax(at, format!("invalid field name '{}'", w)))
            }
            _ => return Err(CompileError::syntax(at, "expected field name")),
        };

        let at = self.offset();
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(Token::Word(w)) if keyword(&w, "exists") => return Ok(Expr::Exists { field }),
            Some(Token::Word(w)) if keyword(&w, "contains") => CompareOp::Contains,
            Some(Token::Word(w)) if keyword(&w, "startswith") => CompareOp::StartsWith,
            _ => {
                return Err(CompileError::syntax(
                    at,
                    format!("expected operator after '{}'", field),
                ))
            }
        };

        let at = self.offset();
        let value = match self.next() {
            Some(Token::Text(s)) => Literal::Text(s),
            Some(Token::Word(w)) => classify_word(w),
            _ => return Err(CompileError::syntax(at, format!("expected value after '{}'", op))),
        };

        Ok(Expr::Compare { field, op, value })
    }
}

/// Parse a filter string. An empty or blank filter is rejected.
pub fn parse(input: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(CompileError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let expr = parser.or_expr()?;
    if parser.peek().is_some() {
        return Err(CompileError::syntax(parser.offset(), "unexpected trailing input"));
    }
    Ok(expr)
}
