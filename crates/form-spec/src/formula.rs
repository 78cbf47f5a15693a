//! Calculation formulas: `{field:ID}` substitution followed by a restricted
//! arithmetic evaluator (numbers, `+ - * /`, parentheses, unary sign).

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

use crate::data::{FormData, to_number};

static FIELD_TOKEN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{field:([^}]*)\}"));

static ARITHMETIC_ONLY: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-*/().\s]*$"));

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("formula pattern failed to compile: {0}")]
    Pattern(String),
    #[error("formula contains characters outside the arithmetic whitelist: '{0}'")]
    Forbidden(String),
    #[error("formula is empty")]
    Empty,
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("unexpected '{found}' at offset {offset}")]
    UnexpectedToken { found: char, offset: usize },
    #[error("formula ended unexpectedly")]
    UnexpectedEnd,
}

/// Evaluates a calculation formula against the snapshot.
///
/// Returns `None` when the formula is rejected; callers keep the previous value.
pub fn evaluate(formula: &str, data: &FormData) -> Option<f64> {
    match try_evaluate(formula, data) {
        Ok(value) => Some(value),
        Err(err) => {
            log::debug!("formula '{}' skipped: {}", formula, err);
            None
        }
    }
}

pub fn try_evaluate(formula: &str, data: &FormData) -> Result<f64, FormulaError> {
    let expression = substitute(formula, data)?;
    evaluate_expression(&expression)
}

/// Replaces every `{field:ID}` token with the numeric value of that field.
/// Missing and non-numeric values become `0`.
pub fn substitute(formula: &str, data: &FormData) -> Result<String, FormulaError> {
    let token = pattern(&FIELD_TOKEN)?;
    let replaced = token.replace_all(formula, |caps: &Captures<'_>| {
        let number = data
            .get(caps[1].trim())
            .map(to_number)
            .filter(|number| !number.is_nan())
            .unwrap_or(0.0);
        format!("{}", number)
    });
    Ok(replaced.into_owned())
}

/// Field ids referenced by a formula, in order of first appearance.
pub fn referenced_fields(formula: &str) -> Vec<String> {
    let Ok(token) = pattern(&FIELD_TOKEN) else {
        return Vec::new();
    };
    let mut ids: Vec<String> = Vec::new();
    for caps in token.captures_iter(formula) {
        let id = caps[1].trim().to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Evaluates an already-substituted arithmetic expression.
pub fn evaluate_expression(expression: &str) -> Result<f64, FormulaError> {
    if !pattern(&ARITHMETIC_ONLY)?.is_match(expression) {
        return Err(FormulaError::Forbidden(expression.to_string()));
    }
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }
    let mut parser = Parser { tokens, index: 0 };
    let value = parser.parse_sum()?;
    match parser.tokens.get(parser.index) {
        None => Ok(value),
        Some(token) => Err(token.unexpected()),
    }
}

fn pattern(cell: &'static LazyLock<Result<Regex, regex::Error>>) -> Result<&'static Regex, FormulaError> {
    LazyLock::force(cell)
        .as_ref()
        .map_err(|err| FormulaError::Pattern(err.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    offset: usize,
    text: char,
}

impl Token {
    fn unexpected(&self) -> FormulaError {
        FormulaError::UnexpectedToken {
            found: self.text,
            offset: self.offset,
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        let kind = match ch {
            c if c.is_whitespace() => continue,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::Open,
            ')' => TokenKind::Close,
            c if c.is_ascii_digit() || c == '.' => {
                let mut literal = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        literal.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| FormulaError::InvalidNumber(literal.clone()))?;
                TokenKind::Number(number)
            }
            other => {
                return Err(FormulaError::UnexpectedToken {
                    found: other,
                    offset,
                });
            }
        };
        tokens.push(Token {
            kind,
            offset,
            text: ch,
        });
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.index).map(|token| token.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).copied();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    // sum := product (('+' | '-') product)*
    fn parse_sum(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.parse_product()?;
        loop {
            match self.peek() {
                Some(TokenKind::Plus) => {
                    self.index += 1;
                    value += self.parse_product()?;
                }
                Some(TokenKind::Minus) => {
                    self.index += 1;
                    value -= self.parse_product()?;
                }
                _ => return Ok(value),
            }
        }
    }

    // product := unary (('*' | '/') unary)*
    fn parse_product(&mut self) -> Result<f64, FormulaError> {
        let mut value = self.parse_unary()?;
        loop {
            match self.peek() {
                Some(TokenKind::Star) => {
                    self.index += 1;
                    value *= self.parse_unary()?;
                }
                Some(TokenKind::Slash) => {
                    self.index += 1;
                    // IEEE semantics: x/0 is +-Infinity, 0/0 is NaN.
                    value /= self.parse_unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<f64, FormulaError> {
        match self.peek() {
            Some(TokenKind::Minus) => {
                self.index += 1;
                Ok(-self.parse_unary()?)
            }
            Some(TokenKind::Plus) => {
                self.index += 1;
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<f64, FormulaError> {
        let token = self.advance().ok_or(FormulaError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(value) => Ok(value),
            TokenKind::Open => {
                let value = self.parse_sum()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::Close,
                        ..
                    }) => Ok(value),
                    Some(other) => Err(other.unexpected()),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            _ => Err(token.unexpected()),
        }
    }
}
