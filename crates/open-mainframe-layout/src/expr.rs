//! Expression evaluator.
//!
//! Two entry points share one evaluation core:
//!
//! - [`evaluate`] takes a token stream from the [`lexer`](crate::lexer) and
//!   returns an integer; register tokens resolve through the optional
//!   register provider.
//! - [`evaluate_operand`] takes a directive operand string (`EQU`, `ORG`,
//!   length modifiers) and returns a [`Value`] plus the data-type tag of the
//!   literal that produced it.
//!
//! Operands resolve as follows: all digits is a decimal term; `*` is the
//! location counter; `T'field` with an empty `T` is a symbol's displacement,
//! `L` its length, `X` a hex term, `C` verbatim text, and any other type code
//! a decimal term. Operands then combine with `+ - * /` and parentheses under
//! the usual precedence rules.

use std::fmt;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::diagnostic::ErrorKind;
use crate::directives::DataType;
use crate::lexer::Token;
use crate::lookup::Lookups;

// ---------------------------------------------------------------------------
//  Values and errors
// ---------------------------------------------------------------------------

/// Result of evaluating an operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    /// Text of a lone `C'...'` term, returned unevaluated.
    Char(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Char(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Char(s) => write!(f, "C'{s}'"),
        }
    }
}

/// Expression evaluation error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum EvalError {
    #[error("undefined symbol: {0}")]
    #[diagnostic(code(layout::invalid_symbol_key))]
    InvalidSymbolKey(String),
    #[error("no length attribute for symbol: {0}")]
    #[diagnostic(code(layout::invalid_length_key))]
    InvalidLengthKey(String),
    #[error("invalid data type: {0:?}")]
    #[diagnostic(code(layout::invalid_data_type))]
    InvalidDataType(String),
    #[error("invalid hex literal: {0:?}")]
    #[diagnostic(code(layout::invalid_hex_literal))]
    InvalidHexLiteral(String),
    #[error("not a number: {0:?}")]
    #[diagnostic(code(layout::not_a_number))]
    NotANumber(String),
    #[error("evaluation failed: {0}")]
    #[diagnostic(code(layout::evaluation_failed))]
    EvaluationFailed(String),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSymbolKey(_) => ErrorKind::InvalidSymbolKey,
            Self::InvalidLengthKey(_) => ErrorKind::InvalidLengthKey,
            Self::InvalidDataType(_) => ErrorKind::InvalidDataType,
            Self::InvalidHexLiteral(_) => ErrorKind::InvalidHexLiteral,
            Self::NotANumber(_) => ErrorKind::NotANumber,
            Self::EvaluationFailed(_) => ErrorKind::EvaluationFailed,
        }
    }

    /// Whether the failure is a reference to a label not defined yet, which a
    /// later pass may be able to resolve.
    pub fn is_forward_reference(&self) -> bool {
        matches!(self, Self::InvalidSymbolKey(_) | Self::InvalidLengthKey(_))
    }
}

// ---------------------------------------------------------------------------
//  Terms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Operand {
    value: Value,
    tag: Option<DataType>,
}

impl Operand {
    fn int(n: i64) -> Self {
        Self {
            value: Value::Int(n),
            tag: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Term {
    Operand(Operand),
    Operator(char),
    Open,
    Close,
}

/// Resolve `<data_type>'<field>` (or a bare field when `data_type` is empty).
fn resolve_field(data_type: &str, field: &str, lookups: &Lookups<'_>) -> Result<Operand, EvalError> {
    // Labels carry no `&` suffix.
    let key = field.split('&').next().unwrap_or(field);

    if data_type.is_empty() {
        return lookups
            .symbols
            .displacement(key)
            .map(Operand::int)
            .ok_or_else(|| EvalError::InvalidSymbolKey(key.to_string()));
    }
    if data_type.eq_ignore_ascii_case("L") {
        return lookups
            .symbols
            .length(key)
            .map(Operand::int)
            .ok_or_else(|| EvalError::InvalidLengthKey(key.to_string()));
    }

    let dt = lookups
        .data_types
        .data_type(data_type)
        .ok_or_else(|| EvalError::InvalidDataType(data_type.to_string()))?;
    let value = match dt {
        DataType::X => {
            if field.is_empty() || !field.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(EvalError::InvalidHexLiteral(field.to_string()));
            }
            let n = i64::from_str_radix(field, 16)
                .map_err(|_| EvalError::InvalidHexLiteral(field.to_string()))?;
            Value::Int(n)
        }
        DataType::C => Value::Char(field.to_string()),
        _ => Value::Int(
            field
                .parse::<i64>()
                .map_err(|_| EvalError::NotANumber(field.to_string()))?,
        ),
    };
    Ok(Operand {
        value,
        tag: Some(dt),
    })
}

/// Resolve one operand of a directive operand string.
fn resolve_operand(text: &str, lookups: &Lookups<'_>) -> Result<Operand, EvalError> {
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return text
            .parse::<i64>()
            .map(Operand::int)
            .map_err(|_| EvalError::NotANumber(text.to_string()));
    }
    if text == "*" {
        return Ok(Operand::int(lookups.location_counter));
    }
    match text.split_once('\'') {
        Some((data_type, rest)) => {
            let field = rest.strip_suffix('\'').unwrap_or(rest).replace("''", "'");
            resolve_field(data_type, &field, lookups)
        }
        None => resolve_field("", text, lookups),
    }
}

/// Split a directive operand into operand texts, operators and parentheses.
fn split_terms(text: &str) -> Result<Vec<RawTerm>, EvalError> {
    let chars: Vec<char> = text.chars().collect();
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                current.push(c);
                i += 1;
                if current.eq_ignore_ascii_case("L'") {
                    // Length attribute: not a quoted string.
                    continue;
                }
                loop {
                    match chars.get(i) {
                        None => {
                            return Err(EvalError::EvaluationFailed(format!(
                                "unterminated literal in {text}"
                            )))
                        }
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            current.push_str("''");
                            i += 2;
                        }
                        Some('\'') => {
                            current.push('\'');
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            current.push(ch);
                            i += 1;
                        }
                    }
                }
            }
            '+' | '-' | '/' | '(' | ')' | '*' => {
                let star_is_counter = c == '*'
                    && current.is_empty()
                    && matches!(
                        terms.last(),
                        None | Some(RawTerm::Operator(_)) | Some(RawTerm::Open)
                    );
                if star_is_counter {
                    current.push('*');
                } else {
                    flush(&mut current, &mut terms);
                    terms.push(match c {
                        '(' => RawTerm::Open,
                        ')' => RawTerm::Close,
                        op => RawTerm::Operator(op),
                    });
                }
                i += 1;
            }
            c if c.is_whitespace() => {
                flush(&mut current, &mut terms);
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }
    flush(&mut current, &mut terms);
    Ok(terms)
}

#[derive(Debug, Clone, PartialEq)]
enum RawTerm {
    Operand(String),
    Operator(char),
    Open,
    Close,
}

fn flush(current: &mut String, terms: &mut Vec<RawTerm>) {
    if !current.is_empty() {
        terms.push(RawTerm::Operand(std::mem::take(current)));
    }
}

// ---------------------------------------------------------------------------
//  Entry points
// ---------------------------------------------------------------------------

/// Evaluate a directive operand string.
///
/// Returns the value and the data-type tag of the last typed literal in the
/// expression (`None` when only decimals, symbols and `*` were involved).
pub fn evaluate_operand(
    text: &str,
    lookups: &Lookups<'_>,
) -> Result<(Value, Option<DataType>), EvalError> {
    let raw = split_terms(text.trim())?;
    let mut terms = Vec::with_capacity(raw.len());
    for term in raw {
        terms.push(match term {
            RawTerm::Operand(s) => Term::Operand(resolve_operand(&s, lookups)?),
            RawTerm::Operator(op) => Term::Operator(op),
            RawTerm::Open => Term::Open,
            RawTerm::Close => Term::Close,
        });
    }
    let operand = reduce(&terms)?;
    Ok((operand.value, operand.tag))
}

/// Evaluate a token stream to an integer.
pub fn evaluate(tokens: &[Token], lookups: &Lookups<'_>) -> Result<i64, EvalError> {
    let mut terms = Vec::with_capacity(tokens.len());
    for token in tokens {
        terms.push(match token {
            Token::Decimal(n) => Term::Operand(Operand::int(*n)),
            Token::LocationCounter => Term::Operand(Operand::int(lookups.location_counter)),
            Token::Register { name, number } => {
                let n = lookups
                    .registers
                    .map_or(Some(*number), |r| r.register(name))
                    .ok_or_else(|| EvalError::InvalidSymbolKey(name.clone()))?;
                Term::Operand(Operand::int(i64::from(n)))
            }
            Token::Symbol(name) => Term::Operand(resolve_field("", name, lookups)?),
            Token::DataLiteral { data_type, payload } => {
                Term::Operand(resolve_field(data_type, payload, lookups)?)
            }
            Token::Operator(op) => Term::Operator(*op),
            Token::LParen => Term::Open,
            Token::RParen => Term::Close,
            Token::Comma => {
                return Err(EvalError::EvaluationFailed(
                    "unexpected ',' in expression".to_string(),
                ))
            }
        });
    }
    let operand = reduce(&terms)?;
    match operand.value {
        Value::Int(n) => Ok(n),
        Value::Char(s) => Err(EvalError::NotANumber(s)),
    }
}

// ---------------------------------------------------------------------------
//  Arithmetic core
// ---------------------------------------------------------------------------

fn reduce(terms: &[Term]) -> Result<Operand, EvalError> {
    if terms.is_empty() {
        return Err(EvalError::EvaluationFailed("empty expression".to_string()));
    }
    // A lone character term is returned as text.
    if let [Term::Operand(op)] = terms {
        return Ok(op.clone());
    }

    let mut pos = 0;
    let mut tag = None;
    let value = eval_additive(terms, &mut pos, &mut tag)?;
    if pos < terms.len() {
        return Err(EvalError::EvaluationFailed(format!(
            "unexpected {} at term {pos}",
            describe(&terms[pos])
        )));
    }
    Ok(Operand {
        value: Value::Int(value),
        tag,
    })
}

fn describe(term: &Term) -> String {
    match term {
        Term::Operand(op) => format!("operand {}", op.value),
        Term::Operator(c) => format!("operator '{c}'"),
        Term::Open => "'('".to_string(),
        Term::Close => "')'".to_string(),
    }
}

fn overflow() -> EvalError {
    EvalError::EvaluationFailed("arithmetic overflow".to_string())
}

fn eval_additive(
    terms: &[Term],
    pos: &mut usize,
    tag: &mut Option<DataType>,
) -> Result<i64, EvalError> {
    let mut left = eval_multiplicative(terms, pos, tag)?;

    while let Some(Term::Operator(op @ ('+' | '-'))) = terms.get(*pos) {
        *pos += 1;
        let right = eval_multiplicative(terms, pos, tag)?;
        left = if *op == '+' {
            left.checked_add(right)
        } else {
            left.checked_sub(right)
        }
        .ok_or_else(overflow)?;
    }

    Ok(left)
}

fn eval_multiplicative(
    terms: &[Term],
    pos: &mut usize,
    tag: &mut Option<DataType>,
) -> Result<i64, EvalError> {
    let mut left = eval_unary(terms, pos, tag)?;

    while let Some(Term::Operator(op @ ('*' | '/'))) = terms.get(*pos) {
        *pos += 1;
        let right = eval_unary(terms, pos, tag)?;
        left = if *op == '*' {
            left.checked_mul(right).ok_or_else(overflow)?
        } else {
            if right == 0 {
                return Err(EvalError::EvaluationFailed("division by zero".to_string()));
            }
            left.checked_div(right).ok_or_else(overflow)?
        };
    }

    Ok(left)
}

fn eval_unary(
    terms: &[Term],
    pos: &mut usize,
    tag: &mut Option<DataType>,
) -> Result<i64, EvalError> {
    match terms.get(*pos) {
        Some(Term::Operator('-')) => {
            *pos += 1;
            let val = eval_unary(terms, pos, tag)?;
            val.checked_neg().ok_or_else(overflow)
        }
        Some(Term::Operator('+')) => {
            *pos += 1;
            eval_unary(terms, pos, tag)
        }
        _ => eval_primary(terms, pos, tag),
    }
}

fn eval_primary(
    terms: &[Term],
    pos: &mut usize,
    tag: &mut Option<DataType>,
) -> Result<i64, EvalError> {
    let term = terms
        .get(*pos)
        .ok_or_else(|| EvalError::EvaluationFailed("unexpected end of expression".to_string()))?;
    *pos += 1;

    match term {
        Term::Operand(op) => {
            if op.tag.is_some() {
                *tag = op.tag;
            }
            match &op.value {
                Value::Int(n) => Ok(*n),
                Value::Char(s) => Err(EvalError::EvaluationFailed(format!(
                    "character term C'{s}' in arithmetic"
                ))),
            }
        }
        Term::Open => {
            let val = eval_additive(terms, pos, tag)?;
            match terms.get(*pos) {
                Some(Term::Close) => {
                    *pos += 1;
                    Ok(val)
                }
                _ => Err(EvalError::EvaluationFailed("missing ')'".to_string())),
            }
        }
        other => Err(EvalError::EvaluationFailed(format!(
            "unexpected {}",
            describe(other)
        ))),
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
