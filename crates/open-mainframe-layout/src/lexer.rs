//! Operand tokenizer.
//!
//! Splits an operand string such as `FIELD+L'FIELD*2`, `X'1F'` or `*-4` into
//! typed tokens. The `*` glyph is the location counter when it opens an
//! operand or follows an arithmetic operator or `(`, and multiplication
//! otherwise.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::lookup::{RegisterLookup, RegisterTable};

// ---------------------------------------------------------------------------
//  Token types
// ---------------------------------------------------------------------------

/// An operand token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A decimal self-defining term.
    Decimal(i64),
    /// A register reference, with the name as written.
    Register { name: String, number: u8 },
    /// A symbol reference.
    Symbol(String),
    /// A quote-prefixed literal: `X'1F'`, `C'AB'`, `L'FIELD`. The payload is
    /// interpreted by the evaluator according to the type tag.
    DataLiteral { data_type: String, payload: String },
    /// The location counter: `*`.
    LocationCounter,
    /// An arithmetic operator: `+`, `-`, `*`, `/`.
    Operator(char),
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// Operand separator.
    Comma,
}

impl Token {
    /// Whether this token supplies a value (as opposed to punctuation).
    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            Token::Decimal(_)
                | Token::Register { .. }
                | Token::Symbol(_)
                | Token::DataLiteral { .. }
                | Token::LocationCounter
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Decimal(n) => write!(f, "{n}"),
            Token::Register { name, .. } => write!(f, "{name}"),
            Token::Symbol(s) => write!(f, "{s}"),
            Token::DataLiteral { data_type, payload } if data_type.eq_ignore_ascii_case("L") => {
                write!(f, "{data_type}'{payload}")
            }
            Token::DataLiteral { data_type, payload } => {
                write!(f, "{data_type}'{}'", payload.replace('\'', "''"))
            }
            Token::LocationCounter => write!(f, "*"),
            Token::Operator(o) => write!(f, "{o}"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
        }
    }
}

// ---------------------------------------------------------------------------
//  Error types
// ---------------------------------------------------------------------------

/// Tokenizer error. Positions are character offsets into the operand.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum MalformedOperandError {
    #[error("invalid separator before '{ch}' at position {pos}")]
    #[diagnostic(code(layout::lexer::invalid_separator))]
    InvalidSeparator { ch: char, pos: usize },
    #[error("unexpected character '{ch}' at position {pos}")]
    #[diagnostic(code(layout::lexer::unexpected_char))]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unterminated literal starting at position {pos}")]
    #[diagnostic(code(layout::lexer::unterminated_literal))]
    UnterminatedLiteral { pos: usize },
    #[error("decimal term out of range: {text}")]
    #[diagnostic(code(layout::lexer::decimal_out_of_range))]
    DecimalOutOfRange { text: String },
}

// ---------------------------------------------------------------------------
//  Tokenizer
// ---------------------------------------------------------------------------

/// Characters that may continue a symbol run.
pub(crate) fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_' | '&' | '.')
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '@' | '#' | '$' | '_')
}

/// Tokenize an operand with the standard register table.
pub fn tokenize(operand: &str) -> Result<Vec<Token>, MalformedOperandError> {
    tokenize_with(operand, &RegisterTable::standard())
}

/// Tokenize an operand, classifying register names through `registers`.
pub fn tokenize_with(
    operand: &str,
    registers: &dyn RegisterLookup,
) -> Result<Vec<Token>, MalformedOperandError> {
    let mut tokens: Vec<Token> = Vec::new();
    let chars: Vec<char> = operand.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // A run may not open directly after a completed operand or `)`.
        if (is_symbol_char(c) || c == '\'')
            && matches!(tokens.last(), Some(t) if t.is_operand() || *t == Token::RParen)
            && !chars[i - 1].is_whitespace()
        {
            return Err(MalformedOperandError::InvalidSeparator { ch: c, pos: i });
        }

        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' | '-' | '/' => {
                tokens.push(Token::Operator(c));
                i += 1;
            }
            '*' => {
                if matches!(
                    tokens.last(),
                    None | Some(Token::Operator(_)) | Some(Token::Comma) | Some(Token::LParen)
                ) {
                    tokens.push(Token::LocationCounter);
                } else {
                    tokens.push(Token::Operator('*'));
                }
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| MalformedOperandError::DecimalOutOfRange { text })?;
                tokens.push(Token::Decimal(n));
            }
            c if is_symbol_start(c) => {
                let start = i;
                while i < chars.len() && is_symbol_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();

                if i < chars.len() && chars[i] == '\'' {
                    if word.eq_ignore_ascii_case("L") {
                        // Length attribute: the quote belongs to the run.
                        i += 1;
                        let field_start = i;
                        while i < chars.len() && is_symbol_char(chars[i]) {
                            i += 1;
                        }
                        if field_start == i {
                            return Err(MalformedOperandError::UnterminatedLiteral { pos: start });
                        }
                        let payload: String = chars[field_start..i].iter().collect();
                        tokens.push(Token::DataLiteral {
                            data_type: word.to_uppercase(),
                            payload,
                        });
                    } else {
                        i += 1;
                        let payload = read_quoted(&chars, &mut i)
                            .ok_or(MalformedOperandError::UnterminatedLiteral { pos: start })?;
                        tokens.push(Token::DataLiteral {
                            data_type: word.to_uppercase(),
                            payload,
                        });
                    }
                } else if let Some(number) = registers.register(&word) {
                    tokens.push(Token::Register { name: word, number });
                } else {
                    tokens.push(Token::Symbol(word));
                }
            }
            other => return Err(MalformedOperandError::UnexpectedChar { ch: other, pos: i }),
        }
    }

    Ok(tokens)
}

/// Read a quoted payload starting just after the opening quote. Doubled
/// quotes stand for one quote. Leaves `i` after the closing quote.
fn read_quoted(chars: &[char], i: &mut usize) -> Option<String> {
    let mut value = String::new();
    while *i < chars.len() {
        if chars[*i] == '\'' {
            if *i + 1 < chars.len() && chars[*i + 1] == '\'' {
                value.push('\'');
                *i += 2;
            } else {
                *i += 1;
                return Some(value);
            }
        } else {
            value.push(chars[*i]);
            *i += 1;
        }
    }
    None
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
