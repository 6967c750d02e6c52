//! Layout directives and the DS/DC storage-operand decoder.
//!
//! Covers the directives that shape a data layout (`DS`, `DC`, `EQU`, `ORG`,
//! `DSECT`), the fixed catalog of storage type codes, and structural decoding
//! of a storage operand into duplication factor, type, and length.

use std::fmt;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostic::ErrorKind;
use crate::expr::{evaluate_operand, EvalError, Value};
use crate::lexer::is_symbol_char;
use crate::lookup::Lookups;

// ---------------------------------------------------------------------------
//  Directive catalog
// ---------------------------------------------------------------------------

/// Directives understood by the layout builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Directive {
    /// Reserve storage.
    Ds,
    /// Define constant. Laid out like `DS`; the nominal value is ignored.
    Dc,
    /// Assign a computed value to a label.
    Equ,
    /// Reposition the location counter.
    Org,
    /// Open a dummy section.
    Dsect,
}

impl Directive {
    /// Try to parse a directive from an opcode string.
    pub fn from_opcode(opcode: &str) -> Option<Self> {
        match opcode.trim().to_uppercase().as_str() {
            "DS" => Some(Self::Ds),
            "DC" => Some(Self::Dc),
            "EQU" => Some(Self::Equ),
            "ORG" => Some(Self::Org),
            "DSECT" => Some(Self::Dsect),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ds => "DS",
            Self::Dc => "DC",
            Self::Equ => "EQU",
            Self::Org => "ORG",
            Self::Dsect => "DSECT",
        };
        write!(f, "{s}")
    }
}

impl TryFrom<String> for Directive {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_opcode(&value).ok_or_else(|| format!("unknown directive: {value}"))
    }
}

impl From<Directive> for String {
    fn from(value: Directive) -> Self {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
//  Storage type codes
// ---------------------------------------------------------------------------

/// A DS/DC type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    /// Hexadecimal (X).
    X,
    /// Character (C).
    C,
    /// Halfword fixed-point (H).
    H,
    /// Fullword fixed-point (F).
    F,
    /// Long floating-point (D).
    D,
    /// Doubleword fixed-point (FD).
    Fd,
    /// Binary (B).
    B,
    /// Packed decimal (P).
    P,
    /// Zoned decimal (Z).
    Z,
    /// Address constant (A).
    A,
    /// Address halfword (Y).
    Y,
    /// Address doubleword (AD).
    Ad,
    /// External address constant (V).
    V,
    /// Base-displacement address constant (S).
    S,
}

impl DataType {
    /// Parse a type code. Codes are case-insensitive.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "X" => Some(Self::X),
            "C" => Some(Self::C),
            "H" => Some(Self::H),
            "F" => Some(Self::F),
            "D" => Some(Self::D),
            "FD" => Some(Self::Fd),
            "B" => Some(Self::B),
            "P" => Some(Self::P),
            "Z" => Some(Self::Z),
            "A" => Some(Self::A),
            "Y" => Some(Self::Y),
            "AD" => Some(Self::Ad),
            "V" => Some(Self::V),
            "S" => Some(Self::S),
            _ => None,
        }
    }

    /// Fixed byte size. Doubles as the default length and the alignment.
    pub fn byte_size(self) -> u32 {
        match self {
            Self::X | Self::C | Self::B | Self::P | Self::Z => 1,
            Self::H | Self::Y | Self::S => 2,
            Self::F | Self::A | Self::V => 4,
            Self::D | Self::Fd | Self::Ad => 8,
        }
    }

    /// The code as written in source.
    pub fn code(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::C => "C",
            Self::H => "H",
            Self::F => "F",
            Self::D => "D",
            Self::Fd => "FD",
            Self::B => "B",
            Self::P => "P",
            Self::Z => "Z",
            Self::A => "A",
            Self::Y => "Y",
            Self::Ad => "AD",
            Self::V => "V",
            Self::S => "S",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
//  Storage operand decoding
// ---------------------------------------------------------------------------

/// A structurally decoded DS/DC operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StorageOperand {
    /// Duplication factor (default 1).
    pub duplication: u32,
    /// Type code.
    pub data_type: DataType,
    /// Length of one element in bytes (default: the type's byte size).
    pub length: u32,
}

impl StorageOperand {
    /// Bytes reserved by this operand, or `None` if the product does not fit
    /// a location counter.
    pub fn total_length(&self) -> Option<i64> {
        i64::from(self.duplication).checked_mul(i64::from(self.length))
    }
}

/// Storage-operand decoding error.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum DecodeError {
    #[error("invalid duplication factor: {0:?}")]
    #[diagnostic(code(layout::invalid_duplication_factor))]
    InvalidDuplicationFactor(String),
    #[error("invalid duplication factor {text}: {source}")]
    #[diagnostic(code(layout::invalid_duplication_factor))]
    DuplicationExpression {
        text: String,
        #[source]
        source: EvalError,
    },
    #[error("invalid data type: {0:?}")]
    #[diagnostic(code(layout::invalid_data_type))]
    InvalidDataType(String),
    #[error("invalid length modifier: {0}")]
    #[diagnostic(code(layout::invalid_length))]
    Length(#[source] EvalError),
}

impl DecodeError {
    /// The diagnostic kind reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDuplicationFactor(_) | Self::DuplicationExpression { .. } => {
                ErrorKind::InvalidDuplicationFactor
            }
            Self::InvalidDataType(_) => ErrorKind::InvalidDataType,
            Self::Length(e) => e.kind(),
        }
    }

    /// Whether the length sub-expression names a label that is not defined yet.
    pub fn is_forward_reference(&self) -> bool {
        matches!(self, Self::Length(e) if e.is_forward_reference())
    }
}

/// Decode a storage operand like `F`, `3H`, `CL80`, `XL(L'FIELD)`, `0FD`.
///
/// Grammar: `[<digits>|(<expr>)]<type>[L(<expr>)|L<digits>]`. Anything after
/// the length modifier (a nominal value list) is left unparsed.
pub fn decode_storage_operand(
    operand: &str,
    lookups: &Lookups<'_>,
) -> Result<StorageOperand, DecodeError> {
    let s = operand.trim();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;

    // Duplication factor.
    let duplication = if chars.first() == Some(&'(') {
        let close = matching_paren(&chars, 0)
            .ok_or_else(|| DecodeError::InvalidDuplicationFactor(s.to_string()))?;
        let text: String = chars[..=close].iter().collect();
        i = close + 1;
        let result = match evaluate_operand(&text, lookups) {
            Ok((Value::Int(n), _)) => u32::try_from(n).map_err(|_| {
                EvalError::EvaluationFailed(format!("duplication factor out of range: {n}"))
            }),
            Ok((Value::Char(c), _)) => Err(EvalError::NotANumber(c)),
            Err(e) => Err(e),
        };
        result.map_err(|source| DecodeError::DuplicationExpression { text, source })?
    } else {
        while i < chars.len() && !chars[i].is_ascii_alphabetic() {
            i += 1;
        }
        let prefix: String = chars[..i].iter().collect();
        if prefix.is_empty() {
            1
        } else if prefix.chars().all(|c| c.is_ascii_digit()) {
            prefix
                .parse::<u32>()
                .map_err(|_| DecodeError::InvalidDuplicationFactor(prefix.clone()))?
        } else {
            return Err(DecodeError::InvalidDuplicationFactor(prefix));
        }
    };

    // Type code: the alphabetic run up to an optional `L`.
    let start = i;
    while i < chars.len() && chars[i].is_ascii_alphabetic() && !chars[i].eq_ignore_ascii_case(&'L') {
        i += 1;
    }
    let code: String = chars[start..i].iter().collect();
    let data_type = lookups
        .data_types
        .data_type(&code)
        .ok_or_else(|| DecodeError::InvalidDataType(code.to_uppercase()))?;

    // Length modifier.
    let mut length = lookups.data_types.byte_size(data_type);
    if i < chars.len() && chars[i].eq_ignore_ascii_case(&'L') {
        i += 1;
        length = if chars.get(i) == Some(&'(') {
            let close = matching_paren(&chars, i).ok_or_else(|| {
                DecodeError::Length(EvalError::EvaluationFailed(format!(
                    "unbalanced parentheses in {s}"
                )))
            })?;
            let text: String = chars[i..=close].iter().collect();
            match evaluate_operand(&text, lookups).map_err(DecodeError::Length)? {
                (Value::Int(n), _) => u32::try_from(n).map_err(|_| {
                    DecodeError::Length(EvalError::EvaluationFailed(format!(
                        "length out of range: {n}"
                    )))
                })?,
                (Value::Char(c), _) => return Err(DecodeError::Length(EvalError::NotANumber(c))),
            }
        } else {
            let digits_start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let digits: String = chars[digits_start..i].iter().collect();
            digits
                .parse::<u32>()
                .map_err(|_| DecodeError::Length(EvalError::NotANumber(digits)))?
        };
    }

    Ok(StorageOperand {
        duplication,
        data_type,
        length,
    })
}

/// Index of the parenthesis closing the one at `open`. Quoted text is skipped,
/// except after a length attribute (`L'`), which is not a quoted string.
fn matching_paren(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    for (idx, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '\'' if in_quote => in_quote = false,
            '\'' => {
                let attr = idx > 0
                    && chars[idx - 1].eq_ignore_ascii_case(&'L')
                    && (idx < 2 || !is_symbol_char(chars[idx - 2]));
                in_quote = !attr;
            }
            _ if in_quote => {}
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
