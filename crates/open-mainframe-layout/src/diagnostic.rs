//! Diagnostics recorded while building a layout.
//!
//! A diagnostic never stops resolution. It names the failure kind, the
//! context being resolved, and the record that failed.

use std::fmt;

use serde::Serialize;

/// Failure kinds reported by the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidDuplicationFactor,
    InvalidDataType,
    InvalidSymbolKey,
    InvalidLengthKey,
    InvalidHexLiteral,
    NotANumber,
    EvaluationFailed,
}

impl ErrorKind {
    /// Stable short code for listings (e.g. `LAY-E003`).
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidDuplicationFactor => "LAY-E001",
            Self::InvalidDataType => "LAY-E002",
            Self::InvalidSymbolKey => "LAY-E003",
            Self::InvalidLengthKey => "LAY-E004",
            Self::InvalidHexLiteral => "LAY-E005",
            Self::NotANumber => "LAY-E006",
            Self::EvaluationFailed => "LAY-E007",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A failed record.
///
/// # Example
///
/// ```
/// use open_mainframe_layout::{Diagnostic, ErrorKind};
///
/// let d = Diagnostic::new(ErrorKind::InvalidSymbolKey, "PAYREC", "X EQU NOSUCH+1")
///     .with_message("undefined symbol: NOSUCH");
///
/// assert_eq!(d.kind, ErrorKind::InvalidSymbolKey);
/// assert_eq!(
///     d.to_string(),
///     "error[LAY-E003] InvalidSymbolKey in PAYREC: X EQU NOSUCH+1 (undefined symbol: NOSUCH)"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Context (macro) being resolved.
    pub context: String,
    /// The record as written: `[label] command operand`.
    pub raw_line: String,
    /// Human-readable detail.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, context: impl Into<String>, raw_line: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            raw_line: raw_line.into(),
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error[{}] {} in {}: {}",
            self.kind.code(),
            self.kind,
            self.context,
            self.raw_line
        )?;
        if !self.message.is_empty() {
            write!(f, " ({})", self.message)?;
        }
        Ok(())
    }
}
