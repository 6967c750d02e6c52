//! Structured output types for the CLI.
//!
//! With `--format json` commands print these types as JSON; otherwise they
//! are rendered as fixed-width text listings.

use std::fmt::Write as _;

use serde::Serialize;

use open_mainframe_layout::{ContextLayout, DataType, Diagnostic, Token, Value};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }

    pub fn is_json(self) -> bool {
        self == OutputFormat::Json
    }
}

/// One symbol of a resolved context.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolOutput {
    pub label: String,
    pub displacement: i64,
    pub length: u32,
}

/// One resolved context.
#[derive(Debug, Clone, Serialize)]
pub struct ContextOutput {
    pub name: String,
    pub size: i64,
    pub symbols: Vec<SymbolOutput>,
}

impl From<&ContextLayout> for ContextOutput {
    fn from(layout: &ContextLayout) -> Self {
        Self {
            name: layout.context.clone(),
            size: layout.size,
            symbols: layout
                .symbols
                .iter()
                .map(|e| SymbolOutput {
                    label: e.label.clone(),
                    displacement: e.displacement,
                    length: e.length,
                })
                .collect(),
        }
    }
}

/// Counts for the resolve summary line.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveSummary {
    pub contexts: usize,
    pub symbols: usize,
    pub errors: usize,
}

/// Output from the resolve command.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveOutput {
    pub status: String,
    pub contexts: Vec<ContextOutput>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: ResolveSummary,
}

impl ResolveOutput {
    pub fn new<'a>(
        layouts: impl IntoIterator<Item = &'a ContextLayout>,
        diagnostics: &[Diagnostic],
    ) -> Self {
        let contexts: Vec<ContextOutput> = layouts.into_iter().map(ContextOutput::from).collect();
        let summary = ResolveSummary {
            contexts: contexts.len(),
            symbols: contexts.iter().map(|c| c.symbols.len()).sum(),
            errors: diagnostics.len(),
        };
        Self {
            status: if diagnostics.is_empty() { "ok" } else { "error" }.to_string(),
            contexts,
            diagnostics: diagnostics.to_vec(),
            summary,
        }
    }

    /// Text listing: one block per context, then diagnostics and a summary.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for context in &self.contexts {
            let _ = writeln!(out, "{} (size {})", context.name, context.size);
            let _ = writeln!(out, "  {:<16} {:>8} {:>8}", "LABEL", "DISP", "LENGTH");
            for symbol in &context.symbols {
                let _ = writeln!(
                    out,
                    "  {:<16} {:>8} {:>8}",
                    symbol.label, symbol.displacement, symbol.length
                );
            }
            out.push('\n');
        }
        for diagnostic in &self.diagnostics {
            let _ = writeln!(out, "{diagnostic}");
        }
        let _ = writeln!(
            out,
            "{} context(s), {} symbol(s), {} error(s)",
            self.summary.contexts, self.summary.symbols, self.summary.errors
        );
        out
    }
}

/// Output from the eval command.
#[derive(Debug, Clone, Serialize)]
pub struct EvalOutput {
    pub expression: String,
    pub context: String,
    pub location_counter: i64,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
}

impl EvalOutput {
    pub fn render_text(&self) -> String {
        match self.data_type {
            Some(dt) => format!("{} (type {dt})", self.value),
            None => self.value.to_string(),
        }
    }
}

/// A token for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct TokenOutput {
    pub kind: String,
    pub text: String,
}

impl From<&Token> for TokenOutput {
    fn from(token: &Token) -> Self {
        let kind = match token {
            Token::Decimal(_) => "decimal",
            Token::Register { .. } => "register",
            Token::Symbol(_) => "symbol",
            Token::DataLiteral { .. } => "literal",
            Token::LocationCounter => "location_counter",
            Token::Operator(_) => "operator",
            Token::LParen | Token::RParen => "paren",
            Token::Comma => "comma",
        };
        Self {
            kind: kind.to_string(),
            text: token.to_string(),
        }
    }
}

/// Output from the tokens command.
#[derive(Debug, Clone, Serialize)]
pub struct TokensOutput {
    pub operand: String,
    pub tokens: Vec<TokenOutput>,
}

impl TokensOutput {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            let _ = writeln!(out, "{:<17} {}", token.kind, token.text);
        }
        out
    }
}

/// Print a serializable value as JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize JSON: {}", e),
    }
}
