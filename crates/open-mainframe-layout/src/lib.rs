//! HLASM data-layout engine.
//!
//! Resolves the data-layout directives of assembler macros (`DS`, `DC`,
//! `EQU`, `ORG`, `DSECT`) into a symbol table: for every label, its byte
//! displacement from the start of its macro and its length attribute.
//!
//! This crate provides:
//!
//! - **Lexer** — operand tokenizer (registers, symbols, literals, `*`)
//! - **Expressions** — arithmetic over symbols, length attributes,
//!   self-defining terms and the location counter
//! - **Directives** — the DS/DC storage-operand decoder and type catalog
//! - **Builder** — two-pass, per-context symbol-table resolution with
//!   forward-reference retry and per-record diagnostics
//!
//! # Example
//!
//! ```
//! use open_mainframe_layout::{Directive, LayoutSession, NormalizedRecord};
//!
//! let mut session = LayoutSession::new();
//! let layout = session.resolve(
//!     "PAYREC",
//!     &[
//!         NormalizedRecord::labeled("FLAG", Directive::Ds, "C"),
//!         NormalizedRecord::labeled("AMOUNT", Directive::Ds, "F"),
//!     ],
//! );
//!
//! let amount = layout.lookup("AMOUNT").unwrap();
//! assert_eq!((amount.displacement, amount.length), (4, 4));
//! assert!(layout.diagnostics.is_empty());
//! ```

pub mod builder;
pub mod config;
pub mod diagnostic;
pub mod directives;
pub mod expr;
pub mod layout_file;
pub mod lexer;
pub mod lookup;
pub mod symbol;

pub use builder::{align_up, ContextLayout, DeferredEntry, LayoutSession, NormalizedRecord};
pub use config::{ConfigError, LayoutConfig};
pub use diagnostic::{Diagnostic, ErrorKind};
pub use directives::{decode_storage_operand, DataType, DecodeError, Directive, StorageOperand};
pub use expr::{evaluate, evaluate_operand, EvalError, Value};
pub use layout_file::{ContextSource, LayoutFile, LayoutFileError};
pub use lexer::{tokenize, tokenize_with, MalformedOperandError, Token};
pub use lookup::{
    DataTypeLookup, Lookups, MapSymbols, NoSymbols, RegisterLookup, RegisterTable,
    StandardDataTypes, SymbolLookup,
};
pub use symbol::{ScopedSymbols, SymbolEntry, SymbolTable};
