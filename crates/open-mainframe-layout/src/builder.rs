//! Symbol-table builder.
//!
//! A [`LayoutSession`] resolves contexts (macros) one at a time. Each context
//! gets a forward pass over its records with a location counter starting at
//! zero, then one retry pass over the `EQU` and `DS` records whose operands
//! referenced labels not yet defined. Retries use the location counter
//! captured when the record was first seen. Failures become diagnostics;
//! nothing aborts the context.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::LayoutConfig;
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::directives::{decode_storage_operand, DataType, DecodeError, Directive, StorageOperand};
use crate::expr::{evaluate, evaluate_operand, EvalError, Value};
use crate::lexer::{tokenize_with, MalformedOperandError, Token};
use crate::lookup::{DataTypeLookup, Lookups, RegisterTable, StandardDataTypes};
use crate::symbol::{SymbolEntry, SymbolTable};

// ---------------------------------------------------------------------------
//  Records
// ---------------------------------------------------------------------------

/// One logical source record, already continuation-merged and stripped of
/// comments and label suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub command: Directive,
    #[serde(default)]
    pub operand: String,
}

impl NormalizedRecord {
    pub fn new(label: Option<&str>, command: Directive, operand: &str) -> Self {
        Self {
            label: label.map(str::to_string),
            command,
            operand: operand.to_string(),
        }
    }

    /// Labeled record shorthand.
    pub fn labeled(label: &str, command: Directive, operand: &str) -> Self {
        Self::new(Some(label), command, operand)
    }
}

impl fmt::Display for NormalizedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{label} ")?;
        }
        write!(f, "{}", self.command)?;
        if !self.operand.is_empty() {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}

/// A record set aside in the forward pass because its operand referenced a
/// label not defined yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredEntry {
    pub record: NormalizedRecord,
    /// Location counter when the record was first seen (before alignment).
    pub location_counter: i64,
}

// ---------------------------------------------------------------------------
//  Results
// ---------------------------------------------------------------------------

/// The resolved layout of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextLayout {
    pub context: String,
    /// Labels defined by this context, in definition order.
    pub symbols: Vec<SymbolEntry>,
    pub diagnostics: Vec<Diagnostic>,
    /// Highest location counter value reached.
    pub size: i64,
    #[serde(skip)]
    fold_case: bool,
}

impl ContextLayout {
    /// Look up a label defined by this context.
    /// Labels match the way the session spelled them: upper-cased unless the
    /// session was configured with `fold_case = false`.
    pub fn lookup(&self, label: &str) -> Option<&SymbolEntry> {
        let label = if self.fold_case {
            label.trim().to_uppercase()
        } else {
            label.trim().to_string()
        };
        self.symbols.iter().find(|e| e.label == label)
    }
}

/// Round `value` up to a multiple of `size`. `None` if the result does not
/// fit in an `i64`.
pub fn align_up(value: i64, size: u32) -> Option<i64> {
    let size = i64::from(size);
    if size <= 1 {
        return Some(value);
    }
    let rem = value.rem_euclid(size);
    if rem == 0 {
        Some(value)
    } else {
        value.checked_add(size - rem)
    }
}

// ---------------------------------------------------------------------------
//  Session
// ---------------------------------------------------------------------------

/// Per-context pass state.
#[derive(Debug)]
struct ContextPass {
    context: String,
    location_counter: i64,
    high_water: i64,
    deferred_equ: Vec<DeferredEntry>,
    deferred_ds: Vec<DeferredEntry>,
    diagnostics: Vec<Diagnostic>,
}

impl ContextPass {
    fn new(context: String) -> Self {
        Self {
            context,
            location_counter: 0,
            high_water: 0,
            deferred_equ: Vec::new(),
            deferred_ds: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn move_to(&mut self, location_counter: i64) {
        trace!(
            context = %self.context,
            from = self.location_counter,
            to = location_counter,
            "location counter moved"
        );
        self.location_counter = location_counter;
        self.high_water = self.high_water.max(location_counter);
    }

    fn report(&mut self, kind: ErrorKind, record: &NormalizedRecord, message: String) {
        warn!(context = %self.context, kind = %kind, record = %record, "{message}");
        self.diagnostics
            .push(Diagnostic::new(kind, self.context.clone(), record.to_string()).with_message(message));
    }
}

/// One resolution session: owns the symbol table, the diagnostics of every
/// context resolved so far, and the per-context results.
#[derive(Debug)]
pub struct LayoutSession {
    registers: RegisterTable,
    data_types: StandardDataTypes,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    layouts: HashMap<String, ContextLayout>,
    order: Vec<String>,
}

impl Default for LayoutSession {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutSession {
    pub fn new() -> Self {
        Self::with_config(&LayoutConfig::default())
    }

    pub fn with_config(config: &LayoutConfig) -> Self {
        Self {
            registers: config.register_table(),
            data_types: StandardDataTypes,
            symbols: SymbolTable::with_fold_case(config.fold_case),
            diagnostics: Vec::new(),
            layouts: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Resolve one context. Resolving a context a second time returns the
    /// cached layout without looking at `records`.
    pub fn resolve(&mut self, context: &str, records: &[NormalizedRecord]) -> &ContextLayout {
        let key = self.symbols.normalize(context);
        if self.layouts.contains_key(&key) {
            debug!(context = %key, "context already resolved; returning cached layout");
        } else {
            let layout = self.run(&key, records);
            debug!(
                context = %key,
                symbols = layout.symbols.len(),
                diagnostics = layout.diagnostics.len(),
                size = layout.size,
                "context resolved"
            );
            self.diagnostics.extend(layout.diagnostics.iter().cloned());
            self.order.push(key.clone());
            self.layouts.insert(key.clone(), layout);
        }
        &self.layouts[&key]
    }

    /// The cached layout of a resolved context.
    pub fn layout(&self, context: &str) -> Option<&ContextLayout> {
        self.layouts.get(&self.symbols.normalize(context))
    }

    /// Resolved layouts in resolution order.
    pub fn layouts(&self) -> impl Iterator<Item = &ContextLayout> {
        self.order.iter().filter_map(|key| self.layouts.get(key))
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Diagnostics of every context resolved so far.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Evaluate an expression against the table as built so far, scoped to
    /// `context`, with `*` standing for `location_counter`.
    pub fn evaluate(
        &self,
        context: &str,
        expr: &str,
        location_counter: i64,
    ) -> Result<(Value, Option<DataType>), EvalError> {
        self.with_lookups(context, location_counter, |lookups| {
            evaluate_operand(expr, lookups)
        })
    }

    /// Tokenize an operand with this session's register table.
    pub fn tokenize(&self, operand: &str) -> Result<Vec<Token>, MalformedOperandError> {
        tokenize_with(operand, &self.registers)
    }

    /// Evaluate a token stream, resolving registers through this session's
    /// register table.
    pub fn evaluate_tokens(
        &self,
        context: &str,
        tokens: &[Token],
        location_counter: i64,
    ) -> Result<i64, EvalError> {
        self.with_lookups(context, location_counter, |lookups| evaluate(tokens, lookups))
    }

    fn with_lookups<R>(
        &self,
        context: &str,
        location_counter: i64,
        f: impl FnOnce(&Lookups<'_>) -> R,
    ) -> R {
        let scope = self.symbols.scoped(context);
        let lookups = Lookups::new(&scope, location_counter)
            .with_registers(&self.registers)
            .with_data_types(&self.data_types);
        f(&lookups)
    }

    fn decode(
        &self,
        context: &str,
        operand: &str,
        location_counter: i64,
    ) -> Result<StorageOperand, DecodeError> {
        self.with_lookups(context, location_counter, |lookups| {
            decode_storage_operand(operand, lookups)
        })
    }

    fn define(&mut self, context: &str, label: Option<&str>, displacement: i64, length: u32) {
        if let Some(label) = label {
            trace!(context, label, displacement, length, "label defined");
            self.symbols.define(context, label, displacement, length);
        }
    }

    // -----------------------------------------------------------------------
    //  Passes
    // -----------------------------------------------------------------------

    fn run(&mut self, context: &str, records: &[NormalizedRecord]) -> ContextLayout {
        let mut pass = ContextPass::new(context.to_string());

        for record in records {
            self.forward(&mut pass, record);
        }
        self.retry(&mut pass);

        ContextLayout {
            context: context.to_string(),
            symbols: self.symbols.entries_in(context).cloned().collect(),
            diagnostics: pass.diagnostics,
            size: pass.high_water,
            fold_case: self.symbols.fold_case(),
        }
    }

    fn forward(&mut self, pass: &mut ContextPass, record: &NormalizedRecord) {
        let context = pass.context.clone();
        let label = record.label.as_deref();
        let lc = pass.location_counter;

        match record.command {
            Directive::Ds | Directive::Dc => match self.decode(&context, &record.operand, lc) {
                Ok(op) => match self.place(&context, label, lc, &op) {
                    Ok(end) => pass.move_to(end),
                    Err(e) => pass.report(e.kind(), record, e.to_string()),
                },
                Err(e) if e.is_forward_reference() => {
                    debug!(context = %context, record = %record, "forward reference; deferring");
                    pass.deferred_ds.push(DeferredEntry {
                        record: record.clone(),
                        location_counter: lc,
                    });
                }
                Err(e) => pass.report(e.kind(), record, e.to_string()),
            },
            Directive::Equ => match self.evaluate(&context, &record.operand, lc) {
                Ok((value, _)) => self.assign_equ(pass, record, value),
                Err(e) if e.is_forward_reference() => {
                    debug!(context = %context, record = %record, "forward reference; deferring");
                    pass.deferred_equ.push(DeferredEntry {
                        record: record.clone(),
                        location_counter: lc,
                    });
                }
                Err(e) => pass.report(e.kind(), record, e.to_string()),
            },
            Directive::Org => {
                self.define(&context, label, lc, 1);
                if record.operand.trim().is_empty() {
                    let high_water = pass.high_water;
                    pass.move_to(high_water);
                    return;
                }
                match self.evaluate(&context, &record.operand, lc) {
                    Ok((Value::Int(target), _)) if target >= 0 => pass.move_to(target),
                    Ok((Value::Int(target), _)) => pass.report(
                        ErrorKind::EvaluationFailed,
                        record,
                        format!("ORG target is negative: {target}"),
                    ),
                    Ok((Value::Char(text), _)) => {
                        pass.report(ErrorKind::NotANumber, record, format!("not a number: {text:?}"))
                    }
                    Err(e) => pass.report(e.kind(), record, e.to_string()),
                }
            }
            Directive::Dsect => self.define(&context, label, 0, 0),
        }
    }

    fn retry(&mut self, pass: &mut ContextPass) {
        for deferred in std::mem::take(&mut pass.deferred_equ) {
            let record = &deferred.record;
            match self.evaluate(&pass.context, &record.operand, deferred.location_counter) {
                Ok((value, _)) => self.assign_equ(pass, record, value),
                Err(e) => pass.report(e.kind(), record, e.to_string()),
            }
        }

        for deferred in std::mem::take(&mut pass.deferred_ds) {
            let record = &deferred.record;
            let context = pass.context.clone();
            match self.decode(&context, &record.operand, deferred.location_counter) {
                Ok(op) => {
                    let placed =
                        self.place(&context, record.label.as_deref(), deferred.location_counter, &op);
                    if let Err(e) = placed {
                        pass.report(e.kind(), record, e.to_string());
                    }
                }
                Err(e) => pass.report(e.kind(), record, e.to_string()),
            }
        }
    }

    /// Align for `op` and define its label. Returns the counter just past the
    /// reserved storage. Nothing is defined when the counter would overflow.
    fn place(
        &mut self,
        context: &str,
        label: Option<&str>,
        location_counter: i64,
        op: &StorageOperand,
    ) -> Result<i64, EvalError> {
        let size = self.data_types.byte_size(op.data_type);
        let aligned = align_up(location_counter, size).ok_or_else(|| {
            EvalError::EvaluationFailed(format!(
                "location counter overflow aligning {location_counter} to {size}"
            ))
        })?;
        let end = op
            .total_length()
            .and_then(|len| aligned.checked_add(len))
            .ok_or_else(|| {
                EvalError::EvaluationFailed(format!(
                    "{} x {} bytes at {aligned} overflows the location counter",
                    op.duplication, op.length
                ))
            })?;
        self.define(context, label, aligned, op.length);
        Ok(end)
    }

    fn assign_equ(&mut self, pass: &mut ContextPass, record: &NormalizedRecord, value: Value) {
        match value {
            Value::Int(n) => self.define(&pass.context, record.label.as_deref(), n, 1),
            Value::Char(text) => {
                pass.report(ErrorKind::NotANumber, record, format!("not a number: {text:?}"))
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
