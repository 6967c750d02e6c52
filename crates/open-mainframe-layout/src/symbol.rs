//! Layout symbol table.
//!
//! - Entries keyed by `(context, label)`; a later definition of the same key
//!   overwrites the earlier one in place
//! - Unqualified lookups stay inside one context; `CTX.LABEL` reaches into
//!   another context explicitly
//! - Insertion order is preserved for listings

use std::collections::HashMap;

use serde::Serialize;

use crate::lookup::SymbolLookup;

// ---------------------------------------------------------------------------
//  Entries
// ---------------------------------------------------------------------------

/// A resolved label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolEntry {
    /// Label name.
    pub label: String,
    /// Byte offset from the start of the owning context (or the EQU value).
    pub displacement: i64,
    /// Length attribute in bytes.
    pub length: u32,
    /// Context (macro) that defined the label.
    pub context: String,
}

// ---------------------------------------------------------------------------
//  Symbol table
// ---------------------------------------------------------------------------

/// Symbols of every context resolved by one session.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    index: HashMap<(String, String), usize>,
    fold_case: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A case-folding table.
    pub fn new() -> Self {
        Self::with_fold_case(true)
    }

    pub fn with_fold_case(fold_case: bool) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            fold_case,
        }
    }

    /// Whether labels and context names fold to upper case.
    pub fn fold_case(&self) -> bool {
        self.fold_case
    }

    /// Canonical spelling of a label or context name.
    pub fn normalize(&self, name: &str) -> String {
        if self.fold_case {
            name.trim().to_uppercase()
        } else {
            name.trim().to_string()
        }
    }

    /// Define (or redefine) `label` in `context`.
    pub fn define(&mut self, context: &str, label: &str, displacement: i64, length: u32) {
        let entry = SymbolEntry {
            label: self.normalize(label),
            displacement,
            length,
            context: self.normalize(context),
        };
        let key = (entry.context.clone(), entry.label.clone());
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot] = entry,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Look up `label` in `context`.
    pub fn lookup(&self, context: &str, label: &str) -> Option<&SymbolEntry> {
        let key = (self.normalize(context), self.normalize(label));
        self.index.get(&key).map(|&slot| &self.entries[slot])
    }

    /// Entries of one context, in definition order.
    pub fn entries_in<'a>(&'a self, context: &str) -> impl Iterator<Item = &'a SymbolEntry> + 'a {
        let context = self.normalize(context);
        self.entries.iter().filter(move |e| e.context == context)
    }

    /// Every entry, in definition order.
    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// A lookup provider rooted at `context`.
    pub fn scoped<'a>(&'a self, context: &str) -> ScopedSymbols<'a> {
        ScopedSymbols {
            table: self,
            context: self.normalize(context),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A [`SymbolLookup`] view of the table from inside one context.
///
/// `FIELD` resolves in the scope context; `OTHER.FIELD` resolves in `OTHER`.
#[derive(Debug, Clone)]
pub struct ScopedSymbols<'a> {
    table: &'a SymbolTable,
    context: String,
}

impl ScopedSymbols<'_> {
    fn resolve(&self, name: &str) -> Option<&SymbolEntry> {
        match name.split_once('.') {
            Some((context, label)) if !context.is_empty() && !label.is_empty() => {
                self.table.lookup(context, label)
            }
            _ => self.table.lookup(&self.context, name),
        }
    }
}

impl SymbolLookup for ScopedSymbols<'_> {
    fn displacement(&self, name: &str) -> Option<i64> {
        self.resolve(name).map(|e| e.displacement)
    }

    fn length(&self, name: &str) -> Option<i64> {
        self.resolve(name).map(|e| i64::from(e.length))
    }
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------
