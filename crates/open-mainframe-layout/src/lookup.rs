//! Lookup providers consulted during evaluation.
//!
//! The evaluator never owns a symbol table. It reads through a [`Lookups`]
//! capability set: a symbol provider (displacement and length by name), an
//! optional register provider, and a data-type provider.

use std::collections::HashMap;

use crate::directives::DataType;

/// Resolves symbol names to their displacement and length attribute.
pub trait SymbolLookup {
    /// Displacement (or EQU value) of `name`.
    fn displacement(&self, name: &str) -> Option<i64>;
    /// Length attribute of `name`.
    fn length(&self, name: &str) -> Option<i64>;
}

/// Resolves register names (`R0`..`R15` and aliases) to register numbers.
pub trait RegisterLookup {
    fn register(&self, name: &str) -> Option<u8>;
}

/// Recognizes storage type codes and reports their byte sizes.
pub trait DataTypeLookup {
    fn data_type(&self, code: &str) -> Option<DataType> {
        DataType::from_code(code)
    }

    fn byte_size(&self, data_type: DataType) -> u32 {
        data_type.byte_size()
    }
}

/// The fixed type-code catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDataTypes;

impl DataTypeLookup for StandardDataTypes {}

static STANDARD_DATA_TYPES: StandardDataTypes = StandardDataTypes;

/// A symbol provider with no symbols.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolLookup for NoSymbols {
    fn displacement(&self, _name: &str) -> Option<i64> {
        None
    }

    fn length(&self, _name: &str) -> Option<i64> {
        None
    }
}

/// A free-standing name → (displacement, length) map, for evaluating
/// expressions outside a layout session.
#[derive(Debug, Clone, Default)]
pub struct MapSymbols {
    entries: HashMap<String, (i64, i64)>,
}

impl MapSymbols {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, displacement: i64, length: i64) -> Self {
        self.insert(name, displacement, length);
        self
    }

    pub fn insert(&mut self, name: &str, displacement: i64, length: i64) {
        self.entries
            .insert(name.to_uppercase(), (displacement, length));
    }
}

impl SymbolLookup for MapSymbols {
    fn displacement(&self, name: &str) -> Option<i64> {
        self.entries.get(&name.to_uppercase()).map(|e| e.0)
    }

    fn length(&self, name: &str) -> Option<i64> {
        self.entries.get(&name.to_uppercase()).map(|e| e.1)
    }
}

// ---------------------------------------------------------------------------
//  Register table
// ---------------------------------------------------------------------------

/// Register name table: `R0`-`R15`, zero-padded `R00`-`R09`, and aliases.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    names: HashMap<String, u8>,
}

impl Default for RegisterTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RegisterTable {
    /// The fixed table every session starts from.
    pub fn standard() -> Self {
        let mut names = HashMap::new();
        for n in 0u8..=15 {
            names.insert(format!("R{n}"), n);
            names.insert(format!("R{n:02}"), n);
        }
        names.insert("RAC".to_string(), 0);
        Self { names }
    }

    /// Add or replace an alias.
    pub fn insert(&mut self, name: &str, number: u8) {
        self.names.insert(name.to_uppercase(), number);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl RegisterLookup for RegisterTable {
    fn register(&self, name: &str) -> Option<u8> {
        self.names.get(&name.to_uppercase()).copied()
    }
}

// ---------------------------------------------------------------------------
//  Capability set
// ---------------------------------------------------------------------------

/// Everything an evaluation may consult, plus the location counter value
/// that `*` stands for.
#[derive(Clone, Copy)]
pub struct Lookups<'a> {
    pub location_counter: i64,
    pub symbols: &'a dyn SymbolLookup,
    pub registers: Option<&'a dyn RegisterLookup>,
    pub data_types: &'a dyn DataTypeLookup,
}

impl<'a> Lookups<'a> {
    /// Symbols only, with the standard type catalog and no register provider.
    pub fn new(symbols: &'a dyn SymbolLookup, location_counter: i64) -> Self {
        Self {
            location_counter,
            symbols,
            registers: None,
            data_types: &STANDARD_DATA_TYPES,
        }
    }

    pub fn with_registers(mut self, registers: &'a dyn RegisterLookup) -> Self {
        self.registers = Some(registers);
        self
    }

    pub fn with_data_types(mut self, data_types: &'a dyn DataTypeLookup) -> Self {
        self.data_types = data_types;
        self
    }
}
