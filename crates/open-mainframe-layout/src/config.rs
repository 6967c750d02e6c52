//! Layout engine configuration: label case folding and register aliases.
//!
//! ```toml
//! fold_case = true
//!
//! [registers]
//! BASE = 12
//! LINK = 14
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lookup::RegisterTable;

/// Configuration errors.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    #[diagnostic(code(layout::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    #[diagnostic(code(layout::config::parse))]
    Parse(#[from] toml::de::Error),
    #[error("register alias {name:?} must name a register 0-15, got {number}")]
    #[diagnostic(code(layout::config::register))]
    InvalidRegister { name: String, number: u8 },
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Upper-case labels and context names before storing or looking them up.
    pub fold_case: bool,
    /// Extra register aliases merged over the standard `R0`-`R15` table.
    pub registers: BTreeMap<String, u8>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            fold_case: true,
            registers: BTreeMap::new(),
        }
    }
}

impl LayoutConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, &number) in &self.registers {
            let valid_name = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
            if number > 15 || !valid_name {
                return Err(ConfigError::InvalidRegister {
                    name: name.clone(),
                    number,
                });
            }
        }
        Ok(())
    }

    /// The standard register table with this configuration's aliases applied.
    pub fn register_table(&self) -> RegisterTable {
        let mut table = RegisterTable::standard();
        for (name, &number) in &self.registers {
            table.insert(name, number);
        }
        table
    }
}
