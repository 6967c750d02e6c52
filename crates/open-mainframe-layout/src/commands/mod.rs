//! CLI command implementations.

pub mod eval;
pub mod resolve;
pub mod tokens;

use std::path::Path;

use miette::{Result, WrapErr};

use open_mainframe_layout::LayoutConfig;

/// Load the engine configuration, or the defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> Result<LayoutConfig> {
    match path {
        Some(path) => {
            tracing::debug!("Loading config from {}", path.display());
            LayoutConfig::from_file(path)
                .wrap_err_with(|| format!("Failed to load config: {}", path.display()))
        }
        None => Ok(LayoutConfig::default()),
    }
}
