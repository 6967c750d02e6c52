//! Resolve command: lay out every context of a layout file.

use std::path::PathBuf;

use miette::{Result, WrapErr};

use open_mainframe_layout::{LayoutConfig, LayoutFile, LayoutSession};

use crate::output::{print_json, OutputFormat, ResolveOutput};

/// Run the resolve command.
pub fn run(
    input: PathBuf,
    config: &LayoutConfig,
    format: OutputFormat,
    deny_diagnostics: bool,
) -> Result<()> {
    let file = LayoutFile::from_file(&input)
        .wrap_err_with(|| format!("Failed to load layout file: {}", input.display()))?;

    tracing::info!("Resolving {}", input.display());

    let mut session = LayoutSession::with_config(config);
    file.resolve_all(&mut session);

    let output = ResolveOutput::new(session.layouts(), session.diagnostics());
    if format.is_json() {
        print_json(&output);
    } else {
        print!("{}", output.render_text());
    }

    if deny_diagnostics && !session.diagnostics().is_empty() {
        return Err(miette::miette!(
            "Layout resolution reported {} diagnostic(s)",
            session.diagnostics().len()
        ));
    }
    Ok(())
}
