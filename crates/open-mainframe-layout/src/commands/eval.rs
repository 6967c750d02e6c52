//! Eval command: evaluate one operand expression.

use std::path::PathBuf;

use miette::{Result, WrapErr};

use open_mainframe_layout::{LayoutConfig, LayoutFile, LayoutSession};

use crate::output::{print_json, EvalOutput, OutputFormat};

/// Run the eval command.
pub fn run(
    expr: &str,
    layout: Option<PathBuf>,
    context: &str,
    location: i64,
    config: &LayoutConfig,
    format: OutputFormat,
) -> Result<()> {
    let mut session = LayoutSession::with_config(config);

    if let Some(path) = layout {
        let file = LayoutFile::from_file(&path)
            .wrap_err_with(|| format!("Failed to load layout file: {}", path.display()))?;
        if context.trim().is_empty() {
            file.resolve_all(&mut session);
        } else if !file.resolve_through(context, &mut session) {
            return Err(miette::miette!(
                "Context {context} not found in {}",
                path.display()
            ));
        }
    }

    let (value, data_type) = session.evaluate(context, expr, location)?;
    let output = EvalOutput {
        expression: expr.to_string(),
        context: context.to_string(),
        location_counter: location,
        value,
        data_type,
    };

    if format.is_json() {
        print_json(&output);
    } else {
        println!("{}", output.render_text());
    }
    Ok(())
}
