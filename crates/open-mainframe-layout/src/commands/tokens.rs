//! Tokens command: show how an operand tokenizes.

use miette::Result;

use open_mainframe_layout::{LayoutConfig, LayoutSession};

use crate::output::{print_json, OutputFormat, TokenOutput, TokensOutput};

/// Run the tokens command.
pub fn run(operand: &str, config: &LayoutConfig, format: OutputFormat) -> Result<()> {
    let session = LayoutSession::with_config(config);
    let tokens = session.tokenize(operand)?;

    let output = TokensOutput {
        operand: operand.to_string(),
        tokens: tokens.iter().map(TokenOutput::from).collect(),
    };

    if format.is_json() {
        print_json(&output);
    } else {
        print!("{}", output.render_text());
    }
    Ok(())
}
