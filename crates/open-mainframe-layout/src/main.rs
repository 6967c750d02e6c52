//! open-mainframe-layout CLI: resolve HLASM data layouts.
//!
//! Reads JSON layout files of normalized DS/DC/EQU/ORG/DSECT records and
//! prints each context's symbol table, evaluates operand expressions, and
//! shows how operands tokenize.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

mod commands;
mod output;

use output::OutputFormat;

/// HLASM data-layout engine.
#[derive(Parser)]
#[command(
    name = "open-mainframe-layout",
    version,
    about = "OpenMainframe — HLASM data-layout resolver"
)]
struct Cli {
    /// Enable debug logging on stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every context in a layout file and print the symbol tables.
    Resolve {
        /// Layout file (JSON).
        layout: PathBuf,

        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Exit with an error if any record produced a diagnostic.
        #[arg(long)]
        deny_diagnostics: bool,
    },

    /// Evaluate an operand expression.
    Eval {
        /// Expression, e.g. `FIELD+L'FIELD` or `X'1F'`.
        expr: String,

        /// Layout file whose symbols the expression may reference.
        #[arg(short, long)]
        layout: Option<PathBuf>,

        /// Context to evaluate in. Contexts up to this one are resolved first.
        #[arg(long, default_value = "")]
        context: String,

        /// Value of the location counter `*`.
        #[arg(long = "location", default_value_t = 0, allow_negative_numbers = true)]
        location: i64,

        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show the tokens of an operand.
    Tokens {
        /// Operand text.
        operand: String,

        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Resolve {
            layout,
            format,
            deny_diagnostics,
        } => commands::resolve::run(
            layout,
            &config,
            OutputFormat::from_str(&format),
            deny_diagnostics,
        ),
        Commands::Eval {
            expr,
            layout,
            context,
            location,
            format,
        } => commands::eval::run(
            &expr,
            layout,
            &context,
            location,
            &config,
            OutputFormat::from_str(&format),
        ),
        Commands::Tokens { operand, format } => {
            commands::tokens::run(&operand, &config, OutputFormat::from_str(&format))
        }
    }
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins; otherwise
/// `--verbose` selects `debug` and the default is `warn`.
fn init_tracing(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::from_default_env()
    } else if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
