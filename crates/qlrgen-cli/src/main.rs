//! qlrgen CLI - Command-line interface
//!
//! Builds QLR files, inspects COG metadata and checks registry configs.

mod cli;
mod commands;
mod output;
mod output_types;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use output::OutputWriter;

fn main() -> Result<()> {
    // Logs go to stderr; stdout may carry the QLR document itself.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let json = cli.json;
    let runtime = tokio::runtime::Runtime::new()?;

    if let Err(e) = runtime.block_on(async { commands::execute(cli).await }) {
        OutputWriter::new(json).error(format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
