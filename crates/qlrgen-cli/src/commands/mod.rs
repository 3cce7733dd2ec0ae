//! Command implementations

mod build;
mod check_config;
mod inspect;

use std::time::Duration;

use crate::cli::{Cli, Commands};
use crate::output::OutputWriter;
use anyhow::{Context, Result};
use qlrgen_raster::{CogExtractor, ExtractorConfig};

/// Execute a CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let output = OutputWriter::new(cli.json);

    match cli.command {
        Commands::Build(args) => build::execute(args, &output).await,
        Commands::Inspect(args) => inspect::execute(args, &output).await,
        Commands::CheckConfig(args) => check_config::execute(args, &output),
    }
}

/// Extractor honouring an optional `--timeout` in seconds
fn extractor(timeout: Option<u64>) -> Result<CogExtractor> {
    let mut config = ExtractorConfig::default();
    if let Some(secs) = timeout {
        anyhow::ensure!(secs > 0, "--timeout must be at least 1 second");
        config = config.with_timeout(Duration::from_secs(secs));
    }
    CogExtractor::new(config).context("Failed to set up the raster reader")
}
