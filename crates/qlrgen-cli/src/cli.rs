use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG: &str = "templates/template_config.toml";

/// qlrgen - QGIS layer definitions for Cloud-Optimized GeoTIFFs
#[derive(Parser, Debug)]
#[command(name = "qlrgen")]
#[command(about = "Generate QGIS layer definition files for COGs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a QLR file for a raster
    Build(BuildArgs),

    /// Show the metadata read from a raster's header
    Inspect(InspectArgs),

    /// Load a registry config and report its collections
    CheckConfig(CheckConfigArgs),
}

#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Raster URL (http/https) or local path
    #[arg(long)]
    pub url: String,

    /// Collection identifier, e.g. sentinel2_ard
    #[arg(long)]
    pub collection: String,

    /// Registry config file
    #[arg(long, env = "QLRGEN_TEMPLATE_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Output file or directory (stdout when omitted)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Timeout for reading the raster, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Raster URL (http/https) or local path
    #[arg(long)]
    pub url: String,

    /// Timeout for reading the raster, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct CheckConfigArgs {
    /// Registry config file
    #[arg(long, env = "QLRGEN_TEMPLATE_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from([
            "qlrgen",
            "build",
            "--url",
            "https://h/a.tif",
            "--collection",
            "sentinel2_ard",
            "-o",
            "out",
        ])
        .unwrap();

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.url, "https://h/a.tif");
                assert_eq!(args.collection, "sentinel2_ard");
                assert_eq!(args.output, Some(PathBuf::from("out")));
                assert_eq!(args.timeout, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_json_is_global() {
        let cli = Cli::try_parse_from(["qlrgen", "inspect", "--url", "a.tif", "--json"]).unwrap();
        assert!(cli.json);
    }

    #[test]
    fn test_build_requires_collection() {
        assert!(Cli::try_parse_from(["qlrgen", "build", "--url", "a.tif"]).is_err());
    }
}
