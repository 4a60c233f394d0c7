//! Offline planning commands
//!
//! Shows what the batch and upload engines would send without touching the
//! network.

pub mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::api::OrchestrationConfig;
use commands::batch::BatchCommands;
use commands::upload::UploadCommands;

#[derive(Parser, Debug)]
#[command(name = "dynamics-orchestration")]
#[command(about = "Plan JSON batches and chunked uploads for OData-style Web APIs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Orchestration config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Partition a JSON array of requests into batch payloads
    PlanBatch(BatchCommands),
    /// Show the slices a large-file upload would send
    PlanUpload(UploadCommands),
}

/// Config from `path`, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<OrchestrationConfig> {
    match path {
        Some(path) => OrchestrationConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => Ok(OrchestrationConfig::default()),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    log::debug!("Using config: {:?}", config);

    match cli.command {
        Commands::PlanBatch(args) => commands::batch::handler::handle_plan_batch_command(args, &config),
        Commands::PlanUpload(args) => {
            commands::upload::handler::handle_plan_upload_command(args, &config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_batch() {
        let cli = Cli::try_parse_from([
            "dynamics-orchestration",
            "plan-batch",
            "requests.json",
            "--max-steps",
            "5",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::PlanBatch(args) => {
                assert_eq!(args.file, PathBuf::from("requests.json"));
                assert_eq!(args.max_steps, Some(5));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_plan_upload_with_global_config() {
        let cli = Cli::try_parse_from([
            "dynamics-orchestration",
            "plan-upload",
            "--length",
            "1000",
            "--ranges",
            "0-99",
            "500-",
            "--config",
            "orchestration.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("orchestration.toml")));
        match cli.command {
            Commands::PlanUpload(args) => {
                assert_eq!(args.length, 1000);
                assert_eq!(args.ranges, vec!["0-99", "500-"]);
                assert_eq!(args.slice_size, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, OrchestrationConfig::default());
        assert!(load_config(Some(Path::new("/nonexistent/orchestration.toml"))).is_err());
    }
}
