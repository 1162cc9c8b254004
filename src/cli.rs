//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use docbuild::output::OutputConfig;

/// Docbuild - Stitch documentation configuration and build deliverable metadata
#[derive(Parser, Debug)]
#[command(name = "docbuild")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment configuration file.
    ///
    /// If not provided, `env.production.toml` is searched in the current
    /// directory, the user configuration directory and `/etc/docbuild`.
    #[arg(long, global = true, value_name = "FILE", env = "DOCBUILD_ENV_CONFIG")]
    env_config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the metadata of all matching deliverables and write manifests
    Metadata(commands::metadata::MetadataArgs),

    /// Check that the files named by deliverables exist in their repositories
    Check(commands::check::CheckArgs),

    /// Manage the local repository mirrors
    Repo(commands::repo::RepoArgs),

    /// Stitch the configuration and run all structural checks
    Validate(commands::validate::ValidateArgs),

    /// Write the stitched configuration
    Stitch(commands::stitch::StitchArgs),
}

/// Settings every command receives from the global flags.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub env_config: Option<PathBuf>,
    pub output: OutputConfig,
}

/// Initialize `env_logger` from `--log-level`. `RUST_LOG` wins when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level.to_lowercase());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<ExitCode> {
        init_logging(&self.log_level);
        let globals = GlobalOptions {
            env_config: self.env_config,
            output: OutputConfig::from_env_and_flag(&self.color),
        };

        match self.command {
            Commands::Metadata(args) => commands::metadata::execute(args, &globals).await,
            Commands::Check(args) => commands::check::execute(args, &globals).await,
            Commands::Repo(args) => commands::repo::execute(args, &globals).await,
            Commands::Validate(args) => commands::validate::execute(args, &globals).await,
            Commands::Stitch(args) => commands::stitch::execute(args, &globals).await,
        }
    }
}
