//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `docbuild`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the global options
//!   and returns the process exit code.
//!
//! The helpers below cover what several commands share: loading the
//! environment configuration, parsing doctypes and stitching.

pub mod check;
pub mod metadata;
pub mod repo;
pub mod stitch;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::cli::GlobalOptions;
use docbuild::config::{self, EnvConfig};
use docbuild::defaults::DEFAULT_DOCTYPE;
use docbuild::doctype::Doctype;
use docbuild::output::{emoji, OutputConfig};
use docbuild::pipeline::load_stitched;
use docbuild::xml::stitch::{StitchOptions, StitchedTree};

/// Locate, load and validate the environment configuration.
pub fn load_env(globals: &GlobalOptions) -> Result<EnvConfig> {
    let path = config::find_config_file(globals.env_config.as_deref())?;
    info!("Using environment configuration {}", path.display());
    config::from_file(&path)
        .with_context(|| format!("Failed to load environment configuration {}", path.display()))
}

/// Parse doctype arguments, falling back to the default doctype.
pub fn parse_doctypes(values: &[String]) -> Result<Vec<Doctype>> {
    if values.is_empty() {
        return Ok(vec![DEFAULT_DOCTYPE.parse::<Doctype>()?]);
    }
    values
        .iter()
        .map(|value| value.parse::<Doctype>().map_err(anyhow::Error::from))
        .collect()
}

/// The configuration directory to stitch: an explicit one, or the one from
/// the environment configuration.
pub fn config_dir(explicit: Option<PathBuf>, globals: &GlobalOptions) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir),
        None => Ok(load_env(globals)?.paths.config_dir),
    }
}

/// Stitch `dir` and report skipped fragments to the user.
pub async fn stitch_dir(
    dir: &Path,
    options: StitchOptions,
    out: &OutputConfig,
) -> Result<StitchedTree> {
    let report = load_stitched(dir, options)
        .await
        .with_context(|| format!("Failed to stitch configuration in {}", dir.display()))?;
    for (path, error) in &report.skipped {
        eprintln!(
            "{} Skipped {}: {}",
            emoji(out, "⚠️", "[WARN]"),
            path.display(),
            error
        );
    }
    Ok(report.tree)
}
