//! # Stitch Command Implementation
//!
//! This module implements the `stitch` subcommand, which writes the merged
//! configuration as pretty-printed XML, to a file or to stdout.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::GlobalOptions;
use crate::commands::{config_dir, stitch_dir};
use docbuild::output::ok_marker;
use docbuild::xml::stitch::StitchOptions;

/// Stitch the XML configuration into one file
#[derive(Args, Debug)]
pub struct StitchArgs {
    /// Directory with the XML fragments.
    ///
    /// Defaults to `paths.config_dir` of the environment configuration.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Write to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Do not check `<ref>` links.
    #[arg(long)]
    pub no_ref_check: bool,
}

/// Execute the `stitch` command.
pub async fn execute(args: StitchArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    let dir = config_dir(args.config_dir, globals)?;
    let options = StitchOptions {
        check_references: !args.no_ref_check,
    };
    let tree = stitch_dir(&dir, options, &globals.output).await?;
    let xml = tree.to_pretty_string();

    match args.output {
        Some(path) => {
            std::fs::write(&path, &xml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} Wrote stitched configuration to {}",
                ok_marker(&globals.output),
                path.display()
            );
        }
        None => print!("{}", xml),
    }
    Ok(ExitCode::SUCCESS)
}
