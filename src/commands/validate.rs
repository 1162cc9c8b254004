//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which stitches the
//! configuration and runs every structural check on the result.
//!
//! ## Functionality
//!
//! - **Stitching**: Parses all fragments, expands inclusions and detects
//!   duplicate product ids. Unparsable fragments are reported and skipped.
//! - **Reference Validation**: Verifies that every `<ref>` points to an
//!   existing product, docset, deliverable or link (can be disabled).
//! - **Structural Checks**: Runs the registered checks, such as unique DC
//!   files per language and valid language codes.
//!
//! This command is a safe, read-only operation that does not modify any files.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use console::style;

use crate::cli::GlobalOptions;
use crate::commands::{config_dir, stitch_dir};
use docbuild::output::{emoji, err_marker, ok_marker};
use docbuild::xml::checks::run_all_checks;
use docbuild::xml::stitch::StitchOptions;

/// Validate the XML configuration
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory with the XML fragments.
    ///
    /// Defaults to `paths.config_dir` of the environment configuration.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Do not check `<ref>` links.
    #[arg(long)]
    pub no_ref_check: bool,
}

/// Execute the `validate` command.
pub async fn execute(args: ValidateArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    let out = &globals.output;
    let dir = config_dir(args.config_dir, globals)?;
    println!(
        "{} Validating configuration in {}",
        emoji(out, "🔍", "[SCAN]"),
        dir.display()
    );

    let options = StitchOptions {
        check_references: !args.no_ref_check,
    };
    let tree = stitch_dir(&dir, options, out).await?;
    println!(
        "{} Stitched {} products",
        ok_marker(out),
        tree.products().len()
    );

    let results = run_all_checks(tree.root());
    let mut failures = 0;
    for result in &results {
        if result.success {
            println!("{} {}", ok_marker(out), result.name);
        } else {
            failures += 1;
            println!("{} {}", err_marker(out), style(result.name).bold());
            for message in &result.messages {
                println!("   {}", message);
            }
        }
    }

    if failures == 0 {
        println!("\n{} All {} checks passed", ok_marker(out), results.len());
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "\n{} {} of {} checks failed",
            err_marker(out),
            failures,
            results.len()
        );
        Ok(ExitCode::FAILURE)
    }
}
