//! # Check Command Implementation
//!
//! This module implements the `check` subcommand. Currently it offers one
//! check, `check files`, which verifies that the DC file of every resolved
//! deliverable exists on its branch, without checking anything out.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use crate::cli::GlobalOptions;
use crate::commands::{load_env, parse_doctypes, stitch_dir};
use docbuild::availability::check_files;
use docbuild::doctype::Doctype;
use docbuild::output::{emoji, err_marker, ok_marker};
use docbuild::repository::RepositoryManager;
use docbuild::resolve::resolve_all;
use docbuild::xml::stitch::StitchOptions;

/// Check the configuration against the repositories
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(subcommand)]
    pub command: CheckCommands,
}

#[derive(Subcommand, Debug)]
pub enum CheckCommands {
    /// Report DC files that are missing from their repository branch
    Files(CheckFilesArgs),
}

#[derive(Args, Debug)]
pub struct CheckFilesArgs {
    /// Doctypes to check. Defaults to all products, docsets and languages.
    #[arg(value_name = "DOCTYPE")]
    pub doctypes: Vec<String>,
}

/// Execute the `check` command.
pub async fn execute(args: CheckArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    match args.command {
        CheckCommands::Files(files) => execute_files(files, globals).await,
    }
}

async fn execute_files(args: CheckFilesArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    let out = &globals.output;
    let env = load_env(globals)?;
    let doctypes = if args.doctypes.is_empty() {
        vec!["*/*/*".parse::<Doctype>()?]
    } else {
        parse_doctypes(&args.doctypes)?
    };

    let tree = stitch_dir(&env.paths.config_dir, StitchOptions::default(), out).await?;
    let deliverables = resolve_all(&tree, &doctypes);
    println!(
        "{} Checking {} deliverables",
        emoji(out, "🔍", "[SCAN]"),
        deliverables.len()
    );

    let repos = RepositoryManager::new(env.paths.repo_dir.clone());
    let report = check_files(&repos, &deliverables).await;

    if report.is_empty() {
        println!("{} All files are present", ok_marker(out));
        return Ok(ExitCode::SUCCESS);
    }

    for ((repo, branch), files) in &report.missing {
        println!(
            "{} {} ({})",
            err_marker(out),
            style(repo).bold(),
            style(branch).cyan()
        );
        for file in files {
            println!("   {}", file);
        }
    }
    println!("{} missing files", style(report.len()).red().bold());
    Ok(ExitCode::FAILURE)
}
