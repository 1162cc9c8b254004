//! # Metadata Command Implementation
//!
//! This module implements the `metadata` subcommand, which runs the whole
//! pipeline: stitch the configuration, resolve the requested doctypes, build
//! the metadata of every deliverable and aggregate the manifests.
//!
//! The exit code is `0` when every deliverable succeeded and `1` otherwise.
//! Manifests are written in both cases.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;

use crate::cli::GlobalOptions;
use crate::commands::{load_env, parse_doctypes};
use docbuild::coordinator::BatchOptions;
use docbuild::output::{emoji, err_marker, ok_marker, summary_line};
use docbuild::pipeline::{run_metadata, MetadataOptions};
use docbuild::repository::RepositoryManager;
use docbuild::xml::stitch::StitchOptions;

/// Build deliverable metadata and write manifests
#[derive(Args, Debug)]
pub struct MetadataArgs {
    /// Doctypes to build, e.g. `sles/15-SP6@supported/en-us,de-de`.
    ///
    /// Defaults to `*/*/en-us`.
    #[arg(value_name = "DOCTYPE")]
    pub doctypes: Vec<String>,

    /// Stop at the first failed deliverable and cancel the others.
    #[arg(short = 'x', long)]
    pub exitfirst: bool,

    /// Do not clone missing repository mirrors.
    #[arg(long)]
    pub skip_repo_update: bool,

    /// Number of deliverables built at the same time.
    ///
    /// Defaults to `build.max_workers` of the environment configuration.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Do not fail on `<ref>` links to missing targets.
    #[arg(long)]
    pub no_ref_check: bool,
}

/// Execute the `metadata` command.
pub async fn execute(args: MetadataArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    let out = &globals.output;
    let env = load_env(globals)?;
    let doctypes = parse_doctypes(&args.doctypes)?;

    println!(
        "{} Building metadata for {}",
        emoji(out, "📦", "[BUILD]"),
        doctypes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let repos = Arc::new(RepositoryManager::new(env.paths.repo_dir.clone()));
    let options = MetadataOptions {
        doctypes,
        batch: BatchOptions {
            fail_fast: args.exitfirst,
            max_jobs: args.jobs.unwrap_or(env.build.max_workers),
            skip_repo_update: args.skip_repo_update,
        },
        stitch: StitchOptions {
            check_references: !args.no_ref_check,
        },
    };

    let report = run_metadata(&env, repos, options).await?;

    for path in &report.skipped_fragments {
        println!(
            "{} Skipped unparsable fragment {}",
            emoji(out, "⚠️", "[WARN]"),
            path.display()
        );
    }

    let failed = report.failed.len();
    println!(
        "{}",
        summary_line("Deliverables", report.total.saturating_sub(failed), failed)
    );
    if failed > 0 {
        if args.exitfirst {
            println!("   Stopped after the first failure; remaining deliverables were cancelled");
        }
        for deliverable in &report.failed {
            println!("   {} {}", err_marker(out), deliverable.full_id());
        }
    }

    for manifest in &report.manifests {
        println!("{} Wrote {}", ok_marker(out), style(manifest.display()).cyan());
    }
    if let Some(message) = &report.aggregation_error {
        println!("{} Manifests not written: {}", err_marker(out), message);
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}
