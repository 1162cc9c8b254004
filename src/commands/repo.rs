//! # Repo Command Implementation
//!
//! This module implements the `repo` subcommand, which manages the permanent
//! bare mirrors below `paths.repo_dir`.
//!
//! - `repo clone [REPO...]` creates missing mirrors for the given
//!   repositories, or for every remote in the stitched configuration.
//! - `repo list` shows the mirrors that exist.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use console::style;

use crate::cli::GlobalOptions;
use crate::commands::{load_env, stitch_dir};
use docbuild::output::{emoji, err_marker, ok_marker, summary_line};
use docbuild::repo::Repo;
use docbuild::repository::RepositoryManager;
use docbuild::xml::stitch::StitchOptions;

/// Manage repository mirrors
#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommands,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommands {
    /// Create mirrors of repositories
    Clone(RepoCloneArgs),
    /// List existing mirrors
    List,
}

#[derive(Args, Debug)]
pub struct RepoCloneArgs {
    /// Repositories as URL, `org/repo` or abbreviation such as `gh://org/repo`.
    ///
    /// Defaults to every remote in the configuration.
    #[arg(value_name = "REPO")]
    pub repos: Vec<String>,
}

/// Execute the `repo` command.
pub async fn execute(args: RepoArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    match args.command {
        RepoCommands::Clone(clone) => execute_clone(clone, globals).await,
        RepoCommands::List => execute_list(globals),
    }
}

async fn execute_clone(args: RepoCloneArgs, globals: &GlobalOptions) -> Result<ExitCode> {
    let out = &globals.output;
    let env = load_env(globals)?;

    let values = if args.repos.is_empty() {
        let tree = stitch_dir(&env.paths.config_dir, StitchOptions::default(), out).await?;
        tree.remotes()
    } else {
        args.repos
    };
    let repos = values
        .iter()
        .map(|value| Repo::parse(value).with_context(|| format!("Invalid repository '{}'", value)))
        .collect::<Result<Vec<_>>>()?;

    println!(
        "{} Updating mirrors in {}",
        emoji(out, "🔄", "[SYNC]"),
        env.paths.repo_dir.display()
    );
    let manager = RepositoryManager::new(env.paths.repo_dir.clone());
    let outcome = manager.update_mirrors(repos.iter()).await;

    let mut failed = 0;
    for (repo, ok) in &outcome {
        if *ok {
            println!("{} {}", ok_marker(out), repo);
        } else {
            failed += 1;
            println!("{} {}", err_marker(out), repo);
        }
    }
    println!("{}", summary_line("Repositories", outcome.len() - failed, failed));

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn execute_list(globals: &GlobalOptions) -> Result<ExitCode> {
    let env = load_env(globals)?;
    let repo_dir = &env.paths.repo_dir;
    if !repo_dir.is_dir() {
        println!("No mirrors in {}", repo_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut mirrors: Vec<String> = std::fs::read_dir(repo_dir)
        .with_context(|| format!("Cannot read {}", repo_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();
    mirrors.sort();

    println!(
        "{} mirrors in {}",
        style(mirrors.len()).bold(),
        repo_dir.display()
    );
    for mirror in mirrors {
        println!("  {}", mirror);
    }
    Ok(ExitCode::SUCCESS)
}
