//! # Repository Mirrors and Worktrees
//!
//! This module provides the `RepositoryManager`, which owns the directory of
//! permanent bare mirrors and hands out ephemeral checkouts from them.
//!
//! ## Design
//!
//! All git access goes through the **`GitOperations`** trait. The default
//! implementation, `DefaultGitOperations`, runs the system `git` binary via
//! [`crate::git`]; tests substitute a mock that records calls and creates
//! directories instead of cloning.
//!
//! A mirror lives at `<repo_dir>/<slug>`, where the slug is derived from the
//! canonical repository URL. Because the path is a pure function of the URL,
//! mirrors are reused across runs, and de-duplicating repositories by URL
//! before cloning is enough to guarantee a single clone attempt per URL.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info};

use crate::error::{Error, Result};
use crate::repo::Repo;

/// Trait for git operations - allows mocking in tests
#[async_trait]
pub trait GitOperations: Send + Sync {
    /// Creates a bare mirror of `url` at `target`.
    async fn clone_bare(&self, url: &str, target: &Path) -> Result<()>;

    /// Checks out `branch` of the mirror at `mirror` into `target`.
    async fn clone_worktree(&self, mirror: &Path, branch: &str, target: &Path) -> Result<()>;

    /// Lists the file paths at the tip of `branch` without checking it out.
    async fn list_tree(&self, mirror: &Path, branch: &str) -> Result<Vec<String>>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
pub struct DefaultGitOperations;

#[async_trait]
impl GitOperations for DefaultGitOperations {
    async fn clone_bare(&self, url: &str, target: &Path) -> Result<()> {
        crate::git::clone_bare(url, target).await
    }

    async fn clone_worktree(&self, mirror: &Path, branch: &str, target: &Path) -> Result<()> {
        crate::git::clone_branch(mirror, branch, target).await
    }

    async fn list_tree(&self, mirror: &Path, branch: &str) -> Result<Vec<String>> {
        crate::git::ls_tree(mirror, branch).await
    }
}

/// A remote repository paired with the location of its local mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedRepository {
    pub repo: Repo,
    pub mirror_path: PathBuf,
}

impl ManagedRepository {
    pub fn new(repo: Repo, repo_root: &Path) -> Self {
        let mirror_path = repo_root.join(repo.slug());
        Self { repo, mirror_path }
    }

    pub fn mirror_exists(&self) -> bool {
        self.mirror_path.is_dir()
    }

    fn require_mirror(&self) -> Result<()> {
        if self.mirror_exists() {
            Ok(())
        } else {
            Err(Error::MirrorMissing {
                url: self.repo.url().to_string(),
                path: self.mirror_path.clone(),
            })
        }
    }
}

/// Entry point for mirror and worktree handling.
pub struct RepositoryManager {
    git_ops: Arc<dyn GitOperations>,
    repo_root: PathBuf,
}

impl RepositoryManager {
    /// Creates a `RepositoryManager` using the system `git`, keeping mirrors
    /// below `repo_root`.
    pub fn new(repo_root: PathBuf) -> Self {
        Self::with_operations(Arc::new(DefaultGitOperations), repo_root)
    }

    /// Creates a `RepositoryManager` with a custom `GitOperations`
    /// implementation.
    pub fn with_operations(git_ops: Arc<dyn GitOperations>, repo_root: PathBuf) -> Self {
        Self { git_ops, repo_root }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn managed(&self, repo: &Repo) -> ManagedRepository {
        ManagedRepository::new(repo.clone(), &self.repo_root)
    }

    /// Makes sure a mirror of `repo` exists locally.
    ///
    /// An existing mirror is accepted as is, without network access. Clone
    /// failures are logged and reported as `false` so callers can carry on
    /// with other repositories.
    pub async fn ensure_mirror(&self, repo: &Repo) -> bool {
        let managed = self.managed(repo);
        if managed.mirror_exists() {
            info!(
                "Repository already exists at {}",
                managed.mirror_path.display()
            );
            return true;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.repo_root).await {
            error!(
                "Cannot create repository directory {}: {}",
                self.repo_root.display(),
                e
            );
            return false;
        }

        match self
            .git_ops
            .clone_bare(repo.url(), &managed.mirror_path)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to clone '{}': {}", repo.url(), e);
                false
            }
        }
    }

    /// Ensures mirrors for all given repositories, one clone attempt per
    /// distinct repository, and returns the outcome for each.
    pub async fn update_mirrors<'a>(
        &self,
        repos: impl IntoIterator<Item = &'a Repo>,
    ) -> BTreeMap<Repo, bool> {
        let unique: BTreeSet<&Repo> = repos.into_iter().collect();
        info!("Updating {} repositories", unique.len());

        let outcomes = join_all(unique.iter().map(|repo| self.ensure_mirror(repo))).await;
        unique
            .into_iter()
            .cloned()
            .zip(outcomes)
            .collect()
    }

    /// Lists the files at the tip of `branch` in the mirror of `repo`.
    pub async fn list_tree(&self, repo: &Repo, branch: &str) -> Result<BTreeSet<String>> {
        let managed = self.managed(repo);
        managed.require_mirror()?;
        let files = self
            .git_ops
            .list_tree(&managed.mirror_path, branch)
            .await?;
        Ok(files.into_iter().collect())
    }

    /// Creates a checkout of `branch` in `target` from the mirror of `repo`.
    ///
    /// Fails with [`Error::MirrorMissing`] when the mirror has not been
    /// created.
    pub async fn create_worktree(&self, repo: &Repo, target: &Path, branch: &str) -> Result<()> {
        let managed = self.managed(repo);
        managed.require_mirror()?;
        self.git_ops
            .clone_worktree(&managed.mirror_path, branch, target)
            .await
    }
}
