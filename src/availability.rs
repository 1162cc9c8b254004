//! Checks that the DC files named by deliverables exist in their repositories.
//!
//! Deliverables are grouped by repository and branch, so each branch is
//! listed once with `git ls-tree` no matter how many deliverables it holds.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use log::{error, info};

use crate::deliverable::Deliverable;
use crate::repo::Repo;
use crate::repository::RepositoryManager;

/// Files to look for, keyed by repository and branch.
pub type FileGroups = BTreeMap<(Repo, String), BTreeSet<String>>;

/// Files that were not found, keyed by repository and branch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MissingFileReport {
    pub missing: FileGroups,
}

impl MissingFileReport {
    pub fn is_empty(&self) -> bool {
        self.missing.values().all(BTreeSet::is_empty)
    }

    /// Total number of missing files over all groups.
    pub fn len(&self) -> usize {
        self.missing.values().map(BTreeSet::len).sum()
    }
}

/// Group the repository-relative DC paths of `deliverables` by repository and
/// branch.
pub fn group_by_repo(deliverables: &[Deliverable]) -> FileGroups {
    let mut groups = FileGroups::new();
    for deliverable in deliverables {
        groups
            .entry((deliverable.repo.clone(), deliverable.branch.clone()))
            .or_default()
            .insert(deliverable.repo_file());
    }
    groups
}

async fn check_group(
    repos: &RepositoryManager,
    repo: &Repo,
    branch: &str,
    files: &BTreeSet<String>,
) -> BTreeSet<String> {
    if !repos.ensure_mirror(repo).await {
        error!("Cannot check files of {}: mirror unavailable", repo);
        return files.clone();
    }
    match repos.list_tree(repo, branch).await {
        Ok(listing) => files.difference(&listing).cloned().collect(),
        Err(e) => {
            error!("Cannot list branch {} of {}: {}", branch, repo, e);
            files.clone()
        }
    }
}

/// Report every DC file that is absent from its branch.
///
/// Mirrors are created when missing. When a mirror cannot be created or its
/// branch cannot be listed, all files of that group count as missing.
pub async fn check_files(
    repos: &RepositoryManager,
    deliverables: &[Deliverable],
) -> MissingFileReport {
    let groups = group_by_repo(deliverables);
    info!(
        "Checking {} files in {} repository branches",
        groups.values().map(BTreeSet::len).sum::<usize>(),
        groups.len()
    );

    let results = join_all(
        groups
            .iter()
            .map(|((repo, branch), files)| check_group(repos, repo, branch, files)),
    )
    .await;

    let missing = groups
        .into_keys()
        .zip(results)
        .filter(|(_, missing)| !missing.is_empty())
        .collect();
    MissingFileReport { missing }
}
