//! # Batch Coordination
//!
//! Runs the processing of many deliverables concurrently, bounded by a
//! semaphore, under one of two policies:
//!
//! - **collect-all**: every task runs to completion and all failures are
//!   returned.
//! - **fail-fast**: on the first failure, every task still running is
//!   aborted and awaited, and only that first failure is returned.
//!
//! Aborting a task drops its future at its current await point. Child
//! processes are spawned with `kill_on_drop`, and scoped working directories
//! are preserved on drop, so an aborted deliverable leaves its directory
//! behind just like a failed one.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::deliverable::Deliverable;
use crate::processor::DeliverableProcessor;
use crate::repository::RepositoryManager;

/// Options for [`process_batch`].
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Stop at the first failed deliverable.
    pub fail_fast: bool,
    /// Maximum number of deliverables processed at the same time.
    pub max_jobs: usize,
    /// Do not clone missing mirrors before processing.
    pub skip_repo_update: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            fail_fast: false,
            max_jobs: crate::defaults::default_max_workers(),
            skip_repo_update: false,
        }
    }
}

/// Run `process_fn` for every deliverable and return the ones that failed.
///
/// A task that panics counts as failed. In collect-all mode the failures are
/// returned in input order.
pub async fn run_batch<F, Fut>(
    deliverables: Vec<Deliverable>,
    process_fn: F,
    fail_fast: bool,
    max_jobs: usize,
) -> Vec<Deliverable>
where
    F: Fn(Deliverable) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    let process_fn = Arc::new(process_fn);
    let semaphore = Arc::new(Semaphore::new(max_jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, deliverable) in deliverables.iter().cloned().enumerate() {
        let process_fn = Arc::clone(&process_fn);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (index, false);
            };
            let id = deliverable.full_id();
            let outcome = AssertUnwindSafe(process_fn(deliverable))
                .catch_unwind()
                .await;
            match outcome {
                Ok(success) => (index, success),
                Err(_) => {
                    error!("Processing {} panicked", id);
                    (index, false)
                }
            }
        });
    }

    let mut failed_indices = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (index, success) = match joined {
            Ok(result) => result,
            Err(e) => {
                // Only reachable if the task was cancelled from outside.
                warn!("Task ended abnormally: {}", e);
                continue;
            }
        };
        if success {
            continue;
        }
        failed_indices.push(index);
        if fail_fast {
            warn!(
                "{} failed, cancelling {} remaining tasks",
                deliverables[index].full_id(),
                tasks.len()
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
            break;
        }
    }

    failed_indices.sort_unstable();
    failed_indices
        .into_iter()
        .map(|index| deliverables[index].clone())
        .collect()
}

/// Update mirrors for the batch, then process every deliverable.
///
/// Mirrors are ensured once per distinct repository before any deliverable
/// starts, so no two tasks ever clone the same repository.
pub async fn process_batch(
    deliverables: Vec<Deliverable>,
    repos: &RepositoryManager,
    processor: Arc<DeliverableProcessor>,
    options: BatchOptions,
) -> Vec<Deliverable> {
    if options.skip_repo_update {
        info!(
            "Skipping repository updates in {} as requested",
            repos.repo_root().display()
        );
    } else {
        let outcome = repos
            .update_mirrors(deliverables.iter().map(|d| &d.repo))
            .await;
        for (repo, ok) in &outcome {
            if !ok {
                error!("Failed to update repository {}", repo.slug());
            }
        }
    }

    info!(
        "Processing {} deliverables ({} at a time{})",
        deliverables.len(),
        options.max_jobs.max(1),
        if options.fail_fast { ", fail-fast" } else { "" }
    );

    run_batch(
        deliverables,
        move |deliverable| {
            let processor = Arc::clone(&processor);
            async move { processor.process(&deliverable).await }
        },
        options.fail_fast,
        options.max_jobs,
    )
    .await
}
