//! The `metadata` pipeline.
//!
//! ## Overview
//!
//! One run goes through these stages:
//! 1. Stitching - Parse and merge all fragments of `paths.config_dir`
//! 2. Debug Dump - Write the stitched tree to `paths.tmp_metadata_dir`
//! 3. Resolution - Turn the requested doctypes into deliverables
//! 4. Processing - Update mirrors, then build every deliverable concurrently
//! 5. Aggregation - Write one manifest per selected product docset
//!
//! Only stitch conflicts stop a run. Failed deliverables are reported in the
//! [`MetadataReport`], and aggregation runs regardless of them. A failed
//! aggregation is reported there too, next to the failed deliverables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use crate::config::EnvConfig;
use crate::coordinator::{process_batch, BatchOptions};
use crate::deliverable::Deliverable;
use crate::doctype::Doctype;
use crate::error::Result;
use crate::manifest::aggregate;
use crate::processor::DeliverableProcessor;
use crate::repository::RepositoryManager;
use crate::resolve::resolve_all;
use crate::xml::stitch::{discover_fragments, stitch, StitchOptions, StitchReport, StitchedTree};

/// File name of the stitched debug copy.
pub const STITCHED_DUMP_FILENAME: &str = "stitched-metadata.xml";

#[derive(Debug, Clone)]
pub struct MetadataOptions {
    pub doctypes: Vec<Doctype>,
    pub batch: BatchOptions,
    pub stitch: StitchOptions,
}

/// Outcome of [`run_metadata`].
#[derive(Debug, Default)]
pub struct MetadataReport {
    pub total: usize,
    pub failed: Vec<Deliverable>,
    pub manifests: Vec<PathBuf>,
    pub skipped_fragments: Vec<PathBuf>,
    /// Set when writing the manifests failed.
    pub aggregation_error: Option<String>,
}

impl MetadataReport {
    /// `0` if every deliverable succeeded and the manifests were written,
    /// `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() && self.aggregation_error.is_none() {
            0
        } else {
            1
        }
    }
}

/// Discover and stitch the fragments below `config_dir` on the blocking pool.
pub async fn load_stitched(config_dir: &Path, options: StitchOptions) -> Result<StitchReport> {
    let dir = config_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let fragments = discover_fragments(&dir)?;
        stitch(&fragments, options)
    })
    .await?
}

/// Write the pretty-printed tree to `<dir>/stitched-metadata.xml`.
pub fn write_debug_dump(tree: &StitchedTree, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(STITCHED_DUMP_FILENAME);
    std::fs::write(&path, tree.to_pretty_string())?;
    Ok(path)
}

/// Run the whole pipeline.
pub async fn run_metadata(
    config: &EnvConfig,
    repos: Arc<RepositoryManager>,
    options: MetadataOptions,
) -> Result<MetadataReport> {
    let paths = &config.paths;
    let StitchReport { tree, skipped } = load_stitched(&paths.config_dir, options.stitch).await?;

    match write_debug_dump(&tree, &paths.tmp_metadata_dir) {
        Ok(path) => info!("Stitched XML written to {}", path.display()),
        Err(e) => warn!("Could not write stitched XML: {}", e),
    }

    let deliverables = resolve_all(&tree, &options.doctypes);
    let total = deliverables.len();
    if deliverables.is_empty() {
        warn!("No deliverables match the given doctypes");
    }

    let processor = Arc::new(DeliverableProcessor::new(
        Arc::clone(&repos),
        paths.tmp_repo_dir.clone(),
        paths.meta_cache_dir.clone(),
        config.build_command(),
    ));
    let failed = process_batch(deliverables, &repos, processor, options.batch).await;

    let meta_cache_dir = paths.meta_cache_dir.clone();
    let doctypes = options.doctypes;
    let aggregated =
        tokio::task::spawn_blocking(move || aggregate(&tree, &doctypes, &meta_cache_dir)).await?;
    let (manifests, aggregation_error) = match aggregated {
        Ok(manifests) => (manifests, None),
        Err(e) => {
            error!("Failed to write manifests: {}", e);
            (Vec::new(), Some(e.to_string()))
        }
    };

    Ok(MetadataReport {
        total,
        failed,
        manifests,
        skipped_fragments: skipped.into_iter().map(|(path, _)| path).collect(),
        aggregation_error,
    })
}
