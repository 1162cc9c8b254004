//! Scoped working directories that survive failures.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::TempDir;

use crate::error::Result;

/// A temporary directory that is removed only when [`cleanup`] is called.
///
/// Dropping it without calling `cleanup`, because an error was returned or
/// the owning task was aborted, leaves the directory on disk for inspection.
///
/// [`cleanup`]: PreservedOnFailureDir::cleanup
#[derive(Debug)]
pub struct PreservedOnFailureDir {
    dir: Option<TempDir>,
}

impl PreservedOnFailureDir {
    /// Create a new directory below `parent` whose name starts with `prefix`.
    pub fn new_in(parent: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        debug!("Created working directory {}", dir.path().display());
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        // `dir` is only taken by `cleanup` and `drop`, both of which consume
        // or end the value.
        self.dir.as_ref().map(TempDir::path).unwrap_or(Path::new(""))
    }

    /// Remove the directory and everything in it.
    pub fn cleanup(mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!("Removed working directory {}", path.display());
        }
        Ok(())
    }
}

impl Drop for PreservedOnFailureDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path: PathBuf = dir.keep();
            warn!("Keeping working directory for inspection: {}", path.display());
        }
    }
}
