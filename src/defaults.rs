//! Default values for docbuild configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// File name of the environment configuration.
pub const ENV_CONFIG_FILENAME: &str = "env.production.toml";

/// Doctype used when none is given on the command line.
pub const DEFAULT_DOCTYPE: &str = "*/*/en-us";

/// Container runtime used when a build image is configured without one.
pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";

/// Directories searched for [`ENV_CONFIG_FILENAME`], in order.
///
/// - the current directory
/// - the user configuration directory, e.g. `~/.config/docbuild` on Linux
/// - `/etc/docbuild`
pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("docbuild"));
    }
    paths.push(PathBuf::from("/etc/docbuild"));
    paths
}

/// Returns the default directory for debug copies of the stitched
/// configuration.
pub fn default_tmp_metadata_dir() -> PathBuf {
    std::env::temp_dir().join("docbuild")
}

/// Returns the number of deliverables built at the same time by default.
///
/// This is the number of available CPUs, or 1 if that cannot be determined.
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
