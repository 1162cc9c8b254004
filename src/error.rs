//! # Error Handling
//!
//! This module defines the centralized error type for `docbuild`. It uses the
//! `thiserror` library to build one `Error` enum that covers every failure
//! mode of the pipeline, from reading XML fragments to running the external
//! build tool.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries enough context (file
//!   path, repository URL, deliverable identifier, captured stderr) to be
//!   reported without further lookups.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! ## Classification
//!
//! Errors fall into two classes, see [`Error::is_fatal`]:
//!
//! - Stitch-conflict-class errors (duplicate product ids, failed inclusions,
//!   unresolved references). These make the merged configuration ambiguous and
//!   terminate the whole run.
//! - Everything else. These degrade to a partial result: a fragment is
//!   skipped, a deliverable is marked failed, an artifact is left out of a
//!   manifest.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for docbuild operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration fragment is not well-formed XML.
    #[error("XML parse error in {}: {message}", path.display())]
    XmlParse { path: PathBuf, message: String },

    /// An inclusion directive could not be resolved.
    #[error("Inclusion of '{href}' from {} failed: {message}", source_file.display())]
    Inclusion {
        href: String,
        source_file: PathBuf,
        message: String,
    },

    /// Two or more fragments define the same product id.
    #[error("Duplicate product IDs found: {}", ids.join(", "))]
    StitchConflict { ids: Vec<String> },

    /// One or more `<ref>` elements point to targets that do not exist.
    #[error("Unresolved references found in stitch file:\n  {}", messages.join("\n  "))]
    UnresolvedReferences { messages: Vec<String> },

    /// A doctype selector string could not be parsed.
    #[error("Invalid doctype '{value}': {message}")]
    Doctype { value: String, message: String },

    /// A repository URL or abbreviation could not be understood.
    #[error("Invalid repository '{value}': {message}")]
    InvalidRepo { value: String, message: String },

    /// Cloning a mirror failed.
    ///
    /// Includes an optional hint for common authentication problems.
    #[error("Git clone error for {url}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// A git command other than the mirror clone failed.
    #[error("Git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// The permanent mirror for a repository is not present on disk.
    #[error("Bare repository not found for {url} at {}", path.display())]
    MirrorMissing { url: String, path: PathBuf },

    /// The external build tool exited unsuccessfully or could not be started.
    #[error("Build tool failed for {deliverable} ({status}): {stderr}")]
    BuildTool {
        deliverable: String,
        status: String,
        stderr: String,
    },

    /// A per-deliverable JSON artifact is empty or does not match the
    /// document schema.
    #[error("Invalid artifact {}: {message}", path.display())]
    Artifact { path: PathBuf, message: String },

    /// The environment configuration file could not be read or parsed.
    #[error("Configuration parsing error: {message}")]
    ConfigParse { message: String },

    /// A `{placeholder}` in the environment configuration could not be resolved.
    #[error("Placeholder error: {message}")]
    Placeholder { message: String },

    /// The resolved environment configuration failed validation.
    #[error("Configuration validation failed:\n  {}", errors.join("\n  "))]
    ConfigValidation { errors: Vec<String> },

    /// A background task could not be joined.
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML syntax error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A directory traversal error, wrapped from `walkdir::Error`.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl Error {
    /// Whether this error makes the stitched configuration unsafe to use.
    ///
    /// Only these errors terminate a whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::StitchConflict { .. }
                | Error::Inclusion { .. }
                | Error::UnresolvedReferences { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_xml_parse() {
        let error = Error::XmlParse {
            path: PathBuf::from("config.d/sles.xml"),
            message: "unexpected end of file".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("XML parse error"));
        assert!(display.contains("config.d/sles.xml"));
        assert!(display.contains("unexpected end of file"));
    }

    #[test]
    fn test_error_display_stitch_conflict() {
        let error = Error::StitchConflict {
            ids: vec!["sles".to_string(), "suma".to_string()],
        };
        let display = format!("{}", error);
        assert!(display.contains("Duplicate product IDs found"));
        assert!(display.contains("sles, suma"));
    }

    #[test]
    fn test_error_display_git_clone_with_hint() {
        let error = Error::GitClone {
            url: "https://github.com/SUSE/doc-sle.git".to_string(),
            message: "Authentication failed".to_string(),
            hint: Some("Check SSH keys".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Git clone error"));
        assert!(display.contains("doc-sle.git"));
        assert!(display.contains("hint:"));
        assert!(display.contains("Check SSH keys"));
    }

    #[test]
    fn test_error_display_git_clone_without_hint() {
        let error = Error::GitClone {
            url: "https://github.com/SUSE/doc-sle.git".to_string(),
            message: "not found".to_string(),
            hint: None,
        };
        assert!(!format!("{}", error).contains("hint:"));
    }

    #[test]
    fn test_error_display_build_tool() {
        let error = Error::BuildTool {
            deliverable: "sles/15-SP6/main/en-us:DC-SLES-admin".to_string(),
            status: "exit status: 2".to_string(),
            stderr: "daps: no such file".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Build tool failed"));
        assert!(display.contains("DC-SLES-admin"));
        assert!(display.contains("daps: no such file"));
    }

    #[test]
    fn test_error_display_config_validation_lists_all() {
        let error = Error::ConfigValidation {
            errors: vec![
                "paths.repo_dir is required".to_string(),
                "build.max_workers must be at least 1".to_string(),
            ],
        };
        let display = format!("{}", error);
        assert!(display.contains("paths.repo_dir is required"));
        assert!(display.contains("build.max_workers must be at least 1"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::StitchConflict { ids: vec![] }.is_fatal());
        assert!(Error::UnresolvedReferences { messages: vec![] }.is_fatal());
        assert!(Error::Inclusion {
            href: "missing.xml".to_string(),
            source_file: PathBuf::from("a.xml"),
            message: "not found".to_string(),
        }
        .is_fatal());

        assert!(!Error::XmlParse {
            path: PathBuf::from("a.xml"),
            message: "bad".to_string(),
        }
        .is_fatal());
        assert!(!Error::MirrorMissing {
            url: "u".to_string(),
            path: PathBuf::from("/tmp/x"),
        }
        .is_fatal());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{unclosed").unwrap_err();
        let error: Error = json_error.into();
        assert!(format!("{}", error).contains("JSON error"));
    }
}
