//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_fragment("sles.xml", fragments::SLES);
//!     fixture.command().arg("validate").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::fragments;
    #[allow(unused_imports)]
    pub use super::git_available;
    pub use super::TestFixture;
}

/// XML configuration fragments for testing.
#[allow(dead_code)]
pub mod fragments {
    /// One product with two docsets, English only.
    pub const SLES: &str = r#"<product productid="sles">
  <name>SUSE Linux Enterprise Server</name>
  <acronym>SLES</acronym>
  <category categoryid="admin">
    <language lang="en-us" default="1" title="Administration &amp; Tuning"/>
  </category>
  <desc lang="en-us" default="1"><p>Enterprise Linux.</p></desc>
  <docset setid="15-SP6" lifecycle="supported">
    <builddocs>
      <git remote="https://github.com/SUSE/doc-sle.git"/>
      <language lang="en-us" default="1">
        <branch>maintenance/SLE15SP6</branch>
        <deliverable><dc>DC-SLES-admin</dc><format html="1" pdf="1"/></deliverable>
      </language>
    </builddocs>
  </docset>
  <docset setid="16.0" lifecycle="beta">
    <builddocs>
      <git remote="https://github.com/SUSE/doc-sle.git"/>
      <language lang="en-us" default="1">
        <deliverable><dc>DC-SLES-admin</dc><format html="1"/></deliverable>
      </language>
    </builddocs>
  </docset>
</product>
"#;

    /// A second product that links to the first one.
    pub const SUMA: &str = r#"<product productid="suma">
  <name>SUSE Manager</name>
  <docset setid="4.3" lifecycle="supported">
    <builddocs>
      <git remote="gh://uyuni-project/uyuni-docs"/>
      <language lang="en-us" default="1">
        <deliverable><dc>DC-suma-client</dc><format html="1"/></deliverable>
      </language>
    </builddocs>
    <internal>
      <ref product="sles" docset="15-SP6"/>
    </internal>
  </docset>
</product>
"#;

    /// A product with a `<ref>` to a docset that does not exist.
    pub const BROKEN_REF: &str = r#"<product productid="sled">
  <docset setid="15" lifecycle="supported">
    <builddocs>
      <git remote="gh://SUSE/doc-sled"/>
      <language lang="en-us" default="1">
        <deliverable><dc>DC-SLED-all</dc><format html="1"/></deliverable>
      </language>
    </builddocs>
    <internal>
      <ref product="sles" docset="99"/>
    </internal>
  </docset>
</product>
"#;

    /// Not well-formed XML.
    pub const MALFORMED: &str = "<product productid=\"broken\"><docset>";
}

/// Check whether a `git` binary can be run.
///
/// Tests that need a real repository return early when this is `false`.
#[allow(dead_code)]
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A test fixture with a temporary directory laid out like a docbuild
/// installation: fragments in `config.d/`, an environment configuration at
/// the root and all other paths below it.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a configuration fragment below `config.d/`.
    pub fn with_fragment(self, name: &str, content: &str) -> Self {
        self.temp_dir
            .child("config.d")
            .child(name)
            .write_str(content)
            .expect("Failed to write fragment");
        self
    }

    /// Write `env.production.toml` using `meta` as the build command.
    pub fn with_env(self, meta: &str) -> Self {
        let content = format!(
            r#"[paths]
base = "{}"
config_dir = "{{base}}/config.d"
repo_dir = "{{base}}/repos"
tmp_repo_dir = "{{base}}/tmp"
meta_cache_dir = "{{base}}/cache"
tmp_metadata_dir = "{{base}}/debug"

[build]
max_workers = 2

[build.daps]
meta = "{}"
"#,
            self.path().display(),
            meta
        );
        self.temp_dir
            .child("env.production.toml")
            .write_str(&content)
            .expect("Failed to write env config");
        self
    }

    /// Add a file with the given path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the fragment directory.
    #[allow(dead_code)]
    pub fn config_dir(&self) -> PathBuf {
        self.temp_dir.path().join("config.d")
    }

    /// Get the path to the environment configuration.
    #[allow(dead_code)]
    pub fn env_path(&self) -> PathBuf {
        self.temp_dir.path().join("env.production.toml")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory, with
    /// colors off and the environment variable override cleared.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("docbuild");
        cmd.current_dir(self.path())
            .env_remove("DOCBUILD_ENV_CONFIG")
            .env_remove("RUST_LOG")
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_fragment() {
        let fixture = TestFixture::new().with_fragment("sles.xml", fragments::SLES);
        assert!(fixture.config_dir().join("sles.xml").exists());
    }

    #[test]
    fn test_fixture_with_env() {
        let fixture = TestFixture::new().with_env("true {dcfile} {output}");
        let content = std::fs::read_to_string(fixture.env_path()).unwrap();
        assert!(content.contains("{base}/repos"));
        assert!(content.contains("meta = \"true {dcfile} {output}\""));
    }
}
