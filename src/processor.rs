//! # Deliverable Processing
//!
//! Processing one deliverable means: check out its branch from the local
//! mirror into a scoped working directory, run the metadata build tool on its
//! DC file, and patch the JSON artifact the tool wrote with the deliverable's
//! publishing paths.
//!
//! [`DeliverableProcessor::process`] never returns an error. Every failure is
//! logged with the deliverable's identifier and reported as `false`; the
//! working directory of a failed deliverable stays on disk.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use log::{debug, error, info};
use serde_json::{Map, Value};
use tokio::process::Command;

use crate::deliverable::Deliverable;
use crate::error::{Error, Result};
use crate::repository::RepositoryManager;
use crate::workdir::PreservedOnFailureDir;

/// Mount point of the checkout inside the build container.
pub const CONTAINER_WORKTREE: &str = "/worktree";
/// Mount point of the artifact file inside the build container.
pub const CONTAINER_OUTPUT: &str = "/output.json";

/// How the build tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildCommand {
    /// A command line with `{builddir}`, `{dcfile}` and `{output}`
    /// placeholders, split on whitespace.
    Template(String),
    /// The build tool inside a container image, with the checkout and the
    /// artifact mounted at fixed paths.
    Container { runtime: String, image: String },
}

impl BuildCommand {
    /// The argument vector for one deliverable.
    ///
    /// `dc_path` is relative to `worktree`. Placeholders are substituted per
    /// word, so paths containing spaces stay single arguments.
    pub fn argv(&self, worktree: &Path, dc_path: &Path, output: &Path) -> Vec<String> {
        match self {
            BuildCommand::Template(template) => {
                let builddir = worktree.display().to_string();
                let dcfile = worktree.join(dc_path).display().to_string();
                let output = output.display().to_string();
                template
                    .split_whitespace()
                    .map(|word| {
                        word.replace("{builddir}", &builddir)
                            .replace("{dcfile}", &dcfile)
                            .replace("{output}", &output)
                    })
                    .collect()
            }
            BuildCommand::Container { runtime, image } => {
                let dc_in_container = Path::new(CONTAINER_WORKTREE).join(dc_path);
                vec![
                    runtime.clone(),
                    "run".to_string(),
                    "--rm".to_string(),
                    "-v".to_string(),
                    format!("{}:{}", worktree.display(), CONTAINER_WORKTREE),
                    "-v".to_string(),
                    format!("{}:{}", output.display(), CONTAINER_OUTPUT),
                    image.clone(),
                    "daps".to_string(),
                    "-vv".to_string(),
                    "metadata".to_string(),
                    "--output".to_string(),
                    CONTAINER_OUTPUT.to_string(),
                    dc_in_container.display().to_string(),
                ]
            }
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, BuildCommand::Container { .. })
    }
}

/// Runs the build for single deliverables.
pub struct DeliverableProcessor {
    repos: Arc<RepositoryManager>,
    tmp_repo_dir: PathBuf,
    meta_cache_dir: PathBuf,
    command: BuildCommand,
}

impl DeliverableProcessor {
    pub fn new(
        repos: Arc<RepositoryManager>,
        tmp_repo_dir: PathBuf,
        meta_cache_dir: PathBuf,
        command: BuildCommand,
    ) -> Self {
        Self {
            repos,
            tmp_repo_dir,
            meta_cache_dir,
            command,
        }
    }

    pub fn repositories(&self) -> &Arc<RepositoryManager> {
        &self.repos
    }

    pub fn meta_cache_dir(&self) -> &Path {
        &self.meta_cache_dir
    }

    /// Process one deliverable, reporting success as a boolean.
    pub async fn process(&self, deliverable: &Deliverable) -> bool {
        info!("> Processing deliverable: {}", deliverable.full_id());
        match self.try_process(deliverable).await {
            Ok(artifact) => {
                debug!(
                    "Updated metadata JSON for {} at {}",
                    deliverable.full_id(),
                    artifact.display()
                );
                true
            }
            Err(e) => {
                error!("Error processing {}: {}", deliverable.full_id(), e);
                false
            }
        }
    }

    /// Process one deliverable and return the path of its patched artifact.
    pub async fn try_process(&self, deliverable: &Deliverable) -> Result<PathBuf> {
        let managed = self.repos.managed(&deliverable.repo);
        if !managed.mirror_exists() {
            return Err(Error::MirrorMissing {
                url: deliverable.repo.url().to_string(),
                path: managed.mirror_path,
            });
        }

        let artifact = deliverable.artifact_path(&self.meta_cache_dir);
        if let Some(parent) = artifact.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let prefix = format!(
            "clone-{}-{}-{}--{}_",
            deliverable.productid, deliverable.docsetid, deliverable.lang, deliverable.dcfile
        );
        let workdir = PreservedOnFailureDir::new_in(&self.tmp_repo_dir, &prefix)?;
        let worktree = workdir.path().join("worktree");

        self.repos
            .create_worktree(&deliverable.repo, &worktree, &deliverable.branch)
            .await?;

        if self.command.is_container() {
            // The file must exist, otherwise the runtime mounts a directory.
            tokio::fs::write(&artifact, b"").await?;
        }

        let argv = self
            .command
            .argv(&worktree, &deliverable.dc_path(), &artifact);
        run_build_tool(&argv, deliverable).await?;

        patch_artifact(&artifact, deliverable)?;
        workdir.cleanup()?;
        Ok(artifact)
    }
}

async fn run_build_tool(argv: &[String], deliverable: &Deliverable) -> Result<()> {
    let fail = |status: String, stderr: String| Error::BuildTool {
        deliverable: deliverable.full_id(),
        status,
        stderr,
    };
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| fail("not started".to_string(), "empty build command".to_string()))?;

    debug!("Running {}", argv.join(" "));
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| fail("failed to start".to_string(), format!("{}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        error!("Build tool error for {}: {}", deliverable.full_id(), stderr);
        return Err(fail(output.status.to_string(), stderr));
    }
    Ok(())
}

/// Read, patch and rewrite the artifact at `path`.
pub fn patch_artifact(path: &Path, deliverable: &Deliverable) -> Result<()> {
    let invalid = |message: &str| Error::Artifact {
        path: path.to_path_buf(),
        message: message.to_string(),
    };
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Err(invalid("build tool produced an empty file"));
    }
    let mut value: Value = serde_json::from_str(&content)?;
    patch_metadata(&mut value, deliverable).map_err(invalid)?;

    let mut pretty = serde_json::to_string_pretty(&value)?;
    pretty.push('\n');
    std::fs::write(path, pretty)?;
    Ok(())
}

/// Inject the deliverable's fields into the first entry of `docs`.
///
/// `dcfile` and the HTML path are always set; PDF and single-HTML paths only
/// when those formats are enabled. `lang` is filled in only when missing or
/// empty.
pub fn patch_metadata(
    value: &mut Value,
    deliverable: &Deliverable,
) -> std::result::Result<(), &'static str> {
    let doc = value
        .get_mut("docs")
        .and_then(Value::as_array_mut)
        .and_then(|docs| docs.first_mut())
        .and_then(Value::as_object_mut)
        .ok_or("expected a non-empty \"docs\" array of objects")?;

    doc.insert(
        "dcfile".to_string(),
        Value::String(deliverable.dcfile.clone()),
    );

    let format = doc
        .entry("format")
        .or_insert_with(|| Value::Object(Map::new()));
    if !format.is_object() {
        *format = Value::Object(Map::new());
    }
    if let Some(format) = format.as_object_mut() {
        format.insert("html".to_string(), Value::String(deliverable.html_path()));
        if deliverable.formats.pdf {
            format.insert("pdf".to_string(), Value::String(deliverable.pdf_path()));
        }
        if deliverable.formats.single_html {
            format.insert(
                "single-html".to_string(),
                Value::String(deliverable.single_html_path()),
            );
        }
    }

    let has_lang = doc
        .get("lang")
        .and_then(Value::as_str)
        .is_some_and(|lang| !lang.is_empty());
    if !has_lang {
        doc.insert("lang".to_string(), Value::String(deliverable.lang.clone()));
    }
    Ok(())
}
