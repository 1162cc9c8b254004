use std::path::Path;
use std::process::Stdio;

use log::{debug, error, info};
use tokio::process::Command;

use crate::error::{Error, Result};

/// Build a `git` invocation with a stable, non-interactive environment.
///
/// Output is forced to the C locale so error messages can be matched, and
/// credential prompts are disabled so a clone never blocks on a terminal.
/// The child is killed if the future awaiting it is dropped.
fn git_command() -> Command {
    let mut command = Command::new("git");
    command
        .env("LANG", "C")
        .env("LC_ALL", "C")
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    command
}

fn log_stderr(stderr: &str) {
    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
        error!("[git] {}", line);
    }
}

/// Turn common authentication failures into a hint for the user.
fn clone_hint(stderr: &str) -> Option<String> {
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
        || stderr.contains("terminal prompts disabled")
    {
        Some(
            "Make sure you have access to the repository. For private repositories, \
             add your SSH key to ssh-agent or configure a credential helper."
                .to_string(),
        )
    } else {
        None
    }
}

/// Create a bare mirror of `url` at `target`.
///
/// The clone is made in a temporary sibling directory and renamed into place
/// once complete, so an interrupted clone never leaves a half-written mirror
/// behind that would later be mistaken for a complete one.
pub async fn clone_bare(url: &str, target: &Path) -> Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;
    let staging = tempfile::Builder::new()
        .prefix(".clone-")
        .tempdir_in(parent)?;
    let staged = staging.path().join("mirror.git");

    info!("Cloning '{}' into '{}'...", url, target.display());
    let output = git_command()
        .args(["clone", "--bare", "--progress", url])
        .arg(&staged)
        .current_dir(parent)
        .output()
        .await
        .map_err(|e| Error::GitClone {
            url: url.to_string(),
            message: e.to_string(),
            hint: None,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log_stderr(&stderr);
        return Err(Error::GitClone {
            url: url.to_string(),
            message: stderr.trim().to_string(),
            hint: clone_hint(&stderr),
        });
    }

    tokio::fs::rename(&staged, target).await?;
    info!("Cloned '{}' successfully", url);
    Ok(())
}

/// Check out `branch` of the bare mirror at `mirror` into `target`.
///
/// This is a local clone, so objects are hard-linked from the mirror and no
/// network access happens.
pub async fn clone_branch(mirror: &Path, branch: &str, target: &Path) -> Result<()> {
    let mirror_str = mirror.display().to_string();
    debug!(
        "Creating checkout of {} at {} in {}",
        mirror_str,
        branch,
        target.display()
    );
    let output = git_command()
        .args(["clone", "--local", "--branch", branch])
        .arg(mirror)
        .arg(target)
        .output()
        .await
        .map_err(|e| Error::GitCommand {
            command: format!("clone --local --branch {}", branch),
            url: mirror_str.clone(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log_stderr(&stderr);
        return Err(Error::GitCommand {
            command: format!("clone --local --branch {}", branch),
            url: mirror_str,
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// List every file path at the tip of `branch` in the bare mirror.
///
/// Paths use `/` separators and are relative to the repository root.
pub async fn ls_tree(mirror: &Path, branch: &str) -> Result<Vec<String>> {
    let mirror_str = mirror.display().to_string();
    let output = git_command()
        .arg("--git-dir")
        .arg(mirror)
        .args(["ls-tree", "-r", "--name-only", branch])
        .output()
        .await
        .map_err(|e| Error::GitCommand {
            command: format!("ls-tree -r --name-only {}", branch),
            url: mirror_str.clone(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::GitCommand {
            command: format!("ls-tree -r --name-only {}", branch),
            url: mirror_str,
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Whether a `git` executable can be run.
pub async fn is_available() -> bool {
    git_command()
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}
