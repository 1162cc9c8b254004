//! # Environment Configuration
//!
//! The environment configuration is a TOML file (by default
//! `env.production.toml`) describing where docbuild keeps its repositories and
//! caches and how it invokes the build tool.
//!
//! Loading happens in two explicit stages, each a pure function:
//!
//! 1.  **`replace_placeholders`**: substitutes `{key}` and `{a.b.c}`
//!     placeholders in every string value. `{key}` is looked up in the table
//!     that contains the string, `{a.b.c}` from the top of the document.
//!     `{{` and `}}` produce literal braces.
//!
//! 2.  **`validate`**: deserializes the resolved document into [`EnvConfig`]
//!     and checks it, reporting every problem at once.
//!
//! ```
//! use docbuild::config;
//!
//! let env = config::parse(r#"
//! [paths]
//! base = "/var/cache/docbuild"
//! config_dir = "/etc/docbuild/config.d"
//! repo_dir = "{base}/repos"
//! tmp_repo_dir = "{base}/tmp"
//! meta_cache_dir = "{paths.base}/meta"
//! "#).unwrap();
//! assert_eq!(env.paths.repo_dir.to_str(), Some("/var/cache/docbuild/repos"));
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::{Table, Value};

use crate::defaults::{
    config_search_paths, default_max_workers, default_tmp_metadata_dir,
    DEFAULT_CONTAINER_RUNTIME, ENV_CONFIG_FILENAME,
};
use crate::error::{Error, Result};
use crate::processor::BuildCommand;

/// Maximum number of substitution passes over a single string.
pub const MAX_RECURSION_DEPTH: usize = 10;

/// Build command used when `build.daps.meta` is not configured.
pub const DEFAULT_META_COMMAND: &str =
    "daps -vv --builddir={builddir} metadata --output {output} {dcfile}";

/// The validated environment configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub paths: PathsConfig,
    pub build: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
    /// Directory holding the XML configuration fragments.
    pub config_dir: PathBuf,
    /// Directory of the permanent bare mirrors.
    pub repo_dir: PathBuf,
    /// Directory for per-deliverable working directories.
    pub tmp_repo_dir: PathBuf,
    /// Root of the per-deliverable artifacts and the manifests.
    pub meta_cache_dir: PathBuf,
    /// Where the stitched debug copy is written.
    pub tmp_metadata_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Template for the metadata build; see [`BuildCommand::Template`].
    pub meta_command: String,
    pub max_workers: usize,
    pub container: Option<ContainerConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    pub runtime: String,
    pub image: String,
}

impl EnvConfig {
    /// How to invoke the build tool for this environment.
    pub fn build_command(&self) -> BuildCommand {
        match &self.build.container {
            Some(container) => BuildCommand::Container {
                runtime: container.runtime.clone(),
                image: container.image.clone(),
            },
            None => BuildCommand::Template(self.build.meta_command.clone()),
        }
    }
}

// Deserialization targets. Everything is optional here so that `validate`
// can report all missing keys together.

#[derive(Debug, Default, Deserialize)]
struct RawEnvConfig {
    #[serde(default)]
    paths: RawPaths,
    #[serde(default)]
    build: RawBuild,
}

#[derive(Debug, Default, Deserialize)]
struct RawPaths {
    config_dir: Option<String>,
    repo_dir: Option<String>,
    tmp_repo_dir: Option<String>,
    meta_cache_dir: Option<String>,
    tmp_metadata_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBuild {
    #[serde(default)]
    daps: RawDaps,
    max_workers: Option<i64>,
    #[serde(default)]
    container: RawContainer,
}

#[derive(Debug, Default, Deserialize)]
struct RawDaps {
    meta: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContainer {
    image: Option<String>,
    runtime: Option<String>,
}

fn placeholder_error(message: String) -> Error {
    Error::Placeholder { message }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn lookup_dotted(root: &Value, path: &str, key: &str) -> Result<String> {
    let mut value = root;
    let mut walked = Vec::new();
    for part in path.split('.') {
        walked.push(part);
        let table = value.as_table().ok_or_else(|| {
            placeholder_error(format!(
                "While resolving '{{{}}}' in '{}': '{}' is not a table",
                path,
                key,
                walked.join(".")
            ))
        })?;
        value = table.get(part).ok_or_else(|| {
            placeholder_error(format!(
                "While resolving '{{{}}}' in '{}': missing key '{}' in path '{}'",
                path,
                key,
                part,
                walked.join(".")
            ))
        })?;
    }
    Ok(value_to_string(value))
}

fn lookup(name: &str, section: Option<&Table>, root: &Value, key: &str) -> Result<String> {
    if name.contains('.') {
        return lookup_dotted(root, name, key);
    }
    section
        .and_then(|table| table.get(name))
        .map(value_to_string)
        .ok_or_else(|| {
            placeholder_error(format!(
                "While resolving '{{{}}}' in '{}': key '{}' not found in current section",
                name, key, name
            ))
        })
}

/// One substitution pass. Doubled braces are copied through unchanged.
fn substitute_once(s: &str, section: Option<&Table>, root: &Value, key: &str) -> Result<String> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") || tail.starts_with("}}") {
            out.push_str(&tail[..2]);
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            out.push('}');
            rest = &tail[1..];
            continue;
        }
        let inner_end = tail[1..].find(['{', '}']).map(|i| i + 1);
        match inner_end {
            Some(end) if end > 1 && tail[end..].starts_with('}') && !tail[end..].starts_with("}}") => {
                out.push_str(&lookup(&tail[1..end], section, root, key)?);
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve_string(s: &str, section: Option<&Table>, root: &Value, key: &str) -> Result<String> {
    let mut current = s.to_string();
    for _ in 0..MAX_RECURSION_DEPTH {
        let next = substitute_once(&current, section, root, key)?;
        if next == current {
            return Ok(current.replace("{{", "{").replace("}}", "}"));
        }
        current = next;
    }
    Err(placeholder_error(format!(
        "Too many nested placeholder expansions in key '{}'",
        key
    )))
}

fn resolve_node(value: &mut Value, section: Option<&Table>, root: &Value, key: &str) -> Result<()> {
    match value {
        Value::String(s) => *s = resolve_string(s, section, root, key)?,
        Value::Array(items) => {
            for item in items.iter_mut() {
                resolve_node(item, section, root, key)?;
            }
        }
        Value::Table(table) => {
            let snapshot = table.clone();
            for (child_key, child) in table.iter_mut() {
                resolve_node(child, Some(&snapshot), root, child_key)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Stage 1: replace every placeholder in the string values of `config`.
///
/// Lookups always see the unresolved document; values that themselves
/// contain placeholders are resolved by further passes, up to
/// [`MAX_RECURSION_DEPTH`].
pub fn replace_placeholders(config: &Value) -> Result<Value> {
    let mut resolved = config.clone();
    resolve_node(&mut resolved, None, config, "")?;
    Ok(resolved)
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn required_path(value: Option<String>, key: &str, errors: &mut Vec<String>) -> PathBuf {
    match value {
        Some(v) if !v.trim().is_empty() => expand_tilde(&v),
        _ => {
            errors.push(format!("paths.{}: required", key));
            PathBuf::new()
        }
    }
}

/// Stage 2: check a resolved document and turn it into an [`EnvConfig`].
pub fn validate(config: &Value) -> Result<EnvConfig> {
    let raw: RawEnvConfig = config.clone().try_into().map_err(|e: toml::de::Error| {
        Error::ConfigValidation {
            errors: vec![e.message().to_string()],
        }
    })?;

    let mut errors = Vec::new();
    let paths = PathsConfig {
        config_dir: required_path(raw.paths.config_dir, "config_dir", &mut errors),
        repo_dir: required_path(raw.paths.repo_dir, "repo_dir", &mut errors),
        tmp_repo_dir: required_path(raw.paths.tmp_repo_dir, "tmp_repo_dir", &mut errors),
        meta_cache_dir: required_path(raw.paths.meta_cache_dir, "meta_cache_dir", &mut errors),
        tmp_metadata_dir: raw
            .paths
            .tmp_metadata_dir
            .map(|p| expand_tilde(&p))
            .unwrap_or_else(default_tmp_metadata_dir),
    };

    let meta_command = raw
        .build
        .daps
        .meta
        .unwrap_or_else(|| DEFAULT_META_COMMAND.to_string());
    for placeholder in ["{dcfile}", "{output}"] {
        if !meta_command.contains(placeholder) {
            errors.push(format!("build.daps.meta: must contain {}", placeholder));
        }
    }

    let max_workers = match raw.build.max_workers {
        None => default_max_workers(),
        Some(n) if n >= 1 => n as usize,
        Some(n) => {
            errors.push(format!("build.max_workers: must be at least 1, got {}", n));
            1
        }
    };

    let container = raw.build.container.image.map(|image| ContainerConfig {
        runtime: raw
            .build
            .container
            .runtime
            .unwrap_or_else(|| DEFAULT_CONTAINER_RUNTIME.to_string()),
        image,
    });

    if !errors.is_empty() {
        return Err(Error::ConfigValidation { errors });
    }

    Ok(EnvConfig {
        paths,
        build: BuildConfig {
            meta_command,
            max_workers,
            container,
        },
    })
}

/// Parse, resolve and validate TOML content.
pub fn parse(content: &str) -> Result<EnvConfig> {
    let value: Value = toml::from_str(content)?;
    let resolved = replace_placeholders(&value)?;
    validate(&resolved)
}

/// Load the environment configuration from `path`.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<EnvConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Locate the environment configuration file.
///
/// An explicit path must exist. Otherwise [`ENV_CONFIG_FILENAME`] is looked
/// up in [`config_search_paths`].
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::ConfigParse {
                message: format!("Configuration file not found: {}", path.display()),
            })
        };
    }
    config_search_paths()
        .into_iter()
        .map(|dir| dir.join(ENV_CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| Error::ConfigParse {
            message: format!(
                "Could not find {} in the current directory or the configuration directories",
                ENV_CONFIG_FILENAME
            ),
        })
}
