//! # Deliverables
//!
//! A [`Deliverable`] is one concrete unit of work: one DC file of one
//! product, docset and language, found in one repository and branch. It is
//! created by [`crate::resolve`] and never changes afterwards; every derived
//! identifier and output path is computed from its fields on demand.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::repo::Repo;

/// Language whose output paths carry no language prefix.
pub const DEFAULT_LANG: &str = "en-us";

/// Output formats requested for a deliverable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Formats {
    pub html: bool,
    pub single_html: bool,
    pub pdf: bool,
    pub epub: bool,
}

impl Formats {
    pub fn any(&self) -> bool {
        self.html || self.single_html || self.pdf || self.epub
    }
}

/// One resolved unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub productid: String,
    pub docsetid: String,
    /// Language and country, e.g. `de-de`.
    pub lang: String,
    /// Whether `lang` is the docset's default language.
    pub lang_is_default: bool,
    pub branch: String,
    /// Subdirectory of the repository holding the DC file; may be empty.
    pub subdir: String,
    /// Name of the DC file, e.g. `DC-SLES-admin`.
    pub dcfile: String,
    pub repo: Repo,
    pub formats: Formats,
}

impl Deliverable {
    /// Language without its country part, e.g. `de` for `de-de`.
    pub fn language(&self) -> &str {
        self.lang
            .split(['-', '_'])
            .next()
            .unwrap_or(self.lang.as_str())
    }

    /// `product/docset`
    pub fn product_docset(&self) -> String {
        format!("{}/{}", self.productid, self.docsetid)
    }

    /// `product/docset/lang`
    pub fn pdlang(&self) -> String {
        format!("{}/{}", self.product_docset(), self.lang)
    }

    /// `product/docset/lang:dcfile`
    pub fn pdlangdc(&self) -> String {
        format!("{}:{}", self.pdlang(), self.dcfile)
    }

    /// Identifier unique across branches, used for logging and de-duplication.
    pub fn full_id(&self) -> String {
        format!(
            "{}/{}/{}:{}",
            self.product_docset(),
            make_safe_name(&self.branch),
            self.lang,
            self.dcfile
        )
    }

    /// DC file name without its `DC-` prefix.
    pub fn rootid(&self) -> &str {
        self.dcfile.strip_prefix("DC-").unwrap_or(&self.dcfile)
    }

    /// `lang/product/docset`, the directory of this deliverable's artifact
    /// relative to the metadata cache.
    pub fn relpath(&self) -> PathBuf {
        Path::new(&self.lang)
            .join(&self.productid)
            .join(&self.docsetid)
    }

    /// Location of the JSON artifact below `meta_cache_dir`.
    pub fn artifact_path(&self, meta_cache_dir: &Path) -> PathBuf {
        meta_cache_dir.join(self.relpath()).join(&self.dcfile)
    }

    /// Path of the DC file inside a checkout.
    pub fn dc_path(&self) -> PathBuf {
        if self.subdir.is_empty() {
            PathBuf::from(&self.dcfile)
        } else {
            Path::new(&self.subdir).join(&self.dcfile)
        }
    }

    /// Same as [`Self::dc_path`], but always with `/` separators, as listed
    /// by `git ls-tree`.
    pub fn repo_file(&self) -> String {
        let subdir = self.subdir.trim_matches('/');
        if subdir.is_empty() {
            self.dcfile.clone()
        } else {
            format!("{}/{}", subdir, self.dcfile)
        }
    }

    fn lang_prefix(&self) -> String {
        if self.lang == DEFAULT_LANG {
            "/".to_string()
        } else {
            format!("/{}/", self.lang)
        }
    }

    fn format_path(&self, format: &str) -> String {
        format!(
            "{}{}/{}/{}/{}/",
            self.lang_prefix(),
            self.productid,
            self.docsetid,
            format,
            self.rootid()
        )
    }

    /// Published path of the HTML output.
    pub fn html_path(&self) -> String {
        self.format_path("html")
    }

    /// Published path of the single-HTML output.
    pub fn single_html_path(&self) -> String {
        self.format_path("single-html")
    }

    /// Published path of the PDF output.
    pub fn pdf_path(&self) -> String {
        format!(
            "{}{}/pdf/{}_{}.pdf",
            self.lang_prefix(),
            self.product_docset(),
            self.rootid(),
            self.language()
        )
    }

    /// Path of the per-language archive.
    pub fn zip_path(&self) -> String {
        format!(
            "{lang}/{p}/{d}/{p}-{d}-{lang}.zip",
            lang = self.lang,
            p = self.productid,
            d = self.docsetid
        )
    }
}

impl fmt::Display for Deliverable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_id())
    }
}

/// Make `name` usable as a single file or directory name.
pub fn make_safe_name(name: &str) -> String {
    name.chars()
        .filter_map(|c| match c {
            '/' | '*' | '?' => Some('_'),
            ':' => Some('-'),
            '<' | '>' | '\\' => None,
            other => Some(other),
        })
        .collect()
}
