//! # Manifest Aggregation
//!
//! After the deliverables of a run are built, every product/docset pair that
//! the requested doctypes select gets one manifest: product metadata from the
//! stitched tree plus every per-deliverable JSON artifact found for it in the
//! metadata cache.
//!
//! Manifests are always written from scratch. Given the same tree and the
//! same artifacts, the output is byte-identical, including the text
//! normalization applied to descriptions and category titles.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkdir::WalkDir;

use crate::doctype::Doctype;
use crate::error::{Error, Result};
use crate::xml::references::is_default;
use crate::xml::stitch::StitchedTree;
use crate::xml::{Element, Node};

/// Paragraph appended to every product description.
pub const DESCRIPTION_TAIL: &str = "<p>The default view of this page is the \u{2018}Table of Contents\u{2019} sorting order. To search for a particular document, you can narrow down the results using the \u{2018}Filter as you type\u{2019} option. It dynamically filters the document titles and descriptions for what you enter.</p>";

/// The aggregated description of one product docset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub productname: String,
    pub acronym: String,
    pub version: String,
    pub lifecycle: String,
    pub descriptions: Vec<Description>,
    pub categories: Vec<Category>,
    pub documents: Vec<Document>,
    pub archives: Vec<Value>,
}

/// A localized product description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub lang: String,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// XHTML fragment.
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub rank: u32,
    pub translations: Vec<CategoryTranslation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTranslation {
    pub lang: String,
    pub default: bool,
    pub title: String,
}

/// One per-deliverable artifact, as written by the build tool and patched by
/// the processor. Fields this crate does not interpret are kept as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub docs: Vec<DocEntry>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocEntry {
    pub dcfile: String,
    pub lang: String,
    pub format: DocFormat,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocFormat {
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf: Option<String>,
    #[serde(rename = "single-html", skip_serializing_if = "Option::is_none")]
    pub single_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epub: Option<String>,
}

impl Document {
    /// Parse and validate one artifact file.
    pub fn load(path: &Path) -> Result<Self> {
        let invalid = |message: String| Error::Artifact {
            path: path.to_path_buf(),
            message,
        };
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Err(invalid("file is empty".to_string()));
        }
        let document: Document =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        if document.docs.is_empty() {
            return Err(invalid("\"docs\" is empty".to_string()));
        }
        Ok(document)
    }
}

/// Hands out category ranks. One counter covers exactly one product.
#[derive(Debug, Default)]
pub struct RankCounter(u32);

impl RankCounter {
    pub fn next_rank(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

fn is_entity(rest: &str) -> bool {
    let Some(end) = rest.find(';') else {
        return false;
    };
    let body = &rest[..end];
    if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
        !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit())
    } else if let Some(dec) = body.strip_prefix('#') {
        !dec.is_empty() && dec.chars().all(|c| c.is_ascii_digit())
    } else {
        !body.is_empty() && body.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

/// Encode every `&` that does not already start an entity reference.
pub fn escape_ampersands(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.char_indices() {
        if c == '&' && !is_entity(&text[index + 1..]) {
            out.push_str("&amp;");
        } else {
            out.push(c);
        }
    }
    out
}

/// Normalize a description fragment. Applying it twice changes nothing.
pub fn normalize_description(description: &str) -> String {
    let mut normalized = escape_ampersands(description);
    if !normalized.contains(DESCRIPTION_TAIL) {
        normalized.push_str(DESCRIPTION_TAIL);
    }
    normalized
}

/// Strip one trailing `.0` from a docset id.
pub fn version_string(docset: &str) -> String {
    docset.strip_suffix(".0").unwrap_or(docset).to_string()
}

fn descriptions(product: &Element) -> Vec<Description> {
    product
        .find_all("desc")
        .map(|desc| {
            let mut body = desc.clone();
            body.children
                .retain(|node| !matches!(node, Node::Element(e) if e.local_name() == "title"));
            Description {
                lang: desc.attr("lang").unwrap_or_default().to_string(),
                default: is_default(desc),
                title: desc.find_text("title"),
                description: normalize_description(body.inner_xml().trim()),
            }
        })
        .collect()
}

fn categories(product: &Element, ranks: &mut RankCounter) -> Vec<Category> {
    product
        .find_all("category")
        .map(|category| {
            let mut translations: Vec<CategoryTranslation> = category
                .find_all("language")
                .map(|language| CategoryTranslation {
                    lang: language.attr("lang").unwrap_or_default().to_string(),
                    default: is_default(language),
                    title: escape_ampersands(language.attr("title").unwrap_or_default()),
                })
                .collect();
            // Stable sort: default translation first, document order otherwise.
            translations.sort_by_key(|t| !t.default);
            Category {
                category_id: category.attr("categoryid").unwrap_or_default().to_string(),
                rank: ranks.next_rank(),
                translations,
            }
        })
        .collect()
}

/// Build the manifest of one product docset from the tree and the given
/// artifact files. Artifacts that are empty or invalid are logged and
/// skipped.
pub fn build_manifest(
    product: &Element,
    docset: &Element,
    artifacts: &[PathBuf],
) -> Manifest {
    let productid = product.attr("productid").unwrap_or_default();
    let setid = docset.attr("setid").unwrap_or_default();

    let mut ranks = RankCounter::default();
    let mut documents = Vec::new();
    for artifact in artifacts {
        match Document::load(artifact) {
            Ok(document) => documents.push(document),
            Err(e) => error!("Error reading metadata file {}: {}", artifact.display(), e),
        }
    }

    Manifest {
        productname: product
            .find_text("name")
            .unwrap_or_else(|| productid.to_string()),
        acronym: product
            .find_text("acronym")
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| productid.to_uppercase()),
        version: version_string(setid),
        lifecycle: docset.attr("lifecycle").unwrap_or_default().to_string(),
        descriptions: descriptions(product),
        categories: categories(product, &mut ranks),
        documents,
        archives: Vec::new(),
    }
}

/// Every `(product, docset)` pair selected by the doctypes, sorted.
pub fn manifest_targets(tree: &StitchedTree, doctypes: &[Doctype]) -> Vec<(String, String)> {
    let mut targets = BTreeSet::new();
    for doctype in doctypes {
        for product in tree.products() {
            let Some(productid) = product.attr("productid") else {
                continue;
            };
            if !doctype.matches_product(productid) {
                continue;
            }
            for docset in product.find_all("docset") {
                if let Some(setid) = docset.attr("setid") {
                    if doctype.matches_docset(setid, docset.attr("lifecycle")) {
                        targets.insert((productid.to_string(), setid.to_string()));
                    }
                }
            }
        }
    }
    targets.into_iter().collect()
}

/// Find the artifacts of one product docset below `meta_cache_dir`.
///
/// An artifact is a file named `DC-*` whose path below the cache contains
/// both the product and the docset as directory names, compared without
/// regard to case. The result is sorted.
pub fn collect_artifacts(meta_cache_dir: &Path, product: &str, docset: &str) -> Vec<PathBuf> {
    let product = product.to_lowercase();
    let docset = docset.to_lowercase();
    let mut found: Vec<PathBuf> = WalkDir::new(meta_cache_dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("DC-"))
        .filter(|entry| {
            let relative = entry
                .path()
                .strip_prefix(meta_cache_dir)
                .unwrap_or(entry.path());
            let dirs: Vec<String> = relative
                .parent()
                .map(|parent| {
                    parent
                        .components()
                        .filter_map(|c| match c {
                            Component::Normal(part) => Some(part.to_string_lossy().to_lowercase()),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            dirs.contains(&product) && dirs.contains(&docset)
        })
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}

/// Path of the manifest for one product docset.
pub fn manifest_path(meta_cache_dir: &Path, product: &str, docset: &str) -> PathBuf {
    meta_cache_dir.join(product).join(format!("{}.json", docset))
}

/// Write `manifest` as indented JSON, replacing any previous file.
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}

/// Write one manifest per product docset selected by `doctypes` that has at
/// least one artifact. Returns the written files.
pub fn aggregate(
    tree: &StitchedTree,
    doctypes: &[Doctype],
    meta_cache_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (productid, setid) in manifest_targets(tree, doctypes) {
        let artifacts = collect_artifacts(meta_cache_dir, &productid, &setid);
        if artifacts.is_empty() {
            info!("No metadata found for {}/{}, skipping manifest", productid, setid);
            continue;
        }

        let Some(product) = tree.product(&productid) else {
            warn!("Product {} vanished from the configuration", productid);
            continue;
        };
        let Some(docset) = product
            .find_all("docset")
            .find(|d| d.attr("setid") == Some(setid.as_str()))
        else {
            continue;
        };

        let manifest = build_manifest(product, docset, &artifacts);
        let path = manifest_path(meta_cache_dir, &productid, &setid);
        write_manifest(&path, &manifest)?;
        info!(
            "Wrote {} with {} documents",
            path.display(),
            manifest.documents.len()
        );
        written.push(path);
    }
    Ok(written)
}
