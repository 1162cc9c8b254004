//! Loading and stitching of configuration fragments.
//!
//! Every fragment is parsed on its own, its `xi:include` directives are
//! expanded, and the resulting roots are appended in sorted path order under
//! a synthetic `<docservconfig>` element. The merged tree is then checked for
//! duplicate product ids and, optionally, for broken `<ref>` links.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::references::check_stitched_references;
use super::{parse_document, Element, Node, XINCLUDE_NS};
use crate::error::{Error, Result};

/// Name of the synthetic root element of a stitched tree.
pub const STITCH_ROOT: &str = "docservconfig";

/// Options for [`stitch`].
#[derive(Debug, Clone, Copy)]
pub struct StitchOptions {
    /// Fail on `<ref>` elements that point to missing targets.
    pub check_references: bool,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            check_references: true,
        }
    }
}

/// A successfully stitched tree plus the fragments that had to be left out.
#[derive(Debug)]
pub struct StitchReport {
    pub tree: StitchedTree,
    /// Fragments that failed to parse, with the reason.
    pub skipped: Vec<(PathBuf, Error)>,
}

/// Remote repository of every `(product, docset, language)` triple.
type RepositoryIndex = BTreeMap<(String, String, String), String>;

/// The merged configuration.
///
/// The owning repository of every language node is computed once when the
/// tree is built, so deliverables never walk back up the tree.
#[derive(Debug, Clone)]
pub struct StitchedTree {
    root: Element,
    repositories: RepositoryIndex,
}

impl StitchedTree {
    /// Wrap an already merged root and index its repositories.
    pub fn from_root(root: Element) -> Self {
        let repositories = index_repositories(&root);
        Self { root, repositories }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// All `<product>` elements in document order.
    pub fn products(&self) -> Vec<&Element> {
        self.root.descendants("product")
    }

    /// Look up a product by its `productid`.
    pub fn product(&self, productid: &str) -> Option<&Element> {
        self.products()
            .into_iter()
            .find(|p| p.attr("productid") == Some(productid))
    }

    /// Remote URL declared for the given language of a docset.
    pub fn remote_for(&self, product: &str, docset: &str, lang: &str) -> Option<&str> {
        self.repositories
            .get(&(product.to_string(), docset.to_string(), lang.to_string()))
            .map(String::as_str)
    }

    /// Every distinct remote URL in the configuration, sorted.
    pub fn remotes(&self) -> Vec<String> {
        self.repositories
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Serialize the stitched tree as indented XML.
    pub fn to_pretty_string(&self) -> String {
        self.root.to_pretty_string()
    }
}

fn index_repositories(root: &Element) -> RepositoryIndex {
    let mut index = RepositoryIndex::new();
    for product in root.descendants("product") {
        let Some(productid) = product.attr("productid") else {
            continue;
        };
        for docset in product.find_all("docset") {
            let Some(setid) = docset.attr("setid") else {
                continue;
            };
            for builddocs in docset.find_all("builddocs") {
                let shared = builddocs.find("git").and_then(|git| git.attr("remote"));
                for language in builddocs.find_all("language") {
                    let Some(lang) = language.attr("lang") else {
                        continue;
                    };
                    let remote = language
                        .find("git")
                        .and_then(|git| git.attr("remote"))
                        .or(shared);
                    if let Some(remote) = remote {
                        index.insert(
                            (productid.to_string(), setid.to_string(), lang.to_string()),
                            remote.trim().to_string(),
                        );
                    }
                }
            }
        }
    }
    index
}

/// Find all configuration fragments below `dir`.
///
/// A fragment is any `*.xml` file whose name starts with a lowercase letter.
/// The result is sorted so that callers see a stable order regardless of the
/// file system's enumeration order.
pub fn discover_fragments(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut fragments = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        let starts_lower = name.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        if starts_lower && name.ends_with(".xml") {
            fragments.push(entry.into_path());
        }
    }
    fragments.sort();
    debug!("Found {} fragments in {}", fragments.len(), dir.display());
    Ok(fragments)
}

/// Parse one fragment and expand its inclusion directives.
pub fn load_fragment(path: &Path) -> Result<Element> {
    let content = fs::read_to_string(path).map_err(|e| Error::XmlParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let mut root = parse_document(&content, path)?;
    let mut chain = vec![canonical(path)];
    expand_includes(&mut root, path, &mut chain)?;
    Ok(root)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn is_include(element: &Element) -> bool {
    element.local_name() == "include" && element.namespace.as_deref() == Some(XINCLUDE_NS)
}

/// Replace every `xi:include` below `element` with the referenced content.
///
/// `chain` holds the files currently being expanded, so a file that includes
/// itself (directly or indirectly) is reported instead of recursing forever.
fn expand_includes(element: &mut Element, current: &Path, chain: &mut Vec<PathBuf>) -> Result<()> {
    let children = std::mem::take(&mut element.children);
    let mut expanded = Vec::with_capacity(children.len());

    for child in children {
        match child {
            Node::Element(inner) if is_include(&inner) => {
                expanded.push(resolve_include(&inner, current, chain)?);
            }
            Node::Element(mut inner) => {
                expand_includes(&mut inner, current, chain)?;
                expanded.push(Node::Element(inner));
            }
            text => expanded.push(text),
        }
    }

    element.children = expanded;
    Ok(())
}

fn resolve_include(include: &Element, current: &Path, chain: &mut Vec<PathBuf>) -> Result<Node> {
    let fail = |href: &str, message: String| Error::Inclusion {
        href: href.to_string(),
        source_file: current.to_path_buf(),
        message,
    };

    let href = include
        .attr("href")
        .ok_or_else(|| fail("", "missing href attribute".to_string()))?;
    let base = current.parent().unwrap_or_else(|| Path::new("."));
    let target = base.join(href);

    let content = fs::read_to_string(&target).map_err(|e| fail(href, e.to_string()))?;

    if include.attr("parse") == Some("text") {
        return Ok(Node::Text(content));
    }

    let target_key = canonical(&target);
    if chain.contains(&target_key) {
        return Err(fail(href, "inclusion loop detected".to_string()));
    }

    let mut included = parse_document(&content, &target).map_err(|e| fail(href, e.to_string()))?;
    chain.push(target_key);
    let result = expand_includes(&mut included, &target, chain);
    chain.pop();
    result?;

    Ok(Node::Element(included))
}

/// Merge fragments into one tree.
///
/// Fragments that are not well-formed are logged and reported in
/// [`StitchReport::skipped`]. Inclusion failures, duplicate product ids and
/// (when enabled) broken references fail the whole stitch.
pub fn stitch(paths: &[PathBuf], options: StitchOptions) -> Result<StitchReport> {
    let mut ordered: Vec<PathBuf> = paths.to_vec();
    ordered.sort();
    ordered.dedup();
    let total = ordered.len();

    let parsed: Vec<(PathBuf, Result<Element>)> = ordered
        .into_par_iter()
        .map(|path| {
            let result = load_fragment(&path);
            (path, result)
        })
        .collect();

    let mut root = Element::new(STITCH_ROOT);
    let mut skipped = Vec::new();
    for (path, result) in parsed {
        match result {
            Ok(fragment) => root.push_child(fragment),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Skipping fragment {}: {}", path.display(), e);
                skipped.push((path, e));
            }
        }
    }

    check_unique_products(&root)?;

    if options.check_references {
        let messages = check_stitched_references(&root);
        if !messages.is_empty() {
            return Err(Error::UnresolvedReferences { messages });
        }
    }

    let tree = StitchedTree::from_root(root);
    info!(
        "Stitched {} products from {} fragments ({} skipped)",
        tree.products().len(),
        total - skipped.len(),
        skipped.len()
    );
    Ok(StitchReport { tree, skipped })
}

fn check_unique_products(root: &Element) -> Result<()> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for product in root.descendants("product") {
        if let Some(id) = product.attr("productid") {
            *counts.entry(id).or_default() += 1;
        }
    }

    let mut duplicates: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id.to_string())
        .collect();
    if duplicates.is_empty() {
        return Ok(());
    }
    duplicates.sort();
    Err(Error::StitchConflict { ids: duplicates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn product(id: &str) -> String {
        format!(
            r#"<product productid="{id}">
  <name>{id}</name>
  <docset setid="1" lifecycle="supported">
    <builddocs>
      <git remote="https://github.com/example/{id}.git"/>
      <language lang="en-us" default="1">
        <branch>main</branch>
        <deliverable><dc>DC-{id}</dc><format html="1"/></deliverable>
      </language>
    </builddocs>
  </docset>
</product>"#
        )
    }

    #[test]
    fn test_stitch_single_fragment_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "sles.xml", &product("sles"));

        let report = stitch(&[path], StitchOptions::default()).unwrap();
        assert!(report.skipped.is_empty());
        assert_eq!(report.tree.root().name, STITCH_ROOT);
        assert!(report.tree.product("sles").is_some());
    }

    #[test]
    fn test_stitch_duplicate_product_id_conflicts() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.xml", &product("sles"));
        let b = write(dir.path(), "b.xml", &product("sles"));

        let err = stitch(&[a, b], StitchOptions::default()).unwrap_err();
        match err {
            Error::StitchConflict { ids } => assert_eq!(ids, vec!["sles".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_stitch_skips_malformed_fragment() {
        let dir = TempDir::new().unwrap();
        let good = write(dir.path(), "good.xml", &product("sles"));
        let bad = write(dir.path(), "bad.xml", "<product productid=\"x\">");

        let report = stitch(&[good, bad.clone()], StitchOptions::default()).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, bad);
        assert_eq!(report.tree.products().len(), 1);
    }

    #[test]
    fn test_stitch_order_independent() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.xml", &product("alpha"));
        let b = write(dir.path(), "b.xml", &product("beta"));
        let c = write(dir.path(), "c.xml", &product("gamma"));

        let forward = stitch(&[a.clone(), b.clone(), c.clone()], StitchOptions::default()).unwrap();
        let backward = stitch(&[c, a, b], StitchOptions::default()).unwrap();
        assert_eq!(
            forward.tree.to_pretty_string(),
            backward.tree.to_pretty_string()
        );
    }

    #[test]
    fn test_include_is_expanded() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "docsets/sles-16.xml",
            r#"<docset setid="16" lifecycle="beta"><builddocs><git remote="gh://example/sles"/><language lang="en-us" default="1"><deliverable><dc>DC-new</dc></deliverable></language></builddocs></docset>"#,
        );
        let main = write(
            dir.path(),
            "sles.xml",
            r#"<product productid="sles" xmlns:xi="http://www.w3.org/2001/XInclude">
  <name>SLES</name>
  <xi:include href="docsets/sles-16.xml"/>
</product>"#,
        );

        let root = load_fragment(&main).unwrap();
        let docset = root.find("docset").unwrap();
        assert_eq!(docset.attr("setid"), Some("16"));
        assert!(root.find("include").is_none());
    }

    #[test]
    fn test_include_text() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "name.txt", "Included Name");
        let main = write(
            dir.path(),
            "p.xml",
            r#"<product productid="p" xmlns:xi="http://www.w3.org/2001/XInclude"><name><xi:include href="name.txt" parse="text"/></name></product>"#,
        );
        let root = load_fragment(&main).unwrap();
        assert_eq!(root.find_text("name").as_deref(), Some("Included Name"));
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let dir = TempDir::new().unwrap();
        let good = write(dir.path(), "good.xml", &product("sles"));
        let broken = write(
            dir.path(),
            "broken.xml",
            r#"<product productid="x" xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="nope.xml"/></product>"#,
        );

        let err = stitch(&[good, broken], StitchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Inclusion { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_include_loop_detected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "loop.xml",
            r#"<docset xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="loop.xml"/></docset>"#,
        );
        let main = write(
            dir.path(),
            "main.xml",
            r#"<product productid="p" xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="loop.xml"/></product>"#,
        );
        let err = load_fragment(&main).unwrap_err();
        assert!(err.to_string().contains("loop"));
    }

    #[test]
    fn test_broken_reference_fails_unless_disabled() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "sles.xml",
            r#"<product productid="sles"><docset setid="1"><internal><ref product="missing"/></internal></docset></product>"#,
        );

        let err = stitch(&[path.clone()], StitchOptions::default()).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReferences { .. }));

        let report = stitch(
            &[path],
            StitchOptions {
                check_references: false,
            },
        )
        .unwrap();
        assert!(report.tree.product("sles").is_some());
    }

    #[test]
    fn test_repository_index_prefers_language_remote() {
        let root = super::super::parse_str(
            r#"<docservconfig><product productid="p"><docset setid="1"><builddocs>
  <git remote="https://github.com/example/shared.git"/>
  <language lang="en-us" default="1"/>
  <language lang="de-de"><git remote="https://github.com/example/german.git"/></language>
</builddocs></docset></product></docservconfig>"#,
        )
        .unwrap();
        let tree = StitchedTree::from_root(root);

        assert_eq!(
            tree.remote_for("p", "1", "en-us"),
            Some("https://github.com/example/shared.git")
        );
        assert_eq!(
            tree.remote_for("p", "1", "de-de"),
            Some("https://github.com/example/german.git")
        );
        assert_eq!(tree.remote_for("p", "1", "fr-fr"), None);
        assert_eq!(tree.remotes().len(), 2);
    }

    #[test]
    fn test_discover_fragments_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "zeta.xml", "<a/>");
        write(dir.path(), "alpha.xml", "<a/>");
        write(dir.path(), "sub/beta.xml", "<a/>");
        write(dir.path(), "README.xml", "<a/>");
        write(dir.path(), "notes.txt", "x");

        let found = discover_fragments(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["alpha.xml", "sub/beta.xml", "zeta.xml"]);
    }
}
