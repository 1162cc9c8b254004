//! Resolution of doctypes into deliverables.
//!
//! The resolver walks `product > docset > builddocs > language > deliverable`
//! and keeps every node that the doctype selects. Repository remotes come
//! from the index built at stitch time rather than from walking back up the
//! tree.

use std::collections::HashSet;

use log::{debug, warn};

use crate::deliverable::{Deliverable, Formats, DEFAULT_LANG};
use crate::doctype::Doctype;
use crate::repo::Repo;
use crate::xml::checks::is_enabled;
use crate::xml::references::is_default;
use crate::xml::stitch::StitchedTree;
use crate::xml::Element;

/// Branch used when neither a language nor the default language names one.
pub const DEFAULT_BRANCH: &str = "main";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_formats(format: &Element) -> Formats {
    let flag = |name: &str| format.attr(name).is_some_and(is_enabled);
    Formats {
        html: flag("html"),
        single_html: flag("single-html"),
        pdf: flag("pdf"),
        epub: flag("epub"),
    }
}

/// Formats of a deliverable; translations without their own `<format>` use
/// the one of the English deliverable with the same DC file.
fn formats_for(deliverable: &Element, builddocs: &Element, dc: &str) -> Formats {
    if let Some(format) = deliverable.find("format") {
        return parse_formats(format);
    }
    let fallback = builddocs
        .find_all("language")
        .filter(|l| l.attr("lang") == Some(DEFAULT_LANG))
        .flat_map(|l| l.find_all("deliverable"))
        .find(|d| d.find_text("dc").as_deref() == Some(dc))
        .and_then(|d| d.find("format"));
    match fallback {
        Some(format) => parse_formats(format),
        None => {
            debug!("No <format> for {}, building HTML only", dc);
            Formats {
                html: true,
                ..Default::default()
            }
        }
    }
}

/// All deliverables the doctype selects, in document order.
///
/// Deliverables without a DC file or without a usable repository are logged
/// and left out.
pub fn resolve(tree: &StitchedTree, doctype: &Doctype) -> Vec<Deliverable> {
    let mut deliverables = Vec::new();

    for product in tree.products() {
        let Some(productid) = product.attr("productid") else {
            continue;
        };
        if !doctype.matches_product(productid) {
            continue;
        }

        for docset in product.find_all("docset") {
            let Some(setid) = docset.attr("setid") else {
                continue;
            };
            if !doctype.matches_docset(setid, docset.attr("lifecycle")) {
                continue;
            }

            for builddocs in docset.find_all("builddocs") {
                let default_branch = builddocs
                    .find_all("language")
                    .find(|l| is_default(l))
                    .and_then(|l| non_empty(l.find_text("branch")));

                for language in builddocs.find_all("language") {
                    let Some(lang) = language.attr("lang").map(str::trim) else {
                        continue;
                    };
                    if !doctype.matches_lang(lang) {
                        continue;
                    }
                    resolve_language(
                        tree,
                        (productid, setid, lang),
                        language,
                        builddocs,
                        default_branch.as_deref(),
                        &mut deliverables,
                    );
                }
            }
        }
    }

    debug!("Doctype {} resolved to {} deliverables", doctype, deliverables.len());
    deliverables
}

fn resolve_language(
    tree: &StitchedTree,
    (productid, setid, lang): (&str, &str, &str),
    language: &Element,
    builddocs: &Element,
    default_branch: Option<&str>,
    out: &mut Vec<Deliverable>,
) {
    let branch = non_empty(language.find_text("branch"))
        .or_else(|| default_branch.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
    let subdir = language.find_text("subdir").unwrap_or_default();
    let remote = tree.remote_for(productid, setid, lang);

    for node in language.find_all("deliverable") {
        let Some(dcfile) = non_empty(node.find_text("dc")) else {
            warn!(
                "Skipping deliverable without <dc> in {}/{}/{}",
                productid, setid, lang
            );
            continue;
        };
        let Some(remote) = remote else {
            warn!(
                "Skipping {}/{}/{}:{}: no git remote declared",
                productid, setid, lang, dcfile
            );
            continue;
        };
        let repo = match Repo::parse(remote) {
            Ok(repo) => repo,
            Err(e) => {
                warn!("Skipping {}/{}/{}:{}: {}", productid, setid, lang, dcfile, e);
                continue;
            }
        };

        out.push(Deliverable {
            productid: productid.to_string(),
            docsetid: setid.to_string(),
            lang: lang.to_string(),
            lang_is_default: is_default(language),
            branch: branch.clone(),
            subdir: subdir.clone(),
            formats: formats_for(node, builddocs, &dcfile),
            dcfile,
            repo,
        });
    }
}

/// Resolve several doctypes into one list without duplicates.
///
/// A deliverable selected by more than one doctype appears once, at the
/// position of its first occurrence.
pub fn resolve_all(tree: &StitchedTree, doctypes: &[Doctype]) -> Vec<Deliverable> {
    let mut seen = HashSet::new();
    doctypes
        .iter()
        .flat_map(|doctype| resolve(tree, doctype))
        .filter(|d| seen.insert(d.full_id()))
        .collect()
}
