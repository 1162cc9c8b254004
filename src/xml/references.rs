//! Validation of `<ref>` links in a stitched tree.
//!
//! A `<ref>` points at a product, a docset, a deliverable, a subdeliverable
//! or an external link. Deliverable and link targets are looked up in the
//! default language of the target docset only.

use super::Element;

/// Which kind of target a `<ref>` element names.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefTarget<'a> {
    Subdeliverable {
        product: &'a str,
        docset: &'a str,
        dc: &'a str,
        subdeliverable: &'a str,
    },
    Deliverable {
        product: &'a str,
        docset: &'a str,
        dc: &'a str,
    },
    Link {
        product: &'a str,
        docset: &'a str,
        link: &'a str,
    },
    Docset {
        product: &'a str,
        docset: &'a str,
    },
    Product {
        product: &'a str,
    },
    Invalid,
}

impl<'a> RefTarget<'a> {
    fn classify(element: &'a Element) -> Self {
        let get = |name: &str| element.attr(name).filter(|v| !v.is_empty());
        match (
            get("product"),
            get("docset"),
            get("dc"),
            get("subdeliverable"),
            get("link"),
        ) {
            (Some(product), Some(docset), Some(dc), Some(subdeliverable), _) => {
                RefTarget::Subdeliverable {
                    product,
                    docset,
                    dc,
                    subdeliverable,
                }
            }
            (Some(product), Some(docset), Some(dc), None, _) => RefTarget::Deliverable {
                product,
                docset,
                dc,
            },
            (Some(product), Some(docset), None, _, Some(link)) => RefTarget::Link {
                product,
                docset,
                link,
            },
            (Some(product), Some(docset), None, _, None) => RefTarget::Docset { product, docset },
            (Some(product), None, ..) => RefTarget::Product { product },
            _ => RefTarget::Invalid,
        }
    }
}

/// Whether a `default` attribute marks the default language.
pub fn is_default(element: &Element) -> bool {
    matches!(element.attr("default"), Some("1") | Some("true"))
}

fn find_docset<'a>(root: &'a Element, product: &str, docset: &str) -> Option<&'a Element> {
    root.descendants("product")
        .into_iter()
        .filter(|p| p.attr("productid") == Some(product))
        .flat_map(|p| p.find_all("docset"))
        .find(|d| d.attr("setid") == Some(docset))
}

fn default_languages<'a>(docset: &'a Element) -> impl Iterator<Item = &'a Element> + 'a {
    docset
        .find_all("builddocs")
        .flat_map(|b| b.find_all("language"))
        .filter(|l| is_default(l))
}

fn default_deliverables<'a>(docset: &'a Element, dc: &'a str) -> Vec<&'a Element> {
    default_languages(docset)
        .flat_map(|l| l.find_all("deliverable"))
        .filter(|d| d.find_text("dc").as_deref() == Some(dc))
        .collect()
}

/// `product/docset` of the context a ref appears in.
fn origin(product: Option<&Element>, docset: Option<&Element>) -> String {
    format!(
        "{}/{}",
        product.and_then(|p| p.attr("productid")).unwrap_or(""),
        docset.and_then(|d| d.attr("setid")).unwrap_or("")
    )
}

fn check_ref(root: &Element, reference: &Element, origin: &str) -> Option<String> {
    match RefTarget::classify(reference) {
        RefTarget::Subdeliverable {
            product,
            docset,
            dc,
            subdeliverable,
        } => {
            let found = find_docset(root, product, docset)
                .map(|d| {
                    default_deliverables(d, dc).iter().any(|deliverable| {
                        deliverable
                            .find_all("subdeliverable")
                            .any(|s| s.text().trim() == subdeliverable)
                    })
                })
                .unwrap_or(false);
            (!found).then(|| {
                format!(
                    "Failed reference from '{origin}' to {product}/{docset}:{dc}#{subdeliverable}: \
                     Referenced subdeliverable does not exist."
                )
            })
        }
        RefTarget::Deliverable {
            product,
            docset,
            dc,
        } => {
            let candidates = find_docset(root, product, docset)
                .map(|d| default_deliverables(d, dc))
                .unwrap_or_default();
            if candidates
                .iter()
                .any(|d| d.find("subdeliverable").is_none())
            {
                None
            } else if candidates.is_empty() {
                Some(format!(
                    "Failed reference from '{origin}' to {product}/{docset}:{dc}: \
                     Referenced deliverable does not exist."
                ))
            } else {
                Some(format!(
                    "Failed reference from '{origin}' to {product}/{docset}:{dc}: \
                     Referenced deliverable has subdeliverables, \
                     you must choose a subdeliverable in your reference."
                ))
            }
        }
        RefTarget::Link {
            product,
            docset,
            link,
        } => {
            let found = find_docset(root, product, docset)
                .map(|d| {
                    default_languages(d)
                        .flat_map(|l| l.find_all("external"))
                        .flat_map(|e| e.find_all("link"))
                        .any(|l| l.attr("linkid") == Some(link))
                })
                .unwrap_or(false);
            (!found).then(|| {
                format!(
                    "Failed reference from '{origin}' to {product}/{docset}@{link}: \
                     Referenced external link does not exist."
                )
            })
        }
        RefTarget::Docset { product, docset } => {
            find_docset(root, product, docset).is_none().then(|| {
                format!(
                    "Failed reference from '{origin}' to {product}/{docset}: \
                     Referenced docset does not exist."
                )
            })
        }
        RefTarget::Product { product } => root
            .descendants("product")
            .iter()
            .all(|p| p.attr("productid") != Some(product))
            .then(|| {
                format!(
                    "Failed reference from '{origin}' to {product}: \
                     Referenced product does not exist."
                )
            }),
        RefTarget::Invalid => Some(format!(
            "Reference failed in '{origin}': a <ref> needs at least a product attribute."
        )),
    }
}

fn walk<'a>(
    root: &Element,
    element: &'a Element,
    product: Option<&'a Element>,
    docset: Option<&'a Element>,
    errors: &mut Vec<String>,
) {
    for child in element.elements() {
        match child.local_name() {
            "product" => walk(root, child, Some(child), None, errors),
            "docset" => walk(root, child, product, Some(child), errors),
            "ref" => {
                if let Some(message) = check_ref(root, child, &origin(product, docset)) {
                    errors.push(message);
                }
            }
            _ => walk(root, child, product, docset, errors),
        }
    }
}

/// Check every `<ref>` in the tree and return one message per broken link,
/// in document order.
pub fn check_stitched_references(root: &Element) -> Vec<String> {
    let mut errors = Vec::new();
    walk(root, root, None, None, &mut errors);
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    fn tree_with_refs(refs: &str) -> Element {
        parse_str(&format!(
            r#"<docservconfig>
  <product productid="sles">
    <docset setid="15">
      <builddocs>
        <language lang="en-us" default="1">
          <deliverable><dc>DC-admin</dc></deliverable>
          <deliverable>
            <dc>DC-all</dc>
            <subdeliverable>book-a</subdeliverable>
          </deliverable>
          <external><link linkid="release-notes"/></external>
        </language>
        <language lang="de-de">
          <deliverable><dc>DC-german-only</dc></deliverable>
        </language>
      </builddocs>
    </docset>
  </product>
  <product productid="suma">
    <docset setid="4.3">
      <internal>{refs}</internal>
    </docset>
  </product>
</docservconfig>"#
        ))
        .unwrap()
    }

    #[test]
    fn test_valid_references_pass() {
        let root = tree_with_refs(
            r#"<ref product="sles"/>
<ref product="sles" docset="15"/>
<ref product="sles" docset="15" dc="DC-admin"/>
<ref product="sles" docset="15" dc="DC-all" subdeliverable="book-a"/>
<ref product="sles" docset="15" link="release-notes"/>"#,
        );
        assert!(check_stitched_references(&root).is_empty());
    }

    #[test]
    fn test_missing_product() {
        let root = tree_with_refs(r#"<ref product="sled"/>"#);
        let errors = check_stitched_references(&root);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'suma/4.3'"));
        assert!(errors[0].contains("Referenced product does not exist"));
    }

    #[test]
    fn test_missing_docset() {
        let root = tree_with_refs(r#"<ref product="sles" docset="12"/>"#);
        let errors = check_stitched_references(&root);
        assert!(errors[0].contains("Referenced docset does not exist"));
    }

    #[test]
    fn test_deliverable_only_in_non_default_language() {
        let root = tree_with_refs(r#"<ref product="sles" docset="15" dc="DC-german-only"/>"#);
        let errors = check_stitched_references(&root);
        assert!(errors[0].contains("Referenced deliverable does not exist"));
    }

    #[test]
    fn test_deliverable_with_subdeliverables_needs_subdeliverable() {
        let root = tree_with_refs(r#"<ref product="sles" docset="15" dc="DC-all"/>"#);
        let errors = check_stitched_references(&root);
        assert!(errors[0].contains("you must choose a subdeliverable"));
    }

    #[test]
    fn test_missing_subdeliverable_and_link() {
        let root = tree_with_refs(
            r#"<ref product="sles" docset="15" dc="DC-all" subdeliverable="book-z"/>
<ref product="sles" docset="15" link="nope"/>"#,
        );
        let errors = check_stitched_references(&root);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("#book-z"));
        assert!(errors[1].contains("@nope"));
    }

    #[test]
    fn test_ref_without_product_is_reported() {
        let root = tree_with_refs(r#"<ref docset="15"/>"#);
        assert_eq!(check_stitched_references(&root).len(), 1);
    }
}
