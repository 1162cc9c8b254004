//! Structural checks on a stitched tree.
//!
//! Each check inspects the whole tree and returns a [`CheckResult`]. The
//! `validate` command runs all of them through [`run_all_checks`].

use std::collections::BTreeMap;

use super::references::is_default;
use super::Element;

/// Outcome of one structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub success: bool,
    pub messages: Vec<String>,
}

impl CheckResult {
    fn from_messages(name: &'static str, messages: Vec<String>) -> Self {
        Self {
            name,
            success: messages.is_empty(),
            messages,
        }
    }
}

/// Signature shared by every check.
pub type CheckFn = fn(&Element) -> CheckResult;

/// All registered checks, in the order they are run.
pub const CHECKS: &[(&str, CheckFn)] = &[
    ("dc_in_language", check_dc_in_language),
    ("duplicated_categoryid", check_duplicated_categoryid),
    ("duplicated_linkid", check_duplicated_linkid),
    ("enabled_format", check_enabled_format),
    ("format_subdeliverable", check_format_subdeliverable),
    ("lang_code_in_category", check_lang_code_in_category),
    ("lang_code_in_desc", check_lang_code_in_desc),
    ("lang_code_in_docset", check_lang_code_in_docset),
    ("valid_languages", check_valid_languages),
];

/// Run every registered check against `root`.
pub fn run_all_checks(root: &Element) -> Vec<CheckResult> {
    CHECKS.iter().map(|(_, check)| check(root)).collect()
}

/// Whether a format attribute value counts as enabled.
pub fn is_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Values that occur more than once, sorted.
fn duplicates<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(value, _)| value)
        .collect()
}

/// Whether `lang` has the `xx-yy` shape used for language codes.
pub fn is_valid_language(lang: &str) -> bool {
    match lang.split_once('-') {
        Some((language, region)) => [language, region]
            .iter()
            .all(|part| part.len() == 2 && part.bytes().all(|b| b.is_ascii_lowercase())),
        None => false,
    }
}

/// Each DC file may appear only once within a language.
pub fn check_dc_in_language(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for docset in root.descendants("docset") {
        let setid = docset.attr("setid").unwrap_or("n/a");
        for language in docset.descendants("language") {
            let dcs: Vec<String> = language
                .find_all("deliverable")
                .filter_map(|d| d.find_text("dc"))
                .collect();
            let dupes = duplicates(dcs.iter().map(String::as_str));
            if !dupes.is_empty() {
                messages.push(format!(
                    "Duplicated dc elements in docset={} language={}: {}",
                    setid,
                    language.attr("lang").unwrap_or("n/a"),
                    dupes.join(", ")
                ));
            }
        }
    }
    CheckResult::from_messages("dc_in_language", messages)
}

/// Category ids must be unique within a product.
pub fn check_duplicated_categoryid(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for product in root.descendants("product") {
        let ids = product
            .find_all("category")
            .filter_map(|c| c.attr("categoryid"));
        let dupes = duplicates(ids);
        if !dupes.is_empty() {
            messages.push(format!(
                "Non-unique categoryid values in product={}: {}",
                product.attr("productid").unwrap_or("n/a"),
                dupes.join(", ")
            ));
        }
    }
    CheckResult::from_messages("duplicated_categoryid", messages)
}

/// External link ids must be unique within a docset.
pub fn check_duplicated_linkid(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for docset in root.descendants("docset") {
        let links: Vec<&Element> = docset
            .descendants("external")
            .into_iter()
            .flat_map(|e| e.find_all("link"))
            .collect();
        let dupes = duplicates(links.iter().filter_map(|l| l.attr("linkid")));
        if !dupes.is_empty() {
            messages.push(format!(
                "Non-unique linkid values in docset={}: {}",
                docset.attr("setid").unwrap_or("n/a"),
                dupes.join(", ")
            ));
        }
    }
    CheckResult::from_messages("duplicated_linkid", messages)
}

/// A `<format>` element must enable at least one output format.
pub fn check_enabled_format(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for docset in root.descendants("docset") {
        for deliverable in docset.descendants("deliverable") {
            let Some(format) = deliverable.find("format") else {
                continue;
            };
            if !format.attributes.iter().any(|(_, value)| is_enabled(value)) {
                messages.push(format!(
                    "No enabled format found in docset={} for deliverable={}",
                    docset.attr("setid").unwrap_or("n/a"),
                    deliverable.find_text("dc").unwrap_or_default()
                ));
            }
        }
    }
    CheckResult::from_messages("enabled_format", messages)
}

/// Deliverables with subdeliverables can only be built as HTML.
pub fn check_format_subdeliverable(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for docset in root.descendants("docset") {
        for language in docset.descendants("language") {
            for deliverable in language.find_all("deliverable") {
                if deliverable.find("subdeliverable").is_none() {
                    continue;
                }
                let enabled = |name: &str| {
                    deliverable
                        .find("format")
                        .and_then(|f| f.attr(name))
                        .is_some_and(is_enabled)
                };
                if enabled("pdf") || enabled("epub") {
                    messages.push(format!(
                        "A deliverable with subdeliverables has PDF or EPUB enabled: \
                         docset={}/language={}/deliverable={}",
                        docset.attr("setid").unwrap_or("n/a"),
                        language.attr("lang").unwrap_or("n/a"),
                        deliverable.find_text("dc").unwrap_or_default()
                    ));
                }
            }
        }
    }
    CheckResult::from_messages("format_subdeliverable", messages)
}

/// Each category translation language appears once per category.
pub fn check_lang_code_in_category(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for category in root.descendants("category") {
        let dupes = duplicates(category.find_all("language").filter_map(|l| l.attr("lang")));
        if !dupes.is_empty() {
            messages.push(format!(
                "Category '{}' has non-unique translation languages: {}",
                category.attr("categoryid").unwrap_or("n/a"),
                dupes.join(", ")
            ));
        }
    }
    CheckResult::from_messages("lang_code_in_category", messages)
}

/// Each product has at most one `<desc>` per language.
pub fn check_lang_code_in_desc(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for product in root.descendants("product") {
        let dupes = duplicates(product.find_all("desc").filter_map(|d| d.attr("lang")));
        if !dupes.is_empty() {
            messages.push(format!(
                "Non-unique <desc> languages in product={}: {}",
                product.attr("productid").unwrap_or("n/a"),
                dupes.join(", ")
            ));
        }
    }
    CheckResult::from_messages("lang_code_in_desc", messages)
}

/// Each docset declares a build language at most once, and has exactly one
/// default language when it declares any.
pub fn check_lang_code_in_docset(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    for docset in root.descendants("docset") {
        let setid = docset.attr("setid").unwrap_or("n/a");
        let languages: Vec<&Element> = docset
            .find_all("builddocs")
            .flat_map(|b| b.find_all("language"))
            .collect();
        let dupes = duplicates(languages.iter().filter_map(|l| l.attr("lang")));
        if !dupes.is_empty() {
            messages.push(format!(
                "Duplicated builddocs/language in docset={}: {}",
                setid,
                dupes.join(", ")
            ));
        }
        let defaults = languages.iter().filter(|l| is_default(l)).count();
        if !languages.is_empty() && defaults != 1 {
            messages.push(format!(
                "Docset={} must have exactly one default language, found {}",
                setid, defaults
            ));
        }
    }
    CheckResult::from_messages("lang_code_in_docset", messages)
}

/// Every `lang` attribute in the tree is a valid language code.
pub fn check_valid_languages(root: &Element) -> CheckResult {
    let mut messages = Vec::new();
    let mut elements = vec![root];
    while let Some(element) = elements.pop() {
        if element.local_name() != "ref" {
            if let Some(lang) = element.attr("lang") {
                if !is_valid_language(lang) {
                    messages.push(format!(
                        "Invalid language code '{}' on <{}>",
                        lang,
                        element.local_name()
                    ));
                }
            }
        }
        elements.extend(element.elements());
    }
    messages.sort();
    CheckResult::from_messages("valid_languages", messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    fn valid_tree() -> Element {
        parse_str(
            r#"<docservconfig>
  <product productid="sles">
    <desc lang="en-us" default="1"><title>SLES</title></desc>
    <category categoryid="admin"><language lang="en-us" default="1" title="Admin"/></category>
    <category categoryid="deploy"><language lang="en-us" default="1" title="Deploy"/></category>
    <docset setid="15">
      <builddocs>
        <git remote="gh://SUSE/doc-sle"/>
        <language lang="en-us" default="1">
          <deliverable><dc>DC-a</dc><format html="1" pdf="0"/></deliverable>
          <deliverable><dc>DC-b</dc><format html="1"/><subdeliverable>x</subdeliverable></deliverable>
        </language>
        <language lang="de-de"><deliverable><dc>DC-a</dc></deliverable></language>
      </builddocs>
    </docset>
  </product>
</docservconfig>"#,
        )
        .unwrap()
    }

    #[test]
    fn test_all_checks_pass_on_valid_tree() {
        let results = run_all_checks(&valid_tree());
        assert_eq!(results.len(), CHECKS.len());
        for result in results {
            assert!(result.success, "{}: {:?}", result.name, result.messages);
        }
    }

    #[test]
    fn test_duplicate_dc_in_language() {
        let root = parse_str(
            r#"<product productid="p"><docset setid="1"><builddocs><language lang="en-us" default="1">
<deliverable><dc>DC-foo</dc></deliverable><deliverable><dc>DC-foo</dc></deliverable>
</language></builddocs></docset></product>"#,
        )
        .unwrap();
        let result = check_dc_in_language(&root);
        assert!(!result.success);
        assert!(result.messages[0].contains("DC-foo"));
        assert!(result.messages[0].contains("docset=1"));
    }

    #[test]
    fn test_duplicate_categoryid_is_per_product() {
        let root = parse_str(
            r#"<docservconfig>
<product productid="a"><category categoryid="c"/></product>
<product productid="b"><category categoryid="c"/><category categoryid="c"/></product>
</docservconfig>"#,
        )
        .unwrap();
        let result = check_duplicated_categoryid(&root);
        assert_eq!(result.messages.len(), 1);
        assert!(result.messages[0].contains("product=b"));
    }

    #[test]
    fn test_all_formats_disabled() {
        let root = parse_str(
            r#"<docset setid="1"><builddocs><language lang="en-us" default="1">
<deliverable><dc>DC-off</dc><format html="0" pdf="false"/></deliverable>
</language></builddocs></docset>"#,
        )
        .unwrap();
        // The docset is the root here, so it is not among its own descendants.
        let wrapped = Element::new("product").with_child(root);
        let result = check_enabled_format(&wrapped);
        assert!(!result.success);
        assert!(result.messages[0].contains("DC-off"));
    }

    #[test]
    fn test_subdeliverable_with_pdf() {
        let root = parse_str(
            r#"<product><docset setid="1"><builddocs><language lang="en-us" default="1">
<deliverable><dc>DC-all</dc><format html="1" pdf="1"/><subdeliverable>a</subdeliverable></deliverable>
</language></builddocs></docset></product>"#,
        )
        .unwrap();
        assert!(!check_format_subdeliverable(&root).success);
    }

    #[test]
    fn test_docset_language_checks() {
        let root = parse_str(
            r#"<product><docset setid="1"><builddocs>
<language lang="en-us" default="1"/><language lang="en-us"/><language lang="de-de" default="1"/>
</builddocs></docset></product>"#,
        )
        .unwrap();
        let result = check_lang_code_in_docset(&root);
        assert_eq!(result.messages.len(), 2);
    }

    #[test]
    fn test_invalid_language_code() {
        let root = parse_str(r#"<product><desc lang="en_US"/><desc lang="de-de"/></product>"#).unwrap();
        let result = check_valid_languages(&root);
        assert_eq!(result.messages.len(), 1);
        assert!(result.messages[0].contains("en_US"));
    }

    #[test]
    fn test_is_enabled_values() {
        for value in ["1", "true", "TRUE", "on", "yes"] {
            assert!(is_enabled(value), "{value}");
        }
        for value in ["0", "false", "off", "", "no"] {
            assert!(!is_enabled(value), "{value}");
        }
    }
}
