//! # XML Configuration Trees
//!
//! Configuration fragments are small, so they are read completely into an
//! owned tree of [`Element`]s. The tree keeps attribute order and resolved
//! namespace URIs, which is all the stitcher and the resolver need.
//!
//! Lookups by child name compare the *local* name, so `<d:deliverable>` and
//! `<deliverable>` are found by the same query.
//!
//! ## Submodules
//!
//! - [`stitch`]: load fragments, resolve inclusions, merge under one root.
//! - [`references`]: validate `<ref>` links in the merged tree.
//! - [`checks`]: structural checks used by the `validate` command.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};

pub mod checks;
pub mod references;
pub mod stitch;
mod stitch_proptest;

/// Namespace URI of XInclude directives.
pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

/// A node in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written in the source, e.g. `xi:include`.
    pub name: String,
    /// Namespace URI the element's prefix resolved to, if any.
    pub namespace: Option<String>,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text content.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    /// The name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Look up an attribute by its exact name, falling back to its local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .or_else(|| {
                self.attributes
                    .iter()
                    .find(|(key, _)| !key.starts_with("xmlns") && local_part(key) == name)
            })
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Iterate over child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given local name.
    pub fn find_all<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.local_name() == local)
    }

    /// First child element with the given local name.
    pub fn find(&self, local: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local)
    }

    /// Trimmed text of the first child element with the given local name.
    pub fn find_text(&self, local: &str) -> Option<String> {
        self.find(local).map(|e| e.text().trim().to_string())
    }

    /// Concatenated text of this element and all its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// All descendant elements (excluding `self`) with the given local name,
    /// in document order.
    pub fn descendants<'a>(&'a self, local: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_descendants(self, local, &mut found);
        found
    }

    /// Serialize the element as an indented XML document.
    pub fn to_pretty_string(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_pretty(self, 0, &mut out);
        out
    }

    /// Serialize the element without any added whitespace.
    pub fn to_compact_string(&self) -> String {
        let mut out = String::new();
        write_compact(self, &mut out);
        out
    }

    /// Serialize only the children of this element, without added whitespace.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Element(element) => write_compact(element, &mut out),
                Node::Text(text) => out.push_str(&escape_text(text)),
            }
        }
        out
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map(|(_, local)| local).unwrap_or(name)
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(inner) => collect_text(inner, out),
        }
    }
}

fn collect_descendants<'a>(element: &'a Element, local: &str, found: &mut Vec<&'a Element>) {
    for child in element.elements() {
        if child.local_name() == local {
            found.push(child);
        }
        collect_descendants(child, local, found);
    }
}

/// Parse an XML string into its root element.
pub fn parse_str(xml: &str) -> Result<Element> {
    parse_document(xml, Path::new("<string>"))
}

/// Parse an XML document, reporting errors against `origin`.
///
/// Text inside the root is kept verbatim, whitespace included, so mixed
/// content survives serialization. Comments, processing instructions and the
/// XML declaration are not kept.
pub fn parse_document(xml: &str, origin: &Path) -> Result<Element> {
    let fail = |message: String| Error::XmlParse {
        path: origin.to_path_buf(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    // Namespace declarations per open element: (prefix, uri), "" for default.
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let (element, declared) = start_element(&e, &scopes).map_err(fail)?;
                scopes.push(declared);
                stack.push(element);
            }
            Ok(Event::Empty(e)) => {
                let (element, _) = start_element(&e, &scopes).map_err(fail)?;
                attach(element, &mut stack, &mut root).map_err(fail)?;
            }
            Ok(Event::End(_)) => {
                scopes.pop();
                let element = stack
                    .pop()
                    .ok_or_else(|| fail("unexpected closing tag".to_string()))?;
                attach(element, &mut stack, &mut root).map_err(fail)?;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| fail(err.to_string()))?;
                push_text(&text, &mut stack).map_err(fail)?;
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_text(&text, &mut stack).map_err(fail)?;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(fail(format!("at byte {}: {}", reader.buffer_position(), e))),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(fail(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| fail("document has no root element".to_string()))
}

fn start_element(
    e: &BytesStart<'_>,
    scopes: &[Vec<(String, String)>],
) -> std::result::Result<(Element, Vec<(String, String)>), String> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    let mut declared = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|err| err.to_string())?
            .into_owned();
        if key == "xmlns" {
            declared.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        }
        element.attributes.push((key, value));
    }

    let prefix = element
        .name
        .split_once(':')
        .map(|(prefix, _)| prefix)
        .unwrap_or("");
    element.namespace = declared
        .iter()
        .chain(scopes.iter().rev().flatten())
        .find(|(declared_prefix, _)| declared_prefix == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty());

    Ok((element, declared))
}

fn attach(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_child(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(format!(
            "more than one root element (second root is <{}>)",
            element.name
        )),
    }
}

fn push_text(text: &str, stack: &mut [Element]) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Text(text.to_string()));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err("text content outside of the root element".to_string()),
    }
}

fn is_blank(node: &Node) -> bool {
    matches!(node, Node::Text(text) if text.trim().is_empty())
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn write_open_tag(element: &Element, out: &mut String, self_closing: bool) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push_str(if self_closing { "/>" } else { ">" });
}

fn write_compact(element: &Element, out: &mut String) {
    if element.children.is_empty() {
        write_open_tag(element, out, true);
        return;
    }
    write_open_tag(element, out, false);
    out.push_str(&element.inner_xml());
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn write_pretty(element: &Element, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);

    let has_text = element
        .children
        .iter()
        .any(|c| matches!(c, Node::Text(_)) && !is_blank(c));
    if has_text {
        // Mixed or text-only content is kept on one line so that no
        // whitespace is introduced into it.
        write_compact(element, out);
        out.push('\n');
        return;
    }
    if element.elements().next().is_none() {
        write_open_tag(element, out, true);
        out.push('\n');
        return;
    }

    write_open_tag(element, out, false);
    out.push('\n');
    for child in element.elements() {
        write_pretty(child, depth + 1, out);
    }
    out.push_str(&indent);
    out.push_str("</");
    out.push_str(&element.name);
    out.push_str(">\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_document() {
        let root = parse_str(
            r#"<?xml version="1.0"?>
<product productid="sles">
  <name>SUSE Linux Enterprise Server</name>
  <docset setid="15-SP6" lifecycle="supported"/>
</product>"#,
        )
        .unwrap();

        assert_eq!(root.name, "product");
        assert_eq!(root.attr("productid"), Some("sles"));
        assert_eq!(
            root.find_text("name").as_deref(),
            Some("SUSE Linux Enterprise Server")
        );
        assert_eq!(root.find("docset").unwrap().attr("lifecycle"), Some("supported"));
        assert_eq!(root.elements().count(), 2);
    }

    #[test]
    fn test_parse_unescapes_entities() {
        let root = parse_str(r#"<category title="Tips &amp; Tricks">A &lt; B</category>"#).unwrap();
        assert_eq!(root.attr("title"), Some("Tips & Tricks"));
        assert_eq!(root.text(), "A < B");
    }

    #[test]
    fn test_parse_resolves_namespaces() {
        let root = parse_str(
            r#"<product xmlns:xi="http://www.w3.org/2001/XInclude" xmlns="urn:docserv">
  <xi:include href="docset.xml"/>
  <name>x</name>
</product>"#,
        )
        .unwrap();

        assert_eq!(root.namespace.as_deref(), Some("urn:docserv"));
        let include = root.find("include").unwrap();
        assert_eq!(include.namespace.as_deref(), Some(XINCLUDE_NS));
        assert_eq!(include.local_name(), "include");
        assert_eq!(root.find("name").unwrap().namespace.as_deref(), Some("urn:docserv"));
    }

    #[test]
    fn test_local_name_lookup_ignores_prefix() {
        let root = parse_str(
            r#"<d:product xmlns:d="urn:docserv"><d:docset d:setid="1"/></d:product>"#,
        )
        .unwrap();
        assert_eq!(root.local_name(), "product");
        let docset = root.find("docset").unwrap();
        assert_eq!(docset.attr("setid"), Some("1"));
    }

    #[test]
    fn test_parse_malformed_reports_path() {
        let err = parse_document("<product><name></product>", Path::new("bad.xml")).unwrap_err();
        match err {
            Error::XmlParse { path, .. } => assert_eq!(path, Path::new("bad.xml")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_unclosed_element_fails() {
        assert!(parse_str("<product><name>x</name>").is_err());
    }

    #[test]
    fn test_parse_empty_document_fails() {
        assert!(parse_str("   ").is_err());
    }

    #[test]
    fn test_parse_two_roots_fails() {
        assert!(parse_str("<a/><b/>").is_err());
    }

    #[test]
    fn test_descendants_in_document_order() {
        let root = parse_str(
            "<r><language><deliverable><dc>A</dc></deliverable></language>\
             <language><deliverable><dc>B</dc></deliverable></language></r>",
        )
        .unwrap();
        let dcs: Vec<String> = root
            .descendants("deliverable")
            .iter()
            .filter_map(|d| d.find_text("dc"))
            .collect();
        assert_eq!(dcs, vec!["A", "B"]);
    }

    #[test]
    fn test_pretty_string_round_trips() {
        let source = r#"<docservconfig><product productid="a &amp; b"><desc lang="en-us"><p>Some <b>bold</b> text</p></desc><docset setid="1"/></product></docservconfig>"#;
        let root = parse_str(source).unwrap();
        let pretty = root.to_pretty_string();

        assert!(pretty.starts_with("<?xml"));
        assert!(pretty.contains("\n  <product productid=\"a &amp; b\">\n"));
        assert!(pretty.contains("<p>Some <b>bold</b> text</p>"));
        assert_eq!(parse_str(&pretty).unwrap().to_pretty_string(), pretty);
    }

    #[test]
    fn test_whitespace_between_inline_elements_is_kept() {
        let root = parse_str("<p>Use <b>zypper</b> <i>install</i> now</p>").unwrap();
        assert_eq!(root.inner_xml(), "Use <b>zypper</b> <i>install</i> now");
        assert_eq!(root.text(), "Use zypper install now");
    }

    #[test]
    fn test_pretty_string_ignores_indentation_whitespace() {
        let root = parse_str("<product>\n  <docset setid=\"1\">\n  </docset>\n</product>").unwrap();
        assert_eq!(
            root.to_pretty_string(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<product>\n  <docset setid=\"1\"/>\n</product>\n"
        );
    }

    #[test]
    fn test_inner_xml_excludes_own_tag() {
        let root = parse_str("<desc><title>T</title><p>One &amp; two</p></desc>").unwrap();
        assert_eq!(root.inner_xml(), "<title>T</title><p>One &amp; two</p>");
    }

    #[test]
    fn test_set_attr_replaces_existing() {
        let mut element = Element::new("git").with_attr("remote", "a");
        element.set_attr("remote", "b");
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.attr("remote"), Some("b"));
    }
}
