//! XML Structure Parser
//! Author: kartik4905
//! Created: 2025-06-03 10:40:00 UTC
//!
//! Turns untrusted bytes into an [`XmlTree`]. Namespaces are resolved while
//! parsing, line endings and attribute values are normalized the way an XML
//! processor must before canonicalization, and DTDs are refused outright.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument};

use crate::error::ParseError;
use crate::structure::tree::{
    Attribute, Element, NamespaceDecl, NodeId, NodeKind, QualifiedName, XmlTree, XML_NS,
};

const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Default, Clone)]
pub struct ParserStatistics {
    pub elements_parsed: usize,
    pub text_nodes: usize,
    pub duration_ms: Option<u64>,
}

pub struct XmlParser {
    max_depth: usize,
    stats: ParserStatistics,
}

impl Default for XmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlParser {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            stats: ParserStatistics::default(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn statistics(&self) -> &ParserStatistics {
        &self.stats
    }

    #[instrument(skip(self, input), fields(len = input.len()))]
    pub fn parse(&mut self, input: &[u8]) -> Result<XmlTree, ParseError> {
        let start_time = std::time::Instant::now();
        let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
        std::str::from_utf8(input).map_err(|_| ParseError::Encoding)?;

        let mut reader = Reader::from_reader(input);
        reader.trim_text(false);
        reader.expand_empty_elements(false);
        reader.check_end_names(true);

        let mut tree = XmlTree::new();
        let mut open: Vec<NodeId> = Vec::new();
        let mut scopes: Vec<Vec<NamespaceDecl>> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| syntax(position, e.to_string()))?;

            match event {
                Event::Start(start) => {
                    let parent = self.element_parent(&tree, &open, position)?;
                    let element = build_element(&start, &mut scopes, position)?;
                    let id = tree.append(parent, NodeKind::Element(element));
                    open.push(id);
                    self.stats.elements_parsed += 1;
                    if open.len() > self.max_depth {
                        return Err(syntax(position, "nesting too deep".into()));
                    }
                }
                Event::Empty(start) => {
                    let parent = self.element_parent(&tree, &open, position)?;
                    let element = build_element(&start, &mut scopes, position)?;
                    scopes.pop();
                    tree.append(parent, NodeKind::Element(element));
                    self.stats.elements_parsed += 1;
                }
                Event::End(_) => {
                    open.pop();
                    scopes.pop();
                }
                Event::Text(text) => {
                    let raw = utf8(&text, position)?;
                    let normalized = normalize_line_endings(raw);
                    let value = quick_xml::escape::unescape(&normalized)
                        .map_err(|e| syntax(position, e.to_string()))?;
                    self.push_text(&mut tree, &open, &value, position)?;
                }
                Event::CData(cdata) => {
                    let raw = utf8(&cdata, position)?;
                    let value = normalize_line_endings(raw);
                    self.push_text(&mut tree, &open, &value, position)?;
                }
                Event::Comment(comment) => {
                    let raw = utf8(&comment, position)?;
                    let parent = open.last().copied().unwrap_or_else(|| tree.document());
                    tree.append(parent, NodeKind::Comment(normalize_line_endings(raw).into_owned()));
                }
                Event::PI(pi) => {
                    let raw = normalize_line_endings(utf8(&pi, position)?).into_owned();
                    let (target, data) = match raw.find(char::is_whitespace) {
                        Some(split) => (raw[..split].to_string(), raw[split..].trim_start().to_string()),
                        None => (raw.clone(), String::new()),
                    };
                    let parent = open.last().copied().unwrap_or_else(|| tree.document());
                    tree.append(parent, NodeKind::ProcessingInstruction { target, data });
                }
                Event::DocType(_) => return Err(ParseError::DoctypeRejected),
                Event::Decl(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        if !open.is_empty() {
            return Err(syntax(reader.buffer_position(), "unexpected end of input".into()));
        }
        if tree.root_element().is_none() {
            return Err(ParseError::NoRootElement);
        }

        self.stats.duration_ms = Some(start_time.elapsed().as_millis() as u64);
        debug!(
            elements = self.stats.elements_parsed,
            text_nodes = self.stats.text_nodes,
            "XML parsing completed"
        );
        Ok(tree)
    }

    fn element_parent(&self, tree: &XmlTree, open: &[NodeId], position: usize) -> Result<NodeId, ParseError> {
        match open.last() {
            Some(parent) => Ok(*parent),
            None if tree.root_element().is_some() => {
                Err(syntax(position, "more than one root element".into()))
            }
            None => Ok(tree.document()),
        }
    }

    fn push_text(
        &mut self,
        tree: &mut XmlTree,
        open: &[NodeId],
        value: &str,
        position: usize,
    ) -> Result<(), ParseError> {
        let Some(parent) = open.last().copied() else {
            if value.trim().is_empty() {
                return Ok(());
            }
            return Err(syntax(position, "character data outside the root element".into()));
        };

        // adjacent text and CDATA collapse into one text node
        if tree.append_text(parent, value) {
            return Ok(());
        }
        self.stats.text_nodes += 1;
        Ok(())
    }
}

/// Parses with default limits.
pub fn parse_xml(input: &[u8]) -> Result<XmlTree, ParseError> {
    XmlParser::new().parse(input)
}

fn syntax(position: usize, message: String) -> ParseError {
    ParseError::Syntax { position, message }
}

fn utf8(raw: &[u8], position: usize) -> Result<&str, ParseError> {
    std::str::from_utf8(raw).map_err(|_| syntax(position, "invalid UTF-8".into()))
}

fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn split_name(raw: &str) -> (Option<String>, String) {
    match raw.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
        None => (None, raw.to_string()),
    }
}

fn resolve(scopes: &[Vec<NamespaceDecl>], prefix: Option<&str>) -> Option<String> {
    if prefix == Some("xml") {
        return Some(XML_NS.to_string());
    }
    scopes
        .iter()
        .rev()
        .flat_map(|frame| frame.iter().rev())
        .find(|decl| decl.prefix.as_deref() == prefix)
        .map(|decl| decl.uri.clone())
        .filter(|uri| !uri.is_empty())
}

/// Reads one start tag. Pushes the element's namespace frame onto `scopes`;
/// the caller pops it when the element closes.
fn build_element(
    start: &BytesStart<'_>,
    scopes: &mut Vec<Vec<NamespaceDecl>>,
    position: usize,
) -> Result<Element, ParseError> {
    let raw_name = utf8(start.name().as_ref(), position)?.to_string();

    let mut namespaces = Vec::new();
    let mut raw_attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| syntax(position, e.to_string()))?;
        let key = utf8(attr.key.as_ref(), position)?.to_string();
        let raw_value = utf8(&attr.value, position)?;
        let normalized = normalize_line_endings(raw_value).replace(['\t', '\n'], " ");
        let value = quick_xml::escape::unescape(&normalized)
            .map_err(|e| syntax(position, e.to_string()))?
            .into_owned();

        if key == "xmlns" {
            namespaces.push(NamespaceDecl { prefix: None, uri: value });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            if value.is_empty() {
                return Err(syntax(position, format!("empty namespace for prefix {}", prefix)));
            }
            namespaces.push(NamespaceDecl {
                prefix: Some(prefix.to_string()),
                uri: value,
            });
        } else {
            raw_attributes.push((key, value));
        }
    }
    scopes.push(namespaces.clone());

    let (prefix, local) = split_name(&raw_name);
    let namespace = match prefix.as_deref() {
        Some(p) => Some(resolve(scopes, Some(p)).ok_or_else(|| ParseError::UnboundPrefix(p.to_string()))?),
        None => resolve(scopes, None),
    };

    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let (attr_prefix, attr_local) = split_name(&key);
        // unprefixed attributes never take the default namespace
        let attr_namespace = match attr_prefix.as_deref() {
            Some(p) => Some(resolve(scopes, Some(p)).ok_or_else(|| ParseError::UnboundPrefix(p.to_string()))?),
            None => None,
        };
        attributes.push(Attribute {
            name: QualifiedName {
                prefix: attr_prefix,
                local: attr_local,
                namespace: attr_namespace,
            },
            value,
        });
    }

    Ok(Element {
        name: QualifiedName { prefix, local, namespace },
        namespaces,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolves_namespaces() {
        let xml = br#"<a:root xmlns:a="urn:a" xmlns="urn:default"><child a:attr="1" plain="2"/></a:root>"#;
        let tree = parse_xml(xml).unwrap();
        let root = tree.root_element().unwrap();
        assert!(tree.is_element(root, "urn:a", "root"));

        let child = tree.find_child(root, "urn:default", "child").unwrap();
        let element = tree.element(child).unwrap();
        assert_eq!(element.attributes[0].name.namespace.as_deref(), Some("urn:a"));
        assert_eq!(element.attributes[1].name.namespace, None);
        assert_eq!(element.attribute("plain"), Some("2"));
    }

    #[test]
    fn test_rejects_doctype() {
        let xml = br#"<?xml version="1.0"?><!DOCTYPE r [<!ENTITY x "boom">]><r>&x;</r>"#;
        assert_eq!(parse_xml(xml).unwrap_err(), ParseError::DoctypeRejected);
    }

    #[test]
    fn test_rejects_unclosed_root() {
        assert!(matches!(parse_xml(b"<r><x></x>"), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_rejects_second_root() {
        assert!(matches!(parse_xml(b"<r/><s/>"), Err(ParseError::Syntax { .. })));
    }

    #[test]
    fn test_rejects_unbound_prefix() {
        assert_eq!(
            parse_xml(b"<p:r/>").unwrap_err(),
            ParseError::UnboundPrefix("p".to_string())
        );
    }

    #[test]
    fn test_normalizes_line_endings_and_attributes() {
        let xml = b"<r a=\"x\ty\r\nz&#xA;\">l1\r\nl2\rl3 &amp; <![CDATA[<raw>]]></r>";
        let tree = parse_xml(xml).unwrap();
        let root = tree.root_element().unwrap();
        assert_eq!(tree.element(root).unwrap().attribute("a"), Some("x y z\n"));
        assert_eq!(tree.text(root), "l1\nl2\nl3 & <raw>");
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        assert_eq!(parse_xml(b"<r>\xff</r>").unwrap_err(), ParseError::Encoding);
    }
}
