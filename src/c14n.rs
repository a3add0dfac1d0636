//! XML Canonicalization (C14N 1.0, C14N 1.1, Exclusive C14N)
//! Author: kartik4905
//! Created: 2025-06-04
//!
//! Serializes an element subtree, or a whole document, into the canonical
//! octet stream that XML-DSig digests and signs. The input is always a full
//! subtree; XPath-selected node sets are not supported.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::structure::tree::{NodeId, NodeKind, XmlTree, XML_NS};

pub const C14N_10: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const C14N_10_WITH_COMMENTS: &str =
    "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments";
pub const C14N_11: &str = "http://www.w3.org/2006/12/xml-c14n11";
pub const C14N_11_WITH_COMMENTS: &str = "http://www.w3.org/2006/12/xml-c14n11#WithComments";
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum C14nVariant {
    Inclusive10,
    Inclusive11,
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C14nMethod {
    pub variant: C14nVariant,
    pub with_comments: bool,
    /// `InclusiveNamespaces PrefixList` of exclusive C14N; `#default` names
    /// the default namespace.
    pub inclusive_prefixes: Vec<String>,
}

impl Default for C14nMethod {
    fn default() -> Self {
        Self::inclusive()
    }
}

impl C14nMethod {
    /// Canonical XML 1.0 without comments, the XML-DSig default for
    /// converting a node set to octets.
    pub fn inclusive() -> Self {
        Self {
            variant: C14nVariant::Inclusive10,
            with_comments: false,
            inclusive_prefixes: Vec::new(),
        }
    }

    pub fn exclusive() -> Self {
        Self {
            variant: C14nVariant::Exclusive,
            with_comments: false,
            inclusive_prefixes: Vec::new(),
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        let (variant, with_comments) = match uri {
            C14N_10 => (C14nVariant::Inclusive10, false),
            C14N_10_WITH_COMMENTS => (C14nVariant::Inclusive10, true),
            C14N_11 => (C14nVariant::Inclusive11, false),
            C14N_11_WITH_COMMENTS => (C14nVariant::Inclusive11, true),
            EXC_C14N => (C14nVariant::Exclusive, false),
            EXC_C14N_WITH_COMMENTS => (C14nVariant::Exclusive, true),
            _ => return None,
        };
        Some(Self {
            variant,
            with_comments,
            inclusive_prefixes: Vec::new(),
        })
    }

    pub fn uri(&self) -> &'static str {
        match (self.variant, self.with_comments) {
            (C14nVariant::Inclusive10, false) => C14N_10,
            (C14nVariant::Inclusive10, true) => C14N_10_WITH_COMMENTS,
            (C14nVariant::Inclusive11, false) => C14N_11,
            (C14nVariant::Inclusive11, true) => C14N_11_WITH_COMMENTS,
            (C14nVariant::Exclusive, false) => EXC_C14N,
            (C14nVariant::Exclusive, true) => EXC_C14N_WITH_COMMENTS,
        }
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.inclusive_prefixes = prefixes;
        self
    }

    pub fn without_comments(&self) -> Self {
        Self {
            with_comments: false,
            ..self.clone()
        }
    }
}

type Rendered = BTreeMap<Option<String>, String>;

/// Canonicalizes `node`, which is either the document node or an element.
/// Detached subtrees are skipped.
pub fn canonicalize(tree: &XmlTree, node: NodeId, method: &C14nMethod) -> Vec<u8> {
    let mut canonicalizer = Canonicalizer {
        tree,
        method,
        out: String::new(),
    };
    match tree.kind(node) {
        NodeKind::Document => canonicalizer.document(node),
        NodeKind::Element(_) => canonicalizer.element(node, &Rendered::new(), true),
        _ => canonicalizer.leaf(node),
    }
    canonicalizer.out.into_bytes()
}

struct Canonicalizer<'a> {
    tree: &'a XmlTree,
    method: &'a C14nMethod,
    out: String,
}

impl<'a> Canonicalizer<'a> {
    fn document(&mut self, document: NodeId) {
        let mut after_root = false;
        for child in self.tree.children(document).iter().copied() {
            match self.tree.kind(child) {
                NodeKind::Element(_) => {
                    self.element(child, &Rendered::new(), true);
                    after_root = true;
                }
                NodeKind::Comment(_) if !self.method.with_comments => {}
                NodeKind::Comment(_) | NodeKind::ProcessingInstruction { .. } => {
                    if after_root {
                        self.out.push('\n');
                    }
                    self.leaf(child);
                    if !after_root {
                        self.out.push('\n');
                    }
                }
                _ => {}
            }
        }
    }

    fn leaf(&mut self, node: NodeId) {
        match self.tree.kind(node) {
            NodeKind::Text(text) => escape_text(text, &mut self.out),
            NodeKind::Comment(text) if self.method.with_comments => {
                self.out.push_str("<!--");
                self.out.push_str(text);
                self.out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                self.out.push_str("<?");
                self.out.push_str(target);
                if !data.is_empty() {
                    self.out.push(' ');
                    self.out.push_str(data);
                }
                self.out.push_str("?>");
            }
            _ => {}
        }
    }

    fn element(&mut self, node: NodeId, rendered: &Rendered, apex: bool) {
        let Some(element) = self.tree.element(node) else {
            return;
        };
        let in_scope = self.tree.in_scope_namespaces(node);

        let emitted = match self.method.variant {
            C14nVariant::Exclusive => self.exclusive_namespaces(node, &in_scope, rendered),
            _ => inclusive_namespaces(&in_scope, rendered),
        };

        let mut attributes: Vec<(String, String, String, String)> = element
            .attributes
            .iter()
            .map(|a| {
                (
                    a.name.namespace.clone().unwrap_or_default(),
                    a.name.local.clone(),
                    a.name.qname(),
                    a.value.clone(),
                )
            })
            .collect();

        if apex && self.method.variant != C14nVariant::Exclusive {
            for (local, value) in self.tree.inherited_xml_attributes(node) {
                let inheritable = match self.method.variant {
                    C14nVariant::Inclusive11 => local == "lang" || local == "space",
                    _ => true,
                };
                let overridden = attributes
                    .iter()
                    .any(|(ns, l, _, _)| ns == XML_NS && *l == local);
                if inheritable && !overridden {
                    attributes.push((XML_NS.to_string(), local.clone(), format!("xml:{}", local), value));
                }
            }
        }
        attributes.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

        let qname = element.name.qname();
        self.out.push('<');
        self.out.push_str(&qname);
        for (prefix, uri) in &emitted {
            match prefix {
                Some(prefix) => {
                    self.out.push_str(" xmlns:");
                    self.out.push_str(prefix);
                }
                None => self.out.push_str(" xmlns"),
            }
            self.out.push_str("=\"");
            escape_attribute(uri, &mut self.out);
            self.out.push('"');
        }
        for (_, _, name, value) in &attributes {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            escape_attribute(value, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');

        let mut next = rendered.clone();
        next.extend(emitted);
        for child in self.tree.children(node).iter().copied() {
            match self.tree.kind(child) {
                NodeKind::Element(_) => self.element(child, &next, false),
                _ => self.leaf(child),
            }
        }

        self.out.push_str("</");
        self.out.push_str(&qname);
        self.out.push('>');
    }

    fn exclusive_namespaces(
        &self,
        node: NodeId,
        in_scope: &BTreeMap<Option<String>, String>,
        rendered: &Rendered,
    ) -> Rendered {
        let mut utilized: BTreeSet<Option<String>> = BTreeSet::new();
        if let Some(element) = self.tree.element(node) {
            utilized.insert(element.name.prefix.clone());
            for attr in &element.attributes {
                if let Some(prefix) = &attr.name.prefix {
                    if prefix != "xml" {
                        utilized.insert(Some(prefix.clone()));
                    }
                }
            }
        }
        for prefix in &self.method.inclusive_prefixes {
            if prefix == "#default" {
                utilized.insert(None);
            } else if in_scope.contains_key(&Some(prefix.clone())) {
                utilized.insert(Some(prefix.clone()));
            }
        }

        let mut emitted = Rendered::new();
        for prefix in utilized {
            let uri = in_scope.get(&prefix).cloned().unwrap_or_default();
            let current = rendered.get(&prefix).cloned().unwrap_or_default();
            if uri != current {
                emitted.insert(prefix, uri);
            }
        }
        emitted
    }
}

fn inclusive_namespaces(in_scope: &BTreeMap<Option<String>, String>, rendered: &Rendered) -> Rendered {
    let mut emitted = Rendered::new();
    for (prefix, uri) in in_scope {
        if prefix.as_deref() == Some("xml") {
            continue;
        }
        if rendered.get(prefix) != Some(uri) {
            emitted.insert(prefix.clone(), uri.clone());
        }
    }
    let default_rendered = rendered.get(&None).map_or(false, |uri| !uri.is_empty());
    if !in_scope.contains_key(&None) && default_rendered {
        emitted.insert(None, String::new());
    }
    emitted
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
}
