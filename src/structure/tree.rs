//! Arena-backed XML tree shared by the DCC model and the signature engine
//! Author: kartik4905
//! Created: 2025-06-03 10:20:00 UTC

use std::collections::BTreeMap;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Prefix, local part and resolved namespace of an element or attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub prefix: Option<String>,
    pub local: String,
    pub namespace: Option<String>,
}

impl QualifiedName {
    /// The name as written in the source, `prefix:local` or `local`.
    pub fn qname(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local),
            None => self.local.clone(),
        }
    }

    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.local == local && self.namespace.as_deref() == Some(namespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QualifiedName,
    pub value: String,
}

/// A namespace declaration as written on an element. An empty `uri` with no
/// prefix is `xmlns=""`, which undeclares the default namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: QualifiedName,
    pub namespaces: Vec<NamespaceDecl>,
    pub attributes: Vec<Attribute>,
}

impl Element {
    /// Value of an unqualified attribute.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.prefix.is_none() && a.name.local == local)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction { target: String, data: String },
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    detached: bool,
}

/// Parsed XML document. Node 0 is the document node.
///
/// Detaching a subtree unlinks it from its parent's child list but keeps the
/// parent pointer, so the detached part still resolves the namespaces and
/// `xml:*` attributes it inherited at parse time.
#[derive(Debug, Clone)]
pub struct XmlTree {
    nodes: Vec<Node>,
}

impl Default for XmlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
                detached: false,
            }],
        }
    }

    pub fn document(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub(crate) fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            detached: false,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Appends character data to `parent`, extending its last child when that
    /// is already a text node. Returns true when an existing node was extended.
    pub(crate) fn append_text(&mut self, parent: NodeId, value: &str) -> bool {
        if let Some(last) = self.nodes[parent.0].children.last().copied() {
            if let NodeKind::Text(existing) = &mut self.nodes[last.0].kind {
                existing.push_str(value);
                return true;
            }
        }
        self.append(parent, NodeKind::Text(value.to_string()));
        false
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.element(*child).is_some())
    }

    pub fn root_element(&self) -> Option<NodeId> {
        self.child_elements(self.document()).next()
    }

    pub fn is_element(&self, id: NodeId, namespace: &str, local: &str) -> bool {
        self.element(id).map_or(false, |e| e.name.is(namespace, local))
    }

    pub fn find_child(&self, id: NodeId, namespace: &str, local: &str) -> Option<NodeId> {
        self.child_elements(id)
            .find(|child| self.is_element(*child, namespace, local))
    }

    pub fn find_children(&self, id: NodeId, namespace: &str, local: &str) -> Vec<NodeId> {
        self.child_elements(id)
            .filter(|child| self.is_element(*child, namespace, local))
            .collect()
    }

    /// Follows a path of child element names in one namespace.
    pub fn find_path(&self, id: NodeId, namespace: &str, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(id, |current, local| self.find_child(current, namespace, local))
    }

    /// `id` followed by every attached node below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Every element with the given name anywhere in the arena, detached
    /// subtrees included, in document order.
    pub fn elements_named(&self, namespace: &str, local: &str) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|id| self.is_element(*id, namespace, local))
            .collect()
    }

    /// Every element in the arena, detached subtrees included.
    pub fn all_elements(&self) -> impl Iterator<Item = (NodeId, &Element)> + '_ {
        self.nodes.iter().enumerate().filter_map(|(index, node)| match &node.kind {
            NodeKind::Element(element) => Some((NodeId(index), element)),
            _ => None,
        })
    }

    /// Concatenated character data below `id`.
    pub fn text(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| match self.kind(node) {
                NodeKind::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Trimmed text of a child element, `None` when the child is missing or blank.
    pub fn child_text(&self, id: NodeId, namespace: &str, local: &str) -> Option<String> {
        let child = self.find_child(id, namespace, local)?;
        let text = self.text(child);
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Unlinks `id` from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
        self.nodes[id.0].detached = true;
    }

    pub fn is_detached(&self, id: NodeId) -> bool {
        self.nodes[id.0].detached
    }

    /// True when `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Prefix bindings visible at `id`. The default namespace is keyed by
    /// `None`; an undeclared default is absent from the map.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<Option<String>, String> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }

        let mut scope = BTreeMap::new();
        for node in chain.into_iter().rev() {
            if let Some(element) = self.element(node) {
                for decl in &element.namespaces {
                    scope.insert(decl.prefix.clone(), decl.uri.clone());
                }
            }
        }
        scope.retain(|_, uri| !uri.is_empty());
        scope
    }

    /// `xml:*` attributes declared on the ancestors of `id` (nearest wins),
    /// keyed by local name.
    pub fn inherited_xml_attributes(&self, id: NodeId) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            if let Some(element) = self.element(node) {
                for attr in &element.attributes {
                    if attr.name.namespace.as_deref() == Some(XML_NS) {
                        out.entry(attr.name.local.clone())
                            .or_insert_with(|| attr.value.clone());
                    }
                }
            }
            current = self.parent(node);
        }
        out
    }
}
