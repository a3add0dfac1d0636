//! DCC document model
//! Author: kartik4905
//! Created: 2025-06-03 13:00:00 UTC
//!
//! Owned view of the administrative content of a Digital Calibration
//! Certificate, extracted once from the parsed tree. Every field is optional
//! so that a partially broken document stays inspectable.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ParseError;
use crate::structure::{NodeId, NodeKind, XmlTree};

pub const DCC_NS: &str = "https://ptb.de/dcc";
pub const DCC_ROOT: &str = "digitalCalibrationCertificate";

/// Text in a given language (`dcc:content lang="..."`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalizedText {
    pub lang: Option<String>,
    pub text: String,
}

/// One `dcc:identification` of a calibration item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identification {
    pub issuer: Option<String>,
    pub value: Option<String>,
    pub names: Vec<LocalizedText>,
}

impl Identification {
    fn matches(&self, name: &str, lang: Option<&str>, issuer: Option<&str>) -> bool {
        if issuer.is_some() && self.issuer.as_deref() != issuer {
            return false;
        }
        self.names
            .iter()
            .any(|n| n.text == name && (lang.is_none() || n.lang.as_deref() == lang))
    }
}

/// Owned copy of an element subtree, for content returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ContentNode {
    pub name: String,
    pub namespace: Option<String>,
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    pub fn from_tree(tree: &XmlTree, node: NodeId) -> Option<Self> {
        let element = tree.element(node)?;
        let mut text = String::new();
        let mut children = Vec::new();
        for child in tree.children(node) {
            match tree.kind(*child) {
                NodeKind::Text(value) => text.push_str(value),
                NodeKind::Element(_) => children.extend(Self::from_tree(tree, *child)),
                _ => {}
            }
        }
        let text = text.trim();

        Some(Self {
            name: element.name.local.clone(),
            namespace: element.name.namespace.clone(),
            attributes: element
                .attributes
                .iter()
                .map(|a| (a.name.qname(), a.value.clone()))
                .collect(),
            text: (!text.is_empty()).then(|| text.to_string()),
            children,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&ContentNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First node in this subtree (self included, preorder) whose `refType`
    /// list contains `ref_type`.
    pub fn find_ref_type(&self, ref_type: &str) -> Option<&ContentNode> {
        if self
            .attribute("refType")
            .map_or(false, |types| types.split_whitespace().any(|t| t == ref_type))
        {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_ref_type(ref_type))
    }
}

/// A `dcc:metaData` element with its reference types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaDataEntry {
    pub ref_types: Vec<String>,
    pub content: ContentNode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DccDocument {
    pub uid: Option<String>,
    pub version: Option<String>,
    pub mandatory_languages: Vec<String>,
    pub used_languages: Vec<String>,
    pub begin_performance_date: Option<NaiveDate>,
    pub end_performance_date: Option<NaiveDate>,
    pub laboratory_name: Option<String>,
    pub previous_report: Option<String>,
    pub item_identifications: Vec<Identification>,
    pub metadata: Vec<MetaDataEntry>,
}

impl DccDocument {
    /// Extracts the model from a parsed tree.
    ///
    /// Never fails outright: the returned list holds every structural problem
    /// found (wrong root, missing mandatory element, invalid date), and the
    /// document is loaded only when that list is empty.
    pub fn extract(tree: &XmlTree) -> (Self, Vec<ParseError>) {
        let mut doc = Self::default();
        let mut problems = Vec::new();

        let Some(root) = tree.root_element() else {
            problems.push(ParseError::NoRootElement);
            return (doc, problems);
        };
        if !tree.is_element(root, DCC_NS, DCC_ROOT) {
            let name = tree.element(root).map(|e| e.name.qname()).unwrap_or_default();
            problems.push(ParseError::UnexpectedRoot(name));
            return (doc, problems);
        }

        doc.version = tree
            .element(root)
            .and_then(|e| e.attribute("schemaVersion"))
            .map(str::to_string);

        let admin = tree.find_child(root, DCC_NS, "administrativeData");
        let core = admin.and_then(|a| tree.find_child(a, DCC_NS, "coreData"));

        if let Some(core) = core {
            doc.uid = tree.child_text(core, DCC_NS, "uniqueIdentifier");
            doc.mandatory_languages = texts(tree, core, "mandatoryLangCodeISO639_1");
            doc.used_languages = texts(tree, core, "usedLangCodeISO639_1");
            doc.begin_performance_date = date(tree, core, "beginPerformanceDate", &mut problems);
            doc.end_performance_date = date(tree, core, "endPerformanceDate", &mut problems);
            doc.previous_report = tree.find_child(core, DCC_NS, "previousReport").and_then(|report| {
                tree.child_text(report, DCC_NS, "referenceID").or_else(|| {
                    let text = tree.text(report);
                    let text = text.trim();
                    (!text.is_empty()).then(|| text.to_string())
                })
            });
        }

        if let Some(admin) = admin {
            doc.laboratory_name = tree
                .find_path(admin, DCC_NS, &["calibrationLaboratory", "contact", "name"])
                .and_then(|name| first_content(tree, name));

            if let Some(items) = tree.find_child(admin, DCC_NS, "items") {
                for item in tree.find_children(items, DCC_NS, "item") {
                    if let Some(ids) = tree.find_child(item, DCC_NS, "identifications") {
                        for id in tree.find_children(ids, DCC_NS, "identification") {
                            doc.item_identifications.push(identification(tree, id));
                        }
                    }
                }
            }
        }

        doc.metadata = tree
            .descendants(root)
            .into_iter()
            .filter(|node| tree.is_element(*node, DCC_NS, "metaData"))
            .filter_map(|node| ContentNode::from_tree(tree, node))
            .map(|content| MetaDataEntry {
                ref_types: content
                    .attribute("refType")
                    .map(|t| t.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                content,
            })
            .collect();

        if doc.uid.is_none() {
            problems.push(ParseError::MissingElement("coreData/uniqueIdentifier".into()));
        }
        if doc.version.is_none() {
            problems.push(ParseError::MissingElement("@schemaVersion".into()));
        }
        if doc.mandatory_languages.is_empty() {
            problems.push(ParseError::MissingElement("coreData/mandatoryLangCodeISO639_1".into()));
        }

        (doc, problems)
    }

    pub fn mandatory_language(&self) -> Option<&str> {
        self.mandatory_languages.first().map(String::as_str)
    }

    /// Value of the first identification whose localized name is `name`,
    /// optionally restricted to a language and an issuer.
    pub fn item_id_by_name(&self, name: &str, lang: Option<&str>, issuer: Option<&str>) -> Option<&str> {
        self.item_identifications
            .iter()
            .find(|id| id.matches(name, lang, issuer))
            .and_then(|id| id.value.as_deref())
    }

    pub fn metadata_by_ref_type(&self, ref_type: &str) -> Option<&ContentNode> {
        self.metadata
            .iter()
            .find(|entry| entry.ref_types.iter().any(|t| t == ref_type))
            .map(|entry| &entry.content)
    }
}

fn texts(tree: &XmlTree, parent: NodeId, local: &str) -> Vec<String> {
    tree.find_children(parent, DCC_NS, local)
        .into_iter()
        .map(|node| tree.text(node).trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

/// `xs:date`, ignoring a trailing zone designator.
fn date(tree: &XmlTree, parent: NodeId, local: &str, problems: &mut Vec<ParseError>) -> Option<NaiveDate> {
    let text = tree.child_text(parent, DCC_NS, local)?;
    let day = text.get(..10).unwrap_or(text.as_str());
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            problems.push(ParseError::InvalidValue {
                field: local.to_string(),
                value: text,
            });
            None
        }
    }
}

fn localized(tree: &XmlTree, parent: NodeId) -> Vec<LocalizedText> {
    tree.find_children(parent, DCC_NS, "content")
        .into_iter()
        .map(|content| LocalizedText {
            lang: tree
                .element(content)
                .and_then(|e| e.attribute("lang"))
                .map(str::to_string),
            text: tree.text(content).trim().to_string(),
        })
        .collect()
}

fn first_content(tree: &XmlTree, parent: NodeId) -> Option<String> {
    localized(tree, parent)
        .into_iter()
        .map(|c| c.text)
        .find(|text| !text.is_empty())
}

fn identification(tree: &XmlTree, node: NodeId) -> Identification {
    Identification {
        issuer: tree.child_text(node, DCC_NS, "issuer"),
        value: tree.child_text(node, DCC_NS, "value"),
        names: tree
            .find_child(node, DCC_NS, "name")
            .map(|name| localized(tree, name))
            .unwrap_or_default(),
    }
}
