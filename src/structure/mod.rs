//! XML structure handling: arena tree and the hardened parser feeding it
//! Author: kartik4905

pub mod parser;
pub mod tree;

pub use parser::{parse_xml, ParserStatistics, XmlParser};
pub use tree::{Attribute, Element, NamespaceDecl, NodeId, NodeKind, QualifiedName, XmlTree, XML_NS};
