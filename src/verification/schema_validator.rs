//! Schema validation collaborator
//! Author: kartik4091
//! Created: 2025-06-03
//!
//! The crate only depends on the [`SchemaValidator`] contract. Full XSD
//! validation is provided by the caller; [`StructuralValidator`] is an
//! offline stand-in that checks the DCC envelope only.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SchemaValidationError;
use crate::structure::parse_xml;
use crate::types::{DCC_NS, DCC_ROOT};

/// Where the validator takes its schema set from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchemaSource {
    /// Resolved over the network
    Online,
    /// Pre-populated local cache
    Offline,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl SchemaReport {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(&self, xml: &[u8], source: SchemaSource) -> Result<SchemaReport, SchemaValidationError>;
}

/// Checks well-formedness, the root element and its `schemaVersion`.
#[derive(Debug, Default, Clone)]
pub struct StructuralValidator;

#[async_trait]
impl SchemaValidator for StructuralValidator {
    async fn validate(&self, xml: &[u8], source: SchemaSource) -> Result<SchemaReport, SchemaValidationError> {
        if source == SchemaSource::Online {
            return Err(SchemaValidationError::Unavailable(
                "structural validator works offline only".into(),
            ));
        }

        let tree = match parse_xml(xml) {
            Ok(tree) => tree,
            Err(e) => return Ok(SchemaReport::invalid(vec![e.to_string()])),
        };

        let mut errors = Vec::new();
        match tree.root_element().and_then(|root| tree.element(root)) {
            Some(root) => {
                if !root.name.is(DCC_NS, DCC_ROOT) {
                    errors.push(format!("unexpected root element {}", root.name.qname()));
                }
                if root.attribute("schemaVersion").is_none() {
                    errors.push("missing schemaVersion attribute".into());
                }
            }
            None => errors.push("document has no root element".into()),
        }

        if errors.is_empty() {
            Ok(SchemaReport::valid())
        } else {
            Ok(SchemaReport::invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_structural_validator() {
        let ok = br#"<dcc:digitalCalibrationCertificate xmlns:dcc="https://ptb.de/dcc" schemaVersion="3.2.1"/>"#;
        let report = StructuralValidator.validate(ok, SchemaSource::Offline).await.unwrap();
        assert!(report.valid);

        let wrong = br#"<calibration schemaVersion="1"/>"#;
        let report = StructuralValidator.validate(wrong, SchemaSource::Offline).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_online_unavailable() {
        let result = StructuralValidator.validate(b"<a/>", SchemaSource::Online).await;
        assert!(matches!(result, Err(SchemaValidationError::Unavailable(_))));
    }
}
