//! Status report for a loaded DCC
//! Author: kartik4905
//! Created: 2025-06-05
//!
//! Loading success and signature success are separate flags. The report is
//! filled while the pipeline runs and read-only afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SignatureError;
use crate::signature::SignatureProfile;
use crate::verifier::CertificateSummary;

pub mod formatter;

pub use formatter::{ReportFormat, ReportFormatter};

/// Result of signature verification, when it was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail")]
pub enum SignatureOutcome {
    /// Verification has not run.
    NotVerified,
    NotSigned,
    Verified(VerifiedSignature),
    /// The signature was evaluated and rejected.
    Failed(#[serde(serialize_with = "serialize_error")] SignatureError),
    /// The signature cannot be evaluated (parallel or counter-signatures,
    /// unknown algorithms, missing signing time).
    Unsupported(String),
}

impl SignatureOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, SignatureOutcome::Verified(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedSignature {
    pub profile: SignatureProfile,
    pub signing_time: DateTime<Utc>,
    pub signer: CertificateSummary,
    pub chain: Vec<CertificateSummary>,
}

/// Statuses a caller can require in [`StatusReport::summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusKind {
    IsLoaded,
    IsSigned,
    ValidSignature,
    ValidSchema,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub is_loaded: bool,
    /// A signature element is present, whether or not it was verified.
    pub is_signed: bool,
    /// Set only when schema validation ran to completion.
    pub schema_valid: Option<bool>,
    pub signature: SignatureOutcome,
    /// Always false unless a revocation check was configured.
    pub revocation_checked: bool,
    pub errors: Vec<String>,
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            is_loaded: false,
            is_signed: false,
            schema_valid: None,
            signature: SignatureOutcome::NotVerified,
            revocation_checked: false,
            errors: Vec::new(),
        }
    }
}

impl StatusReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&mut self, error: impl ToString) {
        self.errors.push(error.to_string());
    }

    pub fn status(&self, kind: StatusKind) -> bool {
        match kind {
            StatusKind::IsLoaded => self.is_loaded,
            StatusKind::IsSigned => self.is_signed,
            StatusKind::ValidSignature => self.signature.is_verified(),
            StatusKind::ValidSchema => self.schema_valid == Some(true),
        }
    }

    /// True only when every status not listed in `ignore` holds. A schema
    /// check that never ran counts as failed.
    pub fn summary(&self, ignore: &[StatusKind]) -> bool {
        [
            StatusKind::IsLoaded,
            StatusKind::IsSigned,
            StatusKind::ValidSignature,
            StatusKind::ValidSchema,
        ]
        .into_iter()
        .filter(|kind| !ignore.contains(kind))
        .all(|kind| self.status(kind))
    }
}

fn serialize_error<S: serde::Serializer>(error: &SignatureError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_for_unsigned_document() {
        let report = StatusReport {
            is_loaded: true,
            signature: SignatureOutcome::NotSigned,
            ..StatusReport::default()
        };
        assert!(!report.summary(&[]));
        assert!(!report.summary(&[StatusKind::IsSigned, StatusKind::ValidSignature]));
        assert!(report.summary(&[
            StatusKind::IsSigned,
            StatusKind::ValidSignature,
            StatusKind::ValidSchema
        ]));
    }

    #[test]
    fn test_summary_schema() {
        let mut report = StatusReport {
            is_loaded: true,
            ..StatusReport::default()
        };
        let ignore = [StatusKind::IsSigned, StatusKind::ValidSignature];
        report.schema_valid = Some(false);
        assert!(!report.summary(&ignore));
        report.schema_valid = Some(true);
        assert!(report.summary(&ignore));
    }

    #[test]
    fn test_failed_outcome_serializes_message() {
        let outcome = SignatureOutcome::Failed(SignatureError::SignatureValueMismatch);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "Failed");
        assert_eq!(json["detail"], "Signature value does not verify over SignedInfo");
    }
}
