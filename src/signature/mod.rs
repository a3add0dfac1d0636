//! XAdES signature handling for DCC documents
//! Author: kartik4905
//! Created: 2025-06-04 14:00:00 UTC
//!
//! Locating and classifying the enveloped signature, reading its XML-DSig and
//! XAdES structure, and verifying reference digests and the signature value.
//! Timestamp tokens are classified but never cryptographically checked.

pub mod locator;
pub mod model;
pub mod reference;
pub mod value;

use std::fmt;

use serde::Serialize;

pub use locator::{classify_profile, locate_signature, SignatureLocation};
pub use model::{ParsedSignature, Reference, SignatureMethod, SigningCertificateRef, Transform};
pub use reference::verify_references;
pub use value::verify_signature_value;

pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const XADES_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";
pub const XADES141_NS: &str = "http://uri.etsi.org/01903/v1.4.1#";

pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
pub const SIGNED_PROPERTIES_TYPE: &str = "http://uri.etsi.org/01903#SignedProperties";

/// XAdES baseline profile of the signature found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SignatureProfile {
    Absent,
    BaselineB,
    /// Carries a signature timestamp, which is not verified.
    BaselineT,
    /// Carries long-term validation material or an archive timestamp, which
    /// is not verified either.
    BaselineLT,
    Unsupported(String),
}

impl SignatureProfile {
    pub fn is_present(&self) -> bool {
        !matches!(self, SignatureProfile::Absent)
    }

    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            SignatureProfile::BaselineB | SignatureProfile::BaselineT | SignatureProfile::BaselineLT
        )
    }
}

impl fmt::Display for SignatureProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureProfile::Absent => write!(f, "absent"),
            SignatureProfile::BaselineB => write!(f, "XAdES Baseline-B"),
            SignatureProfile::BaselineT => write!(f, "XAdES Baseline-T"),
            SignatureProfile::BaselineLT => write!(f, "XAdES Baseline-LT"),
            SignatureProfile::Unsupported(reason) => write!(f, "unsupported ({})", reason),
        }
    }
}
