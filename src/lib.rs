//! Main Library File for DCC Verification
//! Loads Digital Calibration Certificates and verifies their enveloped
//! XAdES signatures with chain-model certificate path validation.

// Configuration and Core Pipeline
pub mod config;
pub mod dcc;
pub mod error;
pub mod pipeline;
pub mod types;

// Stage 0: XML parsing
pub mod structure;

// Stage 1: Canonicalization and digests
pub mod c14n;
pub mod hash_utils;

// Stage 2: XML-DSig / XAdES signature handling
pub mod signature;

// Stage 3: Certificates, chain building and path validation
pub mod verifier;

// Compressed containers and schema collaborators
pub mod output;
pub mod verification;

// Status report
pub mod report;

// Shared Utilities
pub mod utils;

// Re-exports for crate consumers
pub use config::VerificationConfig;
pub use dcc::{Dcc, DccLoader, PreviousReportResolver};
pub use error::{ChainError, CompressionError, Error, ParseError, Result, SchemaValidationError, SignatureError, TrustStoreError};
pub use output::CompressedDcc;
pub use pipeline::{Pipeline, VerificationContext};
pub use report::{ReportFormat, ReportFormatter, SignatureOutcome, StatusKind, StatusReport, VerifiedSignature};
pub use signature::SignatureProfile;
pub use types::DccDocument;
pub use verification::{SchemaReport, SchemaSource, SchemaValidator};
pub use verifier::{Certificate, RevocationCheck, TrustStore};
