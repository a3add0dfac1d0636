//! Error types and handling for the DCC verification library
//! Created: 2025-06-03 11:31:05 UTC
//! Author: kartik4905

use std::{io, result::Result as StdResult};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Custom result type for DCC operations
pub type Result<T> = StdResult<T, Error>;

/// Core error type for DCC operations
#[derive(Error, Debug)]
#[non_exhaustive]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("XML parse error: {0}")]
    ParseError(#[from] ParseError),

    #[error("Compression error: {0}")]
    CompressionError(#[from] CompressionError),

    #[error("Trust store error: {0}")]
    TrustStoreError(#[from] TrustStoreError),

    #[error("Schema validation error: {0}")]
    SchemaValidationError(#[from] SchemaValidationError),

    #[error("Signature error: {0}")]
    SignatureError(#[from] SignatureError),

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

// -------------------- Sub-Error Categories --------------------

/// Structural problems with the XML input. Never raised by the loaders;
/// recorded in the status report instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("Malformed XML at byte {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("Input is not valid UTF-8")]
    Encoding,

    #[error("DOCTYPE declarations are not accepted")]
    DoctypeRejected,

    #[error("Unbound namespace prefix: {0}")]
    UnboundPrefix(String),

    #[error("Document has no root element")]
    NoRootElement,

    #[error("Unexpected root element: {0}")]
    UnexpectedRoot(String),

    #[error("Missing mandatory element: {0}")]
    MissingElement(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompressionError {
    #[error("Container too short: {0} bytes")]
    Truncated(usize),

    #[error("Compressed length mismatch: header says {declared}, payload has {actual}")]
    CompressedLengthMismatch { declared: usize, actual: usize },

    #[error("Uncompressed length mismatch: header says {declared}, inflated {actual}")]
    UncompressedLengthMismatch { declared: usize, actual: usize },

    #[error("Declared size {0} exceeds the configured limit")]
    TooLarge(usize),

    #[error("Deflate failed: {0}")]
    Deflate(String),

    #[error("Inflate failed: {0}")]
    Inflate(String),

    #[error("CRC32 mismatch: expected {expected:08x}, computed {actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrustStoreError {
    #[error("Failed to read certificate: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed certificate: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaValidationError {
    #[error("Schema validation timed out after {0} ms")]
    Timeout(u64),

    #[error("Schema source unavailable: {0}")]
    Unavailable(String),

    #[error("Schema validator failed: {0}")]
    Validator(String),
}

/// Outcome of the chain-model path validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChainError {
    #[error("Certificate chain is empty")]
    EmptyChain,

    #[error("Incomplete chain: no certificate found for issuer '{missing_issuer}' of '{subject}'")]
    IncompleteChain { subject: String, missing_issuer: String },

    #[error("Untrusted chain: '{subject}' is not a trusted root")]
    UntrustedChain { subject: String },

    #[error("Chain link broken: issuer of '{subject}' is not '{next}'")]
    BrokenLink { subject: String, next: String },

    #[error("Certificate '{subject}' (serial {serial}) not valid at signing time {signing_time}: valid {not_before} to {not_after}")]
    ExpiredCertificate {
        subject: String,
        serial: String,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
        signing_time: DateTime<Utc>,
    },

    #[error("Signature of '{subject}' does not verify with the key of '{issuer}'")]
    InvalidCertificateSignature { subject: String, issuer: String },

    #[error("Certificate chain exceeds the maximum depth of {0}")]
    ChainTooLong(usize),
}

/// Integrity and trust violations. Raised to the caller whenever signature
/// verification was requested; a document carrying one of these is untrusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignatureError {
    #[error("Unsupported signature: {0}")]
    Unsupported(String),

    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Digest mismatch for reference '{uri}'")]
    DigestMismatch { uri: String },

    #[error("Signature value does not verify over SignedInfo")]
    SignatureValueMismatch,

    #[error("Signing certificate does not match the signed certificate reference")]
    SigningCertificateMismatch,

    #[error("Certificate '{subject}' (serial {serial}) has been revoked")]
    Revoked { subject: String, serial: String },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl SignatureError {
    /// `Unsupported` means "cannot evaluate", every other variant means
    /// "evaluated and rejected".
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SignatureError::Unsupported(_))
    }
}

impl From<openssl::error::ErrorStack> for TrustStoreError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        TrustStoreError::Malformed(err.to_string())
    }
}
