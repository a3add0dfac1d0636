//! Hash Utilities for DCC Verification
//! Provides the digest algorithms referenced by XML-DSig and certificate fingerprints
//! Author: kartik4091
//! Created: 2025-06-04

use std::fmt;

use openssl::hash::{hash, MessageDigest};
use serde::Serialize;
use sha2::{Digest as ShaDigest, Sha256};

use crate::error::SignatureError;

pub const SHA1_URI: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const SHA256_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const SHA384_URI: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
pub const SHA512_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

/// Supported hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HashAlgorithm {
    SHA1,
    SHA256,
    SHA384,
    SHA512,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashAlgorithm::SHA1 => "SHA1",
            HashAlgorithm::SHA256 => "SHA256",
            HashAlgorithm::SHA384 => "SHA384",
            HashAlgorithm::SHA512 => "SHA512",
        };
        write!(f, "{}", name)
    }
}

impl HashAlgorithm {
    /// Maps an XML-DSig `DigestMethod` algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            SHA1_URI => Some(HashAlgorithm::SHA1),
            SHA256_URI => Some(HashAlgorithm::SHA256),
            SHA384_URI => Some(HashAlgorithm::SHA384),
            SHA512_URI => Some(HashAlgorithm::SHA512),
            _ => None,
        }
    }

    pub fn uri(&self) -> &'static str {
        match self {
            HashAlgorithm::SHA1 => SHA1_URI,
            HashAlgorithm::SHA256 => SHA256_URI,
            HashAlgorithm::SHA384 => SHA384_URI,
            HashAlgorithm::SHA512 => SHA512_URI,
        }
    }

    pub fn message_digest(&self) -> MessageDigest {
        match self {
            HashAlgorithm::SHA1 => MessageDigest::sha1(),
            HashAlgorithm::SHA256 => MessageDigest::sha256(),
            HashAlgorithm::SHA384 => MessageDigest::sha384(),
            HashAlgorithm::SHA512 => MessageDigest::sha512(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, HashAlgorithm::SHA1)
    }
}

/// Hashes a byte slice
pub fn hash_bytes(data: &[u8], algo: HashAlgorithm) -> Result<Vec<u8>, SignatureError> {
    hash(algo.message_digest(), data)
        .map(|digest| digest.to_vec())
        .map_err(|e| SignatureError::Malformed(format!("{} digest failed: {}", algo, e)))
}

/// Verifies content hash matches the expected value
pub fn verify_hash(data: &[u8], expected: &[u8], algo: HashAlgorithm) -> Result<bool, SignatureError> {
    Ok(hash_bytes(data, algo)? == expected)
}

/// Lowercase hex SHA-256 fingerprint, used to identify certificates in logs
/// and reports.
pub fn fingerprint(der: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(der);
    hex::encode(hasher.finalize())
}
