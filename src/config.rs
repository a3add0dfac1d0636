//! Configuration types and validation for the verification pipeline
//! Author: kartik4091
//! Created: 2025-06-03

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::output::compression_handler::DEFAULT_MAX_UNCOMPRESSED;
use crate::verifier::DEFAULT_MAX_CHAIN_DEPTH;

/// Verification policy shared by every document checked in one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Certificates allowed below the trust anchor.
    pub max_chain_depth: usize,
    /// Accept SHA-1 in reference digests, signature methods and
    /// signing-certificate digests.
    pub allow_sha1: bool,
    /// Reject signatures without a XAdES SigningCertificate(V2) reference.
    pub require_signing_certificate: bool,
    pub max_decompressed_size: usize,
    pub schema_timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            allow_sha1: true,
            require_signing_certificate: false,
            max_decompressed_size: DEFAULT_MAX_UNCOMPRESSED,
            schema_timeout_ms: 10_000,
        }
    }
}

impl VerificationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_chain_depth == 0 {
            return Err(Error::ConfigError("max_chain_depth must be at least 1".into()));
        }
        if self.max_chain_depth > 32 {
            return Err(Error::ConfigError("max_chain_depth is limited to 32".into()));
        }
        if self.max_decompressed_size == 0 {
            return Err(Error::ConfigError("max_decompressed_size must be positive".into()));
        }
        if self.schema_timeout_ms == 0 {
            return Err(Error::ConfigError("schema_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Reads a JSON or YAML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        // Try JSON first, then YAML
        let config: Self = serde_json::from_str(content)
            .or_else(|_| serde_yaml::from_str(content))
            .map_err(|e| Error::ConfigError(format!("Config parsing error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
