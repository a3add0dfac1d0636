//! Revocation extension point
//! Author: kartik4905
//! Created: 2025-06-04 12:30:00 UTC
//!
//! Nothing in this crate fetches CRLs or queries OCSP responders. A caller
//! that has revocation data can plug it in through [`RevocationCheck`]; when no
//! check is configured the status report records `revocation_checked = false`.

use std::collections::HashSet;

use crate::verifier::certificate::Certificate;

pub trait RevocationCheck: Send + Sync {
    /// Returns true if `cert` was revoked at or before `at`. `issuer` is the
    /// next certificate in the chain.
    fn is_revoked(
        &self,
        cert: &Certificate,
        issuer: Option<&Certificate>,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, String>;
}

/// Fixed deny-list keyed by (issuer DER, serial hex).
#[derive(Debug, Default)]
pub struct StaticRevocationList {
    revoked: HashSet<(Vec<u8>, String)>,
}

impl StaticRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&mut self, cert: &Certificate) {
        self.revoked
            .insert((cert.issuer_der().to_vec(), cert.serial().to_string()));
    }
}

impl RevocationCheck for StaticRevocationList {
    fn is_revoked(
        &self,
        cert: &Certificate,
        _issuer: Option<&Certificate>,
        _at: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, String> {
        Ok(self
            .revoked
            .contains(&(cert.issuer_der().to_vec(), cert.serial().to_string())))
    }
}
