//! Certificate Chain Builder
//! Author: kartik4905
//! Created: 2025-06-04 11:40:00 UTC
//!
//! Assembles the leaf-to-root path by issuer/subject matching. Candidates for
//! each issuer come from the certificates bundled with the signature first and
//! from the trust store's intermediates second; the walk ends at a trusted root.

use tracing::{debug, instrument, warn};

use crate::error::ChainError;
use crate::verifier::certificate::Certificate;
use crate::verifier::trust_store::TrustStore;

pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

/// Owned, ordered path from the signer (index 0) to a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }

    pub fn leaf(&self) -> Option<&Certificate> {
        self.certificates.first()
    }

    pub fn anchor(&self) -> Option<&Certificate> {
        self.certificates.last()
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn into_certificates(self) -> Vec<Certificate> {
        self.certificates
    }
}

pub struct ChainBuilder<'a> {
    store: &'a TrustStore,
    max_depth: usize,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(store: &'a TrustStore) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Builds the chain for `leaf`.
    ///
    /// A missing issuer anywhere along the way is [`ChainError::IncompleteChain`];
    /// a self-issued terminal certificate that the store does not hold as a root
    /// is [`ChainError::UntrustedChain`].
    #[instrument(skip_all, fields(leaf = %leaf.subject(), bundled = bundled.len()))]
    pub fn build(&self, leaf: &Certificate, bundled: &[Certificate]) -> Result<CertificateChain, ChainError> {
        let mut chain = vec![leaf.clone()];

        loop {
            let current = match chain.last() {
                Some(cert) => cert.clone(),
                None => return Err(ChainError::EmptyChain),
            };

            if self.store.is_trusted_root(&current) {
                debug!(depth = chain.len(), anchor = %current.subject(), "Chain reached trusted root");
                return Ok(CertificateChain::new(chain));
            }

            if let Some(root) = self.pick(&current, self.store.roots_with_subject(current.issuer_der())) {
                debug!(depth = chain.len() + 1, anchor = %root.subject(), "Chain reached trusted root");
                chain.push(root);
                return Ok(CertificateChain::new(chain));
            }

            if current.is_self_issued() {
                warn!(subject = %current.subject(), "Self-issued certificate is not a trusted root");
                return Err(ChainError::UntrustedChain {
                    subject: current.subject().to_string(),
                });
            }

            if chain.len() >= self.max_depth {
                return Err(ChainError::ChainTooLong(self.max_depth));
            }

            let candidates = bundled
                .iter()
                .filter(|cert| cert.subject_der() == current.issuer_der())
                .chain(self.store.intermediates_with_subject(current.issuer_der()))
                .filter(|cert| !chain.contains(*cert));
            let next = self.pick(&current, candidates);

            match next {
                Some(issuer) => {
                    debug!(subject = %current.subject(), issuer = %issuer.subject(), "Chain link found");
                    chain.push(issuer);
                }
                None => {
                    warn!(subject = %current.subject(), missing = %current.issuer(), "No issuer certificate available");
                    return Err(ChainError::IncompleteChain {
                        subject: current.subject().to_string(),
                        missing_issuer: current.issuer().to_string(),
                    });
                }
            }
        }
    }

    /// Among name-matching candidates, bundled ones first, prefer one whose key
    /// verifies `subject`.
    fn pick<'c>(
        &self,
        subject: &Certificate,
        candidates: impl Iterator<Item = &'c Certificate>,
    ) -> Option<Certificate> {
        let candidates: Vec<&Certificate> = candidates.collect();
        candidates
            .iter()
            .find(|issuer| subject.is_signed_by(issuer))
            .or_else(|| candidates.first())
            .map(|cert| (*cert).clone())
    }
}
