//! Trust Store
//! Author: kartik4905
//! Created: 2025-06-04 11:20:00 UTC
//!
//! Caller-populated anchors for chain validation. Loading is append-only and
//! happens before verification; afterwards the store is shared read-only,
//! typically behind an `Arc`.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::TrustStoreError;
use crate::verifier::certificate::Certificate;

/// (subject DER, serial hex)
type StoreKey = (Vec<u8>, String);

#[derive(Debug, Default, Clone)]
pub struct TrustStore {
    roots: BTreeMap<StoreKey, Certificate>,
    intermediates: BTreeMap<StoreKey, Certificate>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, cert: Certificate) {
        info!(subject = %cert.subject(), serial = %cert.serial(), "Trusted root added");
        self.roots.insert(key(&cert), cert);
    }

    pub fn add_intermediate(&mut self, cert: Certificate) {
        info!(subject = %cert.subject(), serial = %cert.serial(), "Trusted intermediate added");
        self.intermediates.insert(key(&cert), cert);
    }

    /// Loads a PEM or DER root certificate from disk.
    pub fn load_root(&mut self, path: impl AsRef<Path>) -> Result<(), TrustStoreError> {
        debug!(path = %path.as_ref().display(), "Loading trusted root");
        let cert = Certificate::from_file(path)?;
        self.add_root(cert);
        Ok(())
    }

    /// Loads a PEM or DER intermediate certificate from disk.
    pub fn load_intermediate(&mut self, path: impl AsRef<Path>) -> Result<(), TrustStoreError> {
        debug!(path = %path.as_ref().display(), "Loading trusted intermediate");
        let cert = Certificate::from_file(path)?;
        self.add_intermediate(cert);
        Ok(())
    }

    pub fn load_root_bytes(&mut self, data: &[u8]) -> Result<(), TrustStoreError> {
        let cert = Certificate::from_pem_or_der(data)?;
        self.add_root(cert);
        Ok(())
    }

    pub fn load_intermediate_bytes(&mut self, data: &[u8]) -> Result<(), TrustStoreError> {
        let cert = Certificate::from_pem_or_der(data)?;
        self.add_intermediate(cert);
        Ok(())
    }

    pub fn root(&self, subject_der: &[u8], serial: &str) -> Option<&Certificate> {
        self.roots.get(&(subject_der.to_vec(), serial.to_string()))
    }

    pub fn intermediate(&self, subject_der: &[u8], serial: &str) -> Option<&Certificate> {
        self.intermediates.get(&(subject_der.to_vec(), serial.to_string()))
    }

    /// True when this exact certificate is a trusted root.
    pub fn is_trusted_root(&self, cert: &Certificate) -> bool {
        self.root(cert.subject_der(), cert.serial())
            .map_or(false, |root| root == cert)
    }

    pub fn roots_with_subject<'a>(&'a self, subject_der: &'a [u8]) -> impl Iterator<Item = &'a Certificate> + 'a {
        self.roots
            .values()
            .filter(move |cert| cert.subject_der() == subject_der)
    }

    pub fn intermediates_with_subject<'a>(
        &'a self,
        subject_der: &'a [u8],
    ) -> impl Iterator<Item = &'a Certificate> + 'a {
        self.intermediates
            .values()
            .filter(move |cert| cert.subject_der() == subject_der)
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn intermediate_count(&self) -> usize {
        self.intermediates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty() && self.intermediates.is_empty()
    }
}

fn key(cert: &Certificate) -> StoreKey {
    (cert.subject_der().to_vec(), cert.serial().to_string())
}
