//! X.509 certificate value type
//! Author: kartik4905
//! Created: 2025-06-04 11:05:00 UTC
//!
//! Wraps an `openssl` certificate together with the fields chain building and
//! path validation look at. Subject and issuer are compared on their DER
//! encoding; the string forms exist for errors and logs.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509};
use serde::Serialize;

use crate::error::TrustStoreError;
use crate::hash_utils::{fingerprint, hash_bytes, HashAlgorithm};

#[derive(Clone)]
pub struct Certificate {
    x509: X509,
    der: Vec<u8>,
    subject: String,
    issuer: String,
    subject_der: Vec<u8>,
    issuer_der: Vec<u8>,
    serial: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

/// Serializable summary used by the status report and the CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sha256_fingerprint: String,
}

impl Certificate {
    pub fn from_x509(x509: X509) -> Result<Self, TrustStoreError> {
        let der = x509.to_der()?;
        let subject_der = x509.subject_name().to_der()?;
        let issuer_der = x509.issuer_name().to_der()?;
        let serial = x509.serial_number().to_bn()?.to_hex_str()?.to_string();
        let not_before = asn1_to_utc(x509.not_before())?;
        let not_after = asn1_to_utc(x509.not_after())?;

        Ok(Self {
            subject: name_to_string(x509.subject_name()),
            issuer: name_to_string(x509.issuer_name()),
            x509,
            der,
            subject_der,
            issuer_der,
            serial,
            not_before,
            not_after,
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, TrustStoreError> {
        Self::from_x509(X509::from_der(der)?)
    }

    /// Accepts PEM (first certificate in the buffer) or raw DER.
    pub fn from_pem_or_der(data: &[u8]) -> Result<Self, TrustStoreError> {
        let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
        let trimmed = &data[start..];
        if trimmed.starts_with(b"-----BEGIN") {
            Self::from_x509(X509::from_pem(trimmed)?)
        } else {
            Self::from_der(data)
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TrustStoreError> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_pem_or_der(&data)
    }

    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn subject_der(&self) -> &[u8] {
        &self.subject_der
    }

    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    /// Serial number as uppercase hex.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn is_valid_at(&self, instant: DateTime<Utc>) -> bool {
        self.not_before <= instant && instant <= self.not_after
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject_der == self.issuer_der
    }

    /// True when `issuer` carries this certificate's issuer name.
    pub fn is_issued_by_name(&self, issuer: &Certificate) -> bool {
        self.issuer_der == issuer.subject_der
    }

    /// Checks this certificate's signature with `issuer`'s public key.
    pub fn is_signed_by(&self, issuer: &Certificate) -> bool {
        issuer
            .x509
            .public_key()
            .and_then(|key| self.x509.verify(&key))
            .unwrap_or(false)
    }

    pub fn digest(&self, algo: HashAlgorithm) -> Option<Vec<u8>> {
        hash_bytes(&self.der, algo).ok()
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.der)
    }

    pub fn summary(&self) -> CertificateSummary {
        CertificateSummary {
            subject: self.subject.clone(),
            issuer: self.issuer.clone(),
            serial: self.serial.clone(),
            not_before: self.not_before,
            not_after: self.not_after,
            sha256_fingerprint: self.fingerprint(),
        }
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial", &self.serial)
            .field("not_before", &self.not_before)
            .field("not_after", &self.not_after)
            .finish()
    }
}

fn asn1_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, TrustStoreError> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .ok_or_else(|| TrustStoreError::Malformed(format!("validity time out of range: {}", time)))
}

/// Renders a distinguished name as `CN=..., O=...` in encoding order.
fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let nid = entry.object().nid();
            let key = if nid == Nid::UNDEF {
                entry.object().to_string()
            } else {
                nid.short_name().unwrap_or("?").to_string()
            };
            let value = entry
                .data()
                .to_string()
                .unwrap_or_else(|_| hex::encode(entry.data().as_slice()));
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
