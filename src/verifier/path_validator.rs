//! Chain-model path validation
//! Author: kartik4905
//! Created: 2025-06-04 12:10:00 UTC
//!
//! Every certificate is evaluated at the signing time asserted in the signed
//! properties, never at the wall-clock time of verification.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::ChainError;
use crate::verifier::certificate::Certificate;
use crate::verifier::trust_store::TrustStore;

/// Validates `chain` (leaf first) at `signing_time` against `store`.
///
/// Checks, in order: the chain ends at a trusted root, every link's issuer
/// name matches the next subject, every certificate is inside its validity
/// window at `signing_time`, and every signature verifies with the next
/// certificate's key (a self-issued root with its own).
#[instrument(skip_all, fields(depth = chain.len(), %signing_time))]
pub fn validate_path(
    chain: &[Certificate],
    signing_time: DateTime<Utc>,
    store: &TrustStore,
) -> Result<(), ChainError> {
    let anchor = chain.last().ok_or(ChainError::EmptyChain)?;
    if !store.is_trusted_root(anchor) {
        return Err(ChainError::UntrustedChain {
            subject: anchor.subject().to_string(),
        });
    }

    for pair in chain.windows(2) {
        let (subject, issuer) = (&pair[0], &pair[1]);
        if !subject.is_issued_by_name(issuer) {
            return Err(ChainError::BrokenLink {
                subject: subject.subject().to_string(),
                next: issuer.subject().to_string(),
            });
        }
    }

    for cert in chain {
        if !cert.is_valid_at(signing_time) {
            return Err(ChainError::ExpiredCertificate {
                subject: cert.subject().to_string(),
                serial: cert.serial().to_string(),
                not_before: cert.not_before(),
                not_after: cert.not_after(),
                signing_time,
            });
        }
    }

    for (index, cert) in chain.iter().enumerate() {
        let issuer = match chain.get(index + 1) {
            Some(next) => next,
            // a trust anchor that is not self-issued is trusted as held
            None if !cert.is_self_issued() => continue,
            None => cert,
        };
        if !cert.is_signed_by(issuer) {
            return Err(ChainError::InvalidCertificateSignature {
                subject: cert.subject().to_string(),
                issuer: issuer.subject().to_string(),
            });
        }
    }

    debug!("Certificate path valid at signing time");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::test_pki::{at, build, issue, new_key, root, Issued};
    use chrono::Duration;

    struct Path {
        root: Issued,
        intermediate: Issued,
        leaf: Issued,
        store: TrustStore,
    }

    fn path() -> Path {
        let root = root("Test Root CA");
        let intermediate = issue("Test Intermediate CA", &root, 2, at(2021, 1, 1), at(2035, 1, 1), true);
        let leaf = issue("Kalibrierfirma Signer", &intermediate, 3, at(2023, 1, 1), at(2025, 1, 1), false);
        let mut store = TrustStore::new();
        store.add_root(root.cert.clone());
        Path {
            root,
            intermediate,
            leaf,
            store,
        }
    }

    impl Path {
        fn chain(&self) -> Vec<Certificate> {
            vec![self.leaf.cert.clone(), self.intermediate.cert.clone(), self.root.cert.clone()]
        }
    }

    #[test]
    fn test_valid_path() {
        let path = path();
        assert!(validate_path(&path.chain(), at(2024, 3, 1), &path.store).is_ok());
    }

    #[test]
    fn test_empty_chain() {
        assert_eq!(
            validate_path(&[], at(2024, 3, 1), &TrustStore::new()),
            Err(ChainError::EmptyChain)
        );
    }

    #[test]
    fn test_anchor_not_in_store() {
        let path = path();
        assert!(matches!(
            validate_path(&path.chain(), at(2024, 3, 1), &TrustStore::new()),
            Err(ChainError::UntrustedChain { subject }) if subject.contains("Test Root CA")
        ));
    }

    #[test]
    fn test_same_name_issuer_with_different_key() {
        let path = path();
        // carries the intermediate's name but is signed by an unrelated key
        let forged = build(
            "Kalibrierfirma Signer",
            "Test Intermediate CA",
            &new_key(),
            &new_key(),
            7,
            at(2023, 1, 1),
            at(2025, 1, 1),
            false,
        );
        let chain = vec![forged, path.intermediate.cert.clone(), path.root.cert.clone()];

        match validate_path(&chain, at(2024, 3, 1), &path.store) {
            Err(ChainError::InvalidCertificateSignature { subject, issuer }) => {
                assert!(subject.contains("Kalibrierfirma Signer"));
                assert!(issuer.contains("Test Intermediate CA"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_forged_root_signature() {
        let path = path();
        let forged_root = build(
            "Test Root CA",
            "Test Root CA",
            &new_key(),
            &path.root.key,
            9,
            at(2020, 1, 1),
            at(2040, 1, 1),
            true,
        );
        let mut store = TrustStore::new();
        store.add_root(forged_root.clone());
        let chain = vec![path.leaf.cert.clone(), path.intermediate.cert.clone(), forged_root];

        assert!(matches!(
            validate_path(&chain, at(2024, 3, 1), &store),
            Err(ChainError::InvalidCertificateSignature { .. })
        ));
    }

    #[test]
    fn test_broken_name_link() {
        let path = path();
        let other = issue("Other Intermediate CA", &path.root, 5, at(2021, 1, 1), at(2035, 1, 1), true);
        let chain = vec![path.leaf.cert.clone(), other.cert, path.root.cert.clone()];

        match validate_path(&chain, at(2024, 3, 1), &path.store) {
            Err(ChainError::BrokenLink { subject, next }) => {
                assert!(subject.contains("Kalibrierfirma Signer"));
                assert!(next.contains("Other Intermediate CA"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validity_bounds_are_inclusive() {
        let path = path();
        let chain = path.chain();
        let not_before = path.leaf.cert.not_before();
        let not_after = path.leaf.cert.not_after();

        assert!(validate_path(&chain, not_before, &path.store).is_ok());
        assert!(validate_path(&chain, not_after, &path.store).is_ok());

        for outside in [not_before - Duration::seconds(1), not_after + Duration::seconds(1)] {
            match validate_path(&chain, outside, &path.store) {
                Err(ChainError::ExpiredCertificate {
                    subject, signing_time, ..
                }) => {
                    assert!(subject.contains("Kalibrierfirma Signer"));
                    assert_eq!(signing_time, outside);
                }
                other => panic!("unexpected result at {}: {:?}", outside, other),
            }
        }
    }

    #[test]
    fn test_intermediate_outside_validity_at_signing_time() {
        let path = path();
        let intermediate = issue("Test Intermediate CA", &path.root, 6, at(2021, 1, 1), at(2023, 6, 1), true);
        let leaf = issue("Kalibrierfirma Signer", &intermediate, 3, at(2023, 1, 1), at(2025, 1, 1), false);
        let chain = vec![leaf.cert, intermediate.cert, path.root.cert.clone()];

        assert!(validate_path(&chain, at(2023, 3, 1), &path.store).is_ok());
        assert!(matches!(
            validate_path(&chain, at(2024, 3, 1), &path.store),
            Err(ChainError::ExpiredCertificate { subject, .. }) if subject.contains("Test Intermediate CA")
        ));
    }
}
