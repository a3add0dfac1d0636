//! DCC Signature Verification Pipeline — Stage-by-Stage Execution
//! Author: kartik4091
//! Created: 2025-06-05
//!
//! Stages run strictly in sequence, each consuming the previous one's output:
//! parse signature → policy → reference digests → signer and SignatureValue
//! → chain building → chain-model path validation → revocation (optional).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::config::VerificationConfig;
use crate::error::{Result, SignatureError};
use crate::report::VerifiedSignature;
use crate::signature::{verify_references, verify_signature_value, ParsedSignature, SignatureProfile};
use crate::structure::{NodeId, XmlTree};
use crate::verifier::{validate_path, Certificate, CertificateChain, ChainBuilder, RevocationCheck, TrustStore};

/// Everything a verification run needs besides the document. Built once by
/// the caller and shared read-only between concurrent verifications.
#[derive(Clone)]
pub struct VerificationContext {
    store: Arc<TrustStore>,
    config: VerificationConfig,
    revocation: Option<Arc<dyn RevocationCheck>>,
}

impl std::fmt::Debug for VerificationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationContext")
            .field("roots", &self.store.root_count())
            .field("intermediates", &self.store.intermediate_count())
            .field("config", &self.config)
            .field("revocation", &self.revocation.is_some())
            .finish()
    }
}

impl VerificationContext {
    pub fn new(store: TrustStore) -> Self {
        Self::with_config(Arc::new(store), VerificationConfig::default())
    }

    pub fn with_config(store: Arc<TrustStore>, config: VerificationConfig) -> Self {
        Self {
            store,
            config,
            revocation: None,
        }
    }

    /// Validates the config before accepting it.
    pub fn try_with_config(store: Arc<TrustStore>, config: VerificationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_config(store, config))
    }

    /// Enables revocation checking. Off unless set here.
    pub fn with_revocation_check(mut self, check: Arc<dyn RevocationCheck>) -> Self {
        self.revocation = Some(check);
        self
    }

    pub fn trust_store(&self) -> &TrustStore {
        &self.store
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    pub fn revocation_enabled(&self) -> bool {
        self.revocation.is_some()
    }
}

/// Result of a successful pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub signature: VerifiedSignature,
    pub signer: Certificate,
    pub chain: CertificateChain,
    pub revocation_checked: bool,
}

/// Verifies one enveloped signature against a [`VerificationContext`]
#[derive(Debug)]
pub struct Pipeline<'a> {
    context: &'a VerificationContext,
}

impl<'a> Pipeline<'a> {
    pub fn new(context: &'a VerificationContext) -> Self {
        Self { context }
    }

    /// Runs every stage. `signature` must already be detached from the
    /// content it signs, or be detachable by the reference stage.
    #[instrument(skip(self, tree), fields(profile = %profile))]
    pub fn execute(
        &self,
        tree: &XmlTree,
        signature: NodeId,
        profile: &SignatureProfile,
    ) -> std::result::Result<PipelineOutcome, SignatureError> {
        info!("Starting signature verification pipeline");

        if !profile.is_supported() {
            let reason = match profile {
                SignatureProfile::Unsupported(reason) => reason.clone(),
                other => format!("no verifiable signature ({})", other),
            };
            return Err(SignatureError::Unsupported(reason));
        }

        // Stage 1: Signature parsing
        let parsed = self.stage_1_parse(tree, signature)?;

        // Stage 2: Algorithm policy
        self.stage_2_policy(&parsed)?;

        // Stage 3: Reference digests and coverage
        self.stage_3_references(tree, &parsed)?;

        // Stage 4: Signer selection and SignatureValue
        let signer = self.stage_4_signature_value(tree, &parsed)?;

        // Stage 5: Chain building
        let chain = self.stage_5_build_chain(&signer, &parsed)?;

        // Stage 6: Chain-model path validation
        self.stage_6_validate_path(&chain, parsed.signing_time)?;

        // Stage 7: Revocation
        let revocation_checked = self.stage_7_revocation(&chain, parsed.signing_time)?;

        info!(signer = %signer.subject(), signing_time = %parsed.signing_time, "Signature verified");
        Ok(PipelineOutcome {
            signature: VerifiedSignature {
                profile: profile.clone(),
                signing_time: parsed.signing_time,
                signer: signer.summary(),
                chain: chain.certificates().iter().map(Certificate::summary).collect(),
            },
            signer,
            chain,
            revocation_checked,
        })
    }

    /// Stage 1: Signature parsing
    #[instrument(skip_all)]
    fn stage_1_parse(&self, tree: &XmlTree, signature: NodeId) -> std::result::Result<ParsedSignature, SignatureError> {
        info!("Stage 1: Signature parsing");
        let parsed = ParsedSignature::parse(tree, signature)?;
        debug!(
            references = parsed.references.len(),
            certificates = parsed.key_info_certificates.len(),
            "Signature parsed"
        );
        Ok(parsed)
    }

    /// Stage 2: Algorithm policy
    #[instrument(skip_all)]
    fn stage_2_policy(&self, parsed: &ParsedSignature) -> std::result::Result<(), SignatureError> {
        info!("Stage 2: Algorithm policy");
        if !self.context.config.allow_sha1 && parsed.uses_sha1() {
            warn!("SHA-1 rejected by configuration");
            return Err(SignatureError::Unsupported(
                "SHA-1 digests are disabled by configuration".into(),
            ));
        }
        Ok(())
    }

    /// Stage 3: Reference digests and coverage
    #[instrument(skip_all)]
    fn stage_3_references(&self, tree: &XmlTree, parsed: &ParsedSignature) -> std::result::Result<(), SignatureError> {
        info!("Stage 3: Reference digests");
        verify_references(tree, parsed)
    }

    /// Stage 4: Signer selection and SignatureValue
    #[instrument(skip_all)]
    fn stage_4_signature_value(
        &self,
        tree: &XmlTree,
        parsed: &ParsedSignature,
    ) -> std::result::Result<Certificate, SignatureError> {
        info!("Stage 4: Signature value");
        let signer = parsed.select_signer(self.context.config.require_signing_certificate)?;
        verify_signature_value(tree, parsed, &signer)?;
        Ok(signer)
    }

    /// Stage 5: Chain building
    #[instrument(skip_all)]
    fn stage_5_build_chain(
        &self,
        signer: &Certificate,
        parsed: &ParsedSignature,
    ) -> std::result::Result<CertificateChain, SignatureError> {
        info!("Stage 5: Chain building");
        let chain = ChainBuilder::new(&self.context.store)
            .with_max_depth(self.context.config.max_chain_depth)
            .build(signer, &parsed.bundled_certificates())?;
        debug!(
            depth = chain.len(),
            leaf = ?chain.leaf().map(Certificate::subject),
            anchor = ?chain.anchor().map(Certificate::subject),
            "Chain built"
        );
        Ok(chain)
    }

    /// Stage 6: Chain-model path validation
    #[instrument(skip_all)]
    fn stage_6_validate_path(
        &self,
        chain: &CertificateChain,
        signing_time: DateTime<Utc>,
    ) -> std::result::Result<(), SignatureError> {
        info!("Stage 6: Path validation at signing time");
        validate_path(chain.certificates(), signing_time, &self.context.store)?;
        Ok(())
    }

    /// Stage 7: Revocation. Returns whether a check actually ran.
    #[instrument(skip_all)]
    fn stage_7_revocation(
        &self,
        chain: &CertificateChain,
        signing_time: DateTime<Utc>,
    ) -> std::result::Result<bool, SignatureError> {
        let Some(check) = &self.context.revocation else {
            debug!("Stage 7: Revocation not configured");
            return Ok(false);
        };
        info!("Stage 7: Revocation");

        let certs = chain.certificates();
        for (index, cert) in certs.iter().enumerate() {
            // the trust anchor is not checked
            if Some(cert) == chain.anchor() {
                break;
            }
            let revoked = check
                .is_revoked(cert, certs.get(index + 1), signing_time)
                .map_err(|e| SignatureError::Unsupported(format!("revocation check failed: {}", e)))?;
            if revoked {
                warn!(subject = %cert.subject(), "Certificate revoked");
                return Err(SignatureError::Revoked {
                    subject: cert.subject().to_string(),
                    serial: cert.serial().to_string(),
                });
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::parse_xml;

    #[test]
    fn test_only_baseline_profiles_enter_the_pipeline() {
        let tree = parse_xml(b"<r/>").unwrap();
        let context = VerificationContext::new(TrustStore::new());
        let pipeline = Pipeline::new(&context);

        for profile in [
            SignatureProfile::Absent,
            SignatureProfile::Unsupported("2 signature elements found".into()),
        ] {
            assert!(!profile.is_supported());
            assert!(matches!(
                pipeline.execute(&tree, tree.document(), &profile),
                Err(SignatureError::Unsupported(_))
            ));
        }
        assert_eq!(
            pipeline
                .execute(&tree, tree.document(), &SignatureProfile::Unsupported("counter-signature".into()))
                .unwrap_err(),
            SignatureError::Unsupported("counter-signature".into())
        );
    }
}
