//! Loaded Digital Calibration Certificate
//! Author: kartik4091
//! Created: 2025-06-05
//!
//! A [`Dcc`] is built from a file, raw XML bytes or a compressed container.
//! Structural problems never raise: they are recorded in the
//! [`StatusReport`] and leave `is_loaded == false`. Signature verification
//! is a separate, explicit step whose failures are raised as
//! [`SignatureError`].

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::error::{CompressionError, SchemaValidationError, SignatureError};
use crate::output::compression_handler::{CompressedDcc, CompressionHandler, DEFAULT_MAX_UNCOMPRESSED};
use crate::pipeline::{Pipeline, VerificationContext};
use crate::report::{SignatureOutcome, StatusReport};
use crate::signature::{locate_signature, SignatureProfile};
use crate::structure::{NodeId, XmlParser, XmlTree};
use crate::types::{ContentNode, DccDocument, Identification};
use crate::verification::schema_validator::{SchemaSource, SchemaValidator};
use crate::verifier::Certificate;

/// Resolves a previous-report identifier to the document it names.
pub trait PreviousReportResolver {
    fn resolve(&self, report_id: &str) -> Option<Dcc>;
}

#[derive(Debug, Clone)]
pub struct Dcc {
    raw: Vec<u8>,
    tree: Option<XmlTree>,
    document: DccDocument,
    signature: Option<NodeId>,
    profile: SignatureProfile,
    status: StatusReport,
    signer: Option<Certificate>,
    chain: Vec<Certificate>,
    signing_time: Option<DateTime<Utc>>,
}

impl Dcc {
    fn empty(raw: Vec<u8>) -> Self {
        Self {
            raw,
            tree: None,
            document: DccDocument::default(),
            signature: None,
            profile: SignatureProfile::Absent,
            status: StatusReport::new(),
            signer: None,
            chain: Vec::new(),
            signing_time: None,
        }
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        match std::fs::read(path.as_ref()) {
            Ok(bytes) => Self::from_bytes(bytes),
            Err(e) => {
                warn!("Failed to read DCC file: {}", e);
                let mut dcc = Self::empty(Vec::new());
                dcc.status.record_error(format!("I/O error: {}", e));
                dcc
            }
        }
    }

    pub fn from_compressed(bytes: &[u8]) -> Self {
        Self::from_compressed_with_limit(bytes, DEFAULT_MAX_UNCOMPRESSED)
    }

    /// Inflates a compressed container, bounded by `max_size`, and loads it.
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    pub fn from_compressed_with_limit(bytes: &[u8], max_size: usize) -> Self {
        match CompressionHandler::new()
            .with_max_uncompressed(max_size)
            .decompress_bytes(bytes)
        {
            Ok(xml) => Self::from_bytes(xml),
            Err(e) => {
                warn!("Failed to decompress DCC: {}", e);
                let mut dcc = Self::empty(Vec::new());
                dcc.status.record_error(format!("Compression error: {}", e));
                dcc
            }
        }
    }

    /// Parses raw XML. The single entry point all load sources converge on.
    #[instrument(skip_all)]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let raw: Vec<u8> = bytes.into();
        debug!(len = raw.len(), "Parsing DCC");
        let mut dcc = Self::empty(Vec::new());

        let mut tree = match XmlParser::new().parse(&raw) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("DCC is not well-formed: {}", e);
                dcc.raw = raw;
                dcc.status.record_error(format!("XML parse error: {}", e));
                return dcc;
            }
        };

        let location = locate_signature(&tree);
        dcc.status.is_signed = location.profile.is_present();
        if let Some(node) = location.node {
            // the retained root content never includes an enveloped signature
            if tree.parent(node) == tree.root_element() {
                tree.detach(node);
            }
            dcc.signature = Some(node);
        } else {
            dcc.status.signature = SignatureOutcome::NotSigned;
        }
        dcc.profile = location.profile;

        let (document, problems) = DccDocument::extract(&tree);
        for problem in &problems {
            dcc.status.record_error(format!("XML parse error: {}", problem));
        }
        dcc.status.is_loaded = problems.is_empty();
        dcc.document = document;
        dcc.tree = Some(tree);
        dcc.raw = raw;

        info!(
            loaded = dcc.status.is_loaded,
            signed = dcc.status.is_signed,
            uid = dcc.document.uid.as_deref().unwrap_or("-"),
            "DCC loaded"
        );
        dcc
    }

    /// Verifies the enveloped signature against `context`.
    ///
    /// Returns the outcome for unsigned documents and documents that could
    /// not be parsed. Every integrity or trust failure is raised; the status
    /// report keeps a copy.
    #[instrument(skip_all, fields(uid = self.document.uid.as_deref().unwrap_or("-")))]
    pub fn verify_signature(&mut self, context: &VerificationContext) -> Result<&SignatureOutcome, SignatureError> {
        let Some(tree) = &self.tree else {
            debug!("No parsed document, signature not verified");
            return Ok(&self.status.signature);
        };
        let Some(node) = self.signature else {
            self.status.signature = SignatureOutcome::NotSigned;
            return Ok(&self.status.signature);
        };

        match Pipeline::new(context).execute(tree, node, &self.profile) {
            Ok(outcome) => {
                self.signer = Some(outcome.signer);
                self.chain = outcome.chain.into_certificates();
                self.signing_time = Some(outcome.signature.signing_time);
                self.status.revocation_checked = outcome.revocation_checked;
                self.status.signature = SignatureOutcome::Verified(outcome.signature);
                Ok(&self.status.signature)
            }
            Err(e) => {
                warn!("Signature verification failed: {}", e);
                self.signer = None;
                self.chain.clear();
                self.signing_time = None;
                self.status.record_error(format!("Signature error: {}", e));
                self.status.signature = match &e {
                    SignatureError::Unsupported(reason) => SignatureOutcome::Unsupported(reason.clone()),
                    other => SignatureOutcome::Failed(other.clone()),
                };
                Err(e)
            }
        }
    }

    /// Runs the schema collaborator under `timeout`. On timeout or collaborator
    /// failure `schema_valid` stays unset and the error is recorded.
    #[instrument(skip(self, validator))]
    pub async fn verify_schema(
        &mut self,
        validator: &dyn SchemaValidator,
        source: SchemaSource,
        timeout: Duration,
    ) -> Option<bool> {
        if self.tree.is_none() {
            self.status.record_error("Schema validation skipped: document not parsed");
            return None;
        }

        let result = match tokio::time::timeout(timeout, validator.validate(&self.raw, source)).await {
            Ok(result) => result,
            Err(_) => Err(SchemaValidationError::Timeout(timeout.as_millis() as u64)),
        };

        match result {
            Ok(report) => {
                for error in &report.errors {
                    self.status.record_error(format!("Schema: {}", error));
                }
                self.status.schema_valid = Some(report.valid);
            }
            Err(e) => {
                warn!("Schema validation not performed: {}", e);
                self.status.schema_valid = None;
                self.status.record_error(format!("Schema validation error: {}", e));
            }
        }
        self.status.schema_valid
    }

    /// Compresses the XML exactly as it was loaded.
    pub fn generate_compressed(&self) -> Result<CompressedDcc, CompressionError> {
        CompressionHandler::new().compress(&self.raw)
    }

    pub fn raw_xml(&self) -> &[u8] {
        &self.raw
    }

    pub fn tree(&self) -> Option<&XmlTree> {
        self.tree.as_ref()
    }

    pub fn document(&self) -> &DccDocument {
        &self.document
    }

    pub fn status_report(&self) -> &StatusReport {
        &self.status
    }

    pub fn signature_profile(&self) -> &SignatureProfile {
        &self.profile
    }

    pub fn is_loaded(&self) -> bool {
        self.status.is_loaded
    }

    pub fn is_signed(&self) -> bool {
        self.status.is_signed
    }

    pub fn uid(&self) -> Option<&str> {
        self.document.uid.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.document.version.as_deref()
    }

    pub fn mandatory_language(&self) -> Option<&str> {
        self.document.mandatory_language()
    }

    /// Leaf of the verified chain.
    pub fn signer_certificate(&self) -> Option<&Certificate> {
        self.signer.as_ref()
    }

    /// Verified chain, leaf first. Empty unless verification succeeded.
    pub fn certificate_chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        self.signing_time
    }

    /// The `endPerformanceDate`.
    pub fn calibration_date(&self) -> Option<NaiveDate> {
        self.document.end_performance_date
    }

    pub fn begin_performance_date(&self) -> Option<NaiveDate> {
        self.document.begin_performance_date
    }

    pub fn days_since_calibration(&self) -> Option<i64> {
        self.days_since_calibration_at(Utc::now().date_naive())
    }

    pub fn days_since_calibration_at(&self, today: NaiveDate) -> Option<i64> {
        self.calibration_date().map(|end| (today - end).num_days())
    }

    pub fn calibration_laboratory_name(&self) -> Option<&str> {
        self.document.laboratory_name.as_deref()
    }

    pub fn has_previous_report(&self) -> bool {
        self.document.previous_report.is_some()
    }

    pub fn previous_report(&self) -> Option<&str> {
        self.document.previous_report.as_deref()
    }

    pub fn resolve_previous_report(&self, resolver: &dyn PreviousReportResolver) -> Option<Dcc> {
        self.previous_report().and_then(|id| resolver.resolve(id))
    }

    pub fn item_identifications(&self) -> &[Identification] {
        &self.document.item_identifications
    }

    pub fn get_item_id_by_name(&self, name: &str, lang: Option<&str>, issuer: Option<&str>) -> Option<&str> {
        self.document.item_id_by_name(name, lang, issuer)
    }

    pub fn calibration_metadata(&self, ref_type: &str) -> Option<ContentNode> {
        self.document.metadata_by_ref_type(ref_type).cloned()
    }
}

/// Load-then-verify front end.
///
/// Without a context, documents are only loaded. With one, signed documents
/// are verified right after loading and any [`SignatureError`] is returned.
#[derive(Debug, Clone)]
pub struct DccLoader {
    context: Option<VerificationContext>,
    max_decompressed_size: usize,
}

impl Default for DccLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DccLoader {
    pub fn new() -> Self {
        Self {
            context: None,
            max_decompressed_size: DEFAULT_MAX_UNCOMPRESSED,
        }
    }

    pub fn with_context(mut self, context: VerificationContext) -> Self {
        self.max_decompressed_size = context.config().max_decompressed_size;
        self.context = Some(context);
        self
    }

    pub fn with_max_decompressed_size(mut self, max: usize) -> Self {
        self.max_decompressed_size = max;
        self
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Dcc, SignatureError> {
        self.finish(Dcc::from_file(path))
    }

    pub fn load_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<Dcc, SignatureError> {
        self.finish(Dcc::from_bytes(bytes))
    }

    pub fn load_compressed(&self, bytes: &[u8]) -> Result<Dcc, SignatureError> {
        self.finish(Dcc::from_compressed_with_limit(bytes, self.max_decompressed_size))
    }

    fn finish(&self, mut dcc: Dcc) -> Result<Dcc, SignatureError> {
        if let Some(context) = &self.context {
            if dcc.is_signed() {
                dcc.verify_signature(context)?;
            }
        }
        Ok(dcc)
    }
}
