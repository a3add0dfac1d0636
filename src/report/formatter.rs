//! Status report formatter
//! Author: kartik4905
//! Created: 2025-06-05

use serde::Serialize;

use super::{SignatureOutcome, StatusReport};
use crate::types::DccDocument;

/// Output formats for a verification summary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    PlainText,
    Json,
}

#[derive(Serialize)]
struct Summary<'a> {
    uid: Option<&'a str>,
    version: Option<&'a str>,
    mandatory_language: Option<&'a str>,
    calibration_date: Option<String>,
    laboratory: Option<&'a str>,
    status: &'a StatusReport,
}

/// Formats a loaded document's status into text or JSON
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn format(
        report: &StatusReport,
        document: &DccDocument,
        format: ReportFormat,
    ) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::PlainText => Ok(Self::to_text(report, document)),
            ReportFormat::Json => Self::to_json(report, document),
        }
    }

    fn to_text(report: &StatusReport, document: &DccDocument) -> String {
        let mut output = String::new();
        output.push_str("DCC Verification Report\n");
        output.push_str("=======================\n\n");

        let field = |value: Option<&str>| value.unwrap_or("-").to_string();
        output.push_str(&format!("UID:              {}\n", field(document.uid.as_deref())));
        output.push_str(&format!("Schema version:   {}\n", field(document.version.as_deref())));
        output.push_str(&format!("Language:         {}\n", field(document.mandatory_language())));
        output.push_str(&format!(
            "Calibration date: {}\n",
            document
                .end_performance_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".into())
        ));
        output.push_str(&format!("Laboratory:       {}\n\n", field(document.laboratory_name.as_deref())));

        output.push_str(&format!("Loaded:           {}\n", report.is_loaded));
        output.push_str(&format!("Signed:           {}\n", report.is_signed));
        let schema = match report.schema_valid {
            Some(valid) => valid.to_string(),
            None => "not checked".into(),
        };
        output.push_str(&format!("Schema valid:     {}\n", schema));

        let signature = match &report.signature {
            SignatureOutcome::NotVerified => "not verified".to_string(),
            SignatureOutcome::NotSigned => "not signed".to_string(),
            SignatureOutcome::Verified(verified) => format!(
                "verified ({}), signed {} by {}",
                verified.profile, verified.signing_time, verified.signer.subject
            ),
            SignatureOutcome::Failed(error) => format!("FAILED: {}", error),
            SignatureOutcome::Unsupported(reason) => format!("unsupported: {}", reason),
        };
        output.push_str(&format!("Signature:        {}\n", signature));
        output.push_str(&format!("Revocation:       {}\n", if report.revocation_checked {
            "checked"
        } else {
            "not checked"
        }));

        if !report.errors.is_empty() {
            output.push_str("\nErrors:\n");
            for error in &report.errors {
                output.push_str(&format!("  - {}\n", error));
            }
        }
        output
    }

    fn to_json(report: &StatusReport, document: &DccDocument) -> Result<String, serde_json::Error> {
        let summary = Summary {
            uid: document.uid.as_deref(),
            version: document.version.as_deref(),
            mandatory_language: document.mandatory_language(),
            calibration_date: document.end_performance_date.map(|d| d.to_string()),
            laboratory: document.laboratory_name.as_deref(),
            status: report,
        };
        serde_json::to_string_pretty(&summary)
    }
}
