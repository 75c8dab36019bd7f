use std::fs;
use std::path::Path;

use indexmap::IndexSet;
use serde::Serialize;
use tracing::info;

use crate::catalog::FieldCatalog;
use crate::error::Result;
use crate::heuristic::{AnalysisOutcome, ExtractionResult, OutcomeStatus};
use crate::logging::FIELD_MATCH;

/// How many missing fields the canned recommendation names inline.
const INLINE_MISSING_FIELDS: usize = 10;

/// Catalog-derived advice. Independent of what the PDF contained, apart
/// from `pdf_suggested_fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub messages: Vec<String>,
    /// Reference fields not in the current set. Never truncated.
    pub missing_fields: Vec<String>,
    pub pdf_suggested_fields: Vec<String>,
}

impl Recommendation {
    pub fn from_catalog(catalog: &FieldCatalog, matched_labels: &IndexSet<String>) -> Self {
        let missing_fields = catalog.missing_fields();
        let shown = &missing_fields[..missing_fields.len().min(INLINE_MISSING_FIELDS)];
        let messages = vec![
            format!("Current JMR form has {} fields", catalog.current_fields.len()),
            format!(
                "Typical JMR forms may require up to {} fields",
                catalog.reference_fields.len()
            ),
            format!("Consider adding these potentially missing fields: {shown:?}"),
            "Review the PDF manually to identify specific field requirements".to_string(),
            "Consider adding structure, tree, and well detail sections if not present".to_string(),
        ];
        Recommendation {
            messages,
            pdf_suggested_fields: catalog.suggested_fields(matched_labels),
            missing_fields,
        }
    }
}

/// What gets printed and persisted at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub status: OutcomeStatus,
    #[serde(flatten)]
    pub extraction: ExtractionResult,
    pub recommendations: Vec<String>,
    pub suggested_additional_fields: Vec<String>,
    pub pdf_suggested_fields: Vec<String>,
    pub current_fields: Vec<String>,
}

impl AnalysisReport {
    pub fn new(outcome: &AnalysisOutcome, catalog: &FieldCatalog) -> Self {
        let extraction = outcome.result().clone();
        let recommendation = Recommendation::from_catalog(catalog, &extraction.matched_labels);
        AnalysisReport {
            status: outcome.status(),
            extraction,
            recommendations: recommendation.messages,
            suggested_additional_fields: recommendation.missing_fields,
            pdf_suggested_fields: recommendation.pdf_suggested_fields,
            current_fields: catalog.current_fields.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as indented UTF-8 JSON, replacing any existing file.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!(target: FIELD_MATCH, path = %path.display(), "report written");
        Ok(())
    }
}
