//! JSON serialization for run results.

use serde::Serialize;

use sabayes_core::TraceSummary;

use crate::artifacts::{ArtifactSet, Metadata};
use crate::pipeline::Prediction;

#[derive(Serialize)]
struct JsonReport<'a> {
    metadata: &'a Metadata,
    summary: &'a TraceSummary,
    predictions: &'a [Prediction],
}

fn report<'a>(artifacts: &'a ArtifactSet, summary: &'a TraceSummary) -> JsonReport<'a> {
    JsonReport {
        metadata: &artifacts.metadata,
        summary,
        predictions: &artifacts.predictions,
    }
}

/// Serialize metadata, `summary` and predictions to a compact JSON string.
///
/// Undefined diagnostics (a NaN R̂) are written as `null`.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for these
/// types).
pub fn to_json(artifacts: &ArtifactSet, summary: &TraceSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string(&report(artifacts, summary))
}

/// Serialize to a pretty-printed JSON string.
///
/// # Errors
///
/// Returns an error if serialization fails (should not happen for these
/// types).
pub fn to_json_pretty(
    artifacts: &ArtifactSet,
    summary: &TraceSummary,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&report(artifacts, summary))
}
