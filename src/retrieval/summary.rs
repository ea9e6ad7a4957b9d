//! One-line, human-readable analysis summary.

use crate::inference::Classification;
use crate::retrieval::types::SimilarCase;

/// Returned when neither analysis branch produced anything.
pub const NO_ANALYSIS: &str = "No analysis performed";

/// `"<classifier>: <top label> (<pct>%) | RAG Top-1: <case id> (<pct>%)"`.
///
/// Either half is left out when its branch did not run or found nothing.
pub fn build_summary(
    classifier_name: &str,
    classification: Option<&Classification>,
    similar_cases: &[SimilarCase],
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(2);

    if let Some(c) = classification {
        if let Some(top) = &c.top_finding {
            parts.push(format!(
                "{classifier_name}: {top} ({})",
                percent(c.top_probability)
            ));
        }
    }

    if let Some(nearest) = similar_cases.first() {
        parts.push(format!(
            "RAG Top-1: {} ({})",
            nearest.case.case_id,
            percent(nearest.similarity)
        ));
    }

    if parts.is_empty() {
        NO_ANALYSIS.to_string()
    } else {
        parts.join(" | ")
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}
