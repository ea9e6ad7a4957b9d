//! Request and response types for the retrieval engine.

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::index::{CaseMetadata, EntryId, IndexSummary, Metric};
use crate::inference::Classification;
use crate::retrieval::aggregate::AggregatedLabel;

/// Which analysis branches a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Classifier only.
    Quick,
    /// Classifier, retrieval, aggregation, and the embedding dimension.
    #[default]
    Full,
    /// Retrieval and aggregation, no classifier call.
    RagOnly,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Full => "full",
            Self::RagOnly => "rag_only",
        }
    }

    pub fn runs_classifier(&self) -> bool {
        matches!(self, Self::Quick | Self::Full)
    }

    pub fn runs_retrieval(&self) -> bool {
        matches!(self, Self::Full | Self::RagOnly)
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = RetrievalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(Self::Quick),
            "full" => Ok(Self::Full),
            "rag_only" => Ok(Self::RagOnly),
            other => Err(RetrievalError::InvalidMode(other.to_string())),
        }
    }
}

/// Knobs for a single [`analyze`](crate::retrieval::RetrievalEngine::analyze) call.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub mode: AnalysisMode,
    pub top_k: usize,
    pub classification_threshold: f64,
    /// Keep each neighbor's full report text in the response.
    pub include_reports: bool,
}

impl AnalyzeRequest {
    pub fn new(mode: AnalysisMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::Full,
            top_k: 5,
            classification_threshold: 0.5,
            include_reports: true,
        }
    }
}

/// A retrieved neighbor, resolved to its case metadata.
///
/// The metadata serializes as a nested `case` object. Metadata records carry
/// arbitrary extra keys, so they must not share a level with `id` and
/// `similarity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarCase {
    pub id: EntryId,
    pub distance: f32,
    pub similarity: f64,
    pub case: CaseMetadata,
}

/// A non-fatal condition reported next to otherwise successful results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advisory {
    pub kind: &'static str,
    pub message: String,
}

impl From<&RetrievalError> for Advisory {
    fn from(err: &RetrievalError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl Advisory {
    pub fn no_index_loaded() -> Self {
        Self::from(&RetrievalError::NoIndexLoaded)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub mode: AnalysisMode,
    pub classification: Option<Classification>,
    pub similar_cases: Vec<SimilarCase>,
    pub aggregated_labels: Vec<AggregatedLabel>,
    /// Length of the query embedding (`full` mode only); the vector itself is
    /// never returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<usize>,
    pub confidence_summary: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,
}

impl AnalysisResult {
    pub fn has_advisory(&self, kind: &str) -> bool {
        self.advisories.iter().any(|a| a.kind == kind)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarCasesResult {
    pub similar_cases: Vec<SimilarCase>,
    pub aggregated_labels: Vec<AggregatedLabel>,
    pub index_size: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub index_loaded: bool,
    pub index_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexSummary>,
    pub configured_metric: Metric,
    pub encoder: String,
    pub encoder_dimension: usize,
    pub classifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_closed_set() {
        assert_eq!("quick".parse::<AnalysisMode>().unwrap(), AnalysisMode::Quick);
        assert_eq!("full".parse::<AnalysisMode>().unwrap(), AnalysisMode::Full);
        assert_eq!("rag_only".parse::<AnalysisMode>().unwrap(), AnalysisMode::RagOnly);
        let err = "deep".parse::<AnalysisMode>().unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidMode(ref m) if m == "deep"));
    }

    #[test]
    fn mode_branches() {
        assert!(AnalysisMode::Quick.runs_classifier());
        assert!(!AnalysisMode::Quick.runs_retrieval());
        assert!(AnalysisMode::Full.runs_classifier() && AnalysisMode::Full.runs_retrieval());
        assert!(!AnalysisMode::RagOnly.runs_classifier());
        assert!(AnalysisMode::RagOnly.runs_retrieval());
    }

    #[test]
    fn similar_case_nests_metadata() {
        let case = SimilarCase {
            id: 3,
            distance: 0.25,
            similarity: 0.8,
            case: CaseMetadata::new("mimic-003", "/img/3.png").with_labels(["Edema"]),
        };
        let json = serde_json::to_value(&case).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["similarity"], 0.8);
        assert_eq!(json["case"]["case_id"], "mimic-003");
        assert_eq!(json["case"]["labels"][0], "Edema");
        assert!(json["case"].get("report").is_none());
    }

    #[test]
    fn metadata_keys_cannot_shadow_neighbor_fields() {
        let mut metadata = CaseMetadata::new("x", "/img/x.png");
        metadata.extra.insert("id".into(), serde_json::json!("PAT-77"));
        metadata.extra.insert("similarity".into(), serde_json::json!(0.1));
        let case = SimilarCase {
            id: 0,
            distance: 0.0,
            similarity: 0.9,
            case: metadata,
        };

        let text = serde_json::to_string(&case).unwrap();
        assert_eq!(text.matches("\"similarity\"").count(), 2);
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["id"], 0);
        assert_eq!(json["similarity"], 0.9);
        assert_eq!(json["case"]["id"], "PAT-77");
        assert_eq!(json["case"]["similarity"], 0.1);
    }
}
