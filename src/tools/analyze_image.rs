//! MCP `analyze_image` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `analyze_image` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeImageParams {
    /// Path to the image to analyze (PNG, JPEG, or DICOM).
    #[schemars(description = "Path to the image to analyze (PNG, JPEG, or DICOM)")]
    pub image_path: String,

    /// `"quick"`, `"full"`, or `"rag_only"`. Defaults to `"full"`.
    #[schemars(
        description = "Analysis mode: 'quick' (classifier only), 'full' (classifier + similar-case retrieval), 'rag_only' (retrieval only). Defaults to 'full'."
    )]
    pub mode: Option<String>,

    /// Number of similar cases to retrieve. Defaults to the configured value.
    #[schemars(description = "Number of similar cases to retrieve (at least 1). Defaults to 5.")]
    pub top_k: Option<usize>,

    /// Probability threshold for positive findings.
    #[schemars(description = "Probability threshold for positive findings (0.0-1.0). Defaults to 0.5.")]
    pub threshold: Option<f64>,

    #[schemars(description = "Include each similar case's full report text. Defaults to true.")]
    pub include_reports: Option<bool>,
}
