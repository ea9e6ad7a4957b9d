//! MCP `search_similar_cases` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_similar_cases` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchSimilarCasesParams {
    /// Path to the query image.
    #[schemars(description = "Path to the query image")]
    pub image_path: String,

    /// Number of similar cases to return. Defaults to the configured value.
    #[schemars(description = "Number of similar cases to return (at least 1). Defaults to 5.")]
    pub top_k: Option<usize>,

    /// If `false`, report text is dropped from each returned case.
    #[schemars(description = "Include each case's full report text. Defaults to true.")]
    pub include_reports: Option<bool>,
}
