use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `load_index` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LoadIndexParams {
    #[schemars(description = "Path to a saved index directory")]
    pub index_path: String,
}
