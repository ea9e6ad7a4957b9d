use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `classify_image` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClassifyImageParams {
    #[schemars(description = "Path to the image to classify")]
    pub image_path: String,

    #[schemars(description = "Probability threshold for positive findings (0.0-1.0). Defaults to 0.5.")]
    pub threshold: Option<f64>,
}
