//! MCP `build_index` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `build_index` MCP tool.
///
/// The metadata file is a JSON array of case records. Each record is matched
/// to an image by the file name of its `image_path` (or `filename`) field.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BuildIndexParams {
    #[schemars(description = "Directory containing the reference images (.png, .jpg, .jpeg, .dcm, .dicom)")]
    pub image_dir: String,

    #[schemars(
        description = "Optional JSON file with an array of case records (case_id, labels, report, image_path or filename)"
    )]
    pub metadata_file: Option<String>,

    /// Directory to save the index to. Defaults to the configured output path.
    #[schemars(description = "Directory to save the index to. Defaults to ~/.medvision/rag_index.")]
    pub output_path: Option<String>,
}
