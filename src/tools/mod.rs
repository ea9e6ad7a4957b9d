pub mod analyze_image;
pub mod build_index;
pub mod classify_image;
pub mod load_index;
pub mod search_similar_cases;

use analyze_image::AnalyzeImageParams;
use build_index::BuildIndexParams;
use classify_image::ClassifyImageParams;
use load_index::LoadIndexParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_similar_cases::SearchSimilarCasesParams;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use medvision::config::{expand_tilde, MedVisionConfig};
use medvision::error::RetrievalError;
use medvision::retrieval::{scan_directory, AnalysisMode, AnalyzeRequest, RetrievalEngine};

/// The MedVision MCP tool handler. Holds the shared engine and config and
/// exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MedVisionTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<RetrievalEngine>,
    config: Arc<MedVisionConfig>,
}

#[tool_router]
impl MedVisionTools {
    pub fn new(engine: Arc<RetrievalEngine>, config: Arc<MedVisionConfig>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
            config,
        }
    }

    #[tool(description = "Analyze a medical image. Modes: quick (classifier only), full (classifier + similar-case retrieval with label aggregation), rag_only (retrieval only). Returns classification, similar cases, aggregated labels, and a one-line confidence summary.")]
    async fn analyze_image(
        &self,
        Parameters(params): Parameters<AnalyzeImageParams>,
    ) -> Result<String, String> {
        const OP: &str = "analyze_image";
        let mode = match params.mode.as_deref() {
            Some(m) => m.parse::<AnalysisMode>().map_err(|e| tool_error(OP, e))?,
            None => AnalysisMode::default(),
        };
        let image = require_image(&params.image_path).map_err(|e| tool_error(OP, e))?;
        let request = AnalyzeRequest {
            mode,
            top_k: params.top_k.unwrap_or(self.config.retrieval.default_top_k),
            classification_threshold: params
                .threshold
                .unwrap_or(self.config.retrieval.classification_threshold),
            include_reports: params
                .include_reports
                .unwrap_or(self.config.retrieval.include_reports),
        };

        let result = self
            .engine
            .analyze(&image, &request)
            .await
            .map_err(|e| tool_error(OP, e))?;

        tracing::info!(
            mode = %result.mode,
            similar = result.similar_cases.len(),
            summary = %result.confidence_summary,
            "image analyzed"
        );
        to_json(&result)
    }

    #[tool(description = "Classify a medical image. Returns per-label probabilities, positive findings above the threshold, and the top finding.")]
    async fn classify_image(
        &self,
        Parameters(params): Parameters<ClassifyImageParams>,
    ) -> Result<String, String> {
        const OP: &str = "classify_image";
        let image = require_image(&params.image_path).map_err(|e| tool_error(OP, e))?;
        let threshold = params
            .threshold
            .unwrap_or(self.config.retrieval.classification_threshold);

        let classification = self
            .engine
            .classify(&image, threshold)
            .await
            .map_err(|e| tool_error(OP, e))?;
        to_json(&classification)
    }

    #[tool(description = "Find the most similar reference cases to an image and aggregate their labels weighted by similarity.")]
    async fn search_similar_cases(
        &self,
        Parameters(params): Parameters<SearchSimilarCasesParams>,
    ) -> Result<String, String> {
        const OP: &str = "search_similar_cases";
        let image = require_image(&params.image_path).map_err(|e| tool_error(OP, e))?;
        let top_k = params.top_k.unwrap_or(self.config.retrieval.default_top_k);
        let include_reports = params
            .include_reports
            .unwrap_or(self.config.retrieval.include_reports);

        let result = self
            .engine
            .search_similar(&image, top_k, include_reports)
            .await
            .map_err(|e| tool_error(OP, e))?;
        to_json(&result)
    }

    #[tool(description = "Build a reference index from a directory of images and an optional JSON metadata file, save it, and make it the live index.")]
    async fn build_index(
        &self,
        Parameters(params): Parameters<BuildIndexParams>,
    ) -> Result<String, String> {
        const OP: &str = "build_index";
        let image_dir = expand_tilde(&params.image_dir);
        let metadata_file = params.metadata_file.as_deref().map(expand_tilde);
        let output = params
            .output_path
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(|| self.config.resolved_default_output());

        tracing::info!(
            image_dir = %image_dir.display(),
            output = %output.display(),
            "build_index called"
        );

        // Directory scan is sync I/O → spawn_blocking
        let cases = tokio::task::spawn_blocking(move || {
            scan_directory(&image_dir, metadata_file.as_deref())
        })
        .await
        .map_err(|e| tool_error(OP, RetrievalError::TaskFailed(e.to_string())))?
        .map_err(|e| tool_error(OP, e))?;

        let summary = self
            .engine
            .build_index(cases, Some(&output), |done, total| {
                tracing::debug!(done, total, "encoded reference image");
            })
            .await
            .map_err(|e| tool_error(OP, e))?;

        let output_path = std::path::absolute(&output).unwrap_or(output);
        Ok(serde_json::json!({
            "status": "success",
            "index_size": summary.size,
            "output_path": output_path,
            "index": summary,
        })
        .to_string())
    }

    #[tool(description = "Load a previously saved reference index and make it the live index.")]
    async fn load_index(
        &self,
        Parameters(params): Parameters<LoadIndexParams>,
    ) -> Result<String, String> {
        const OP: &str = "load_index";
        let path = expand_tilde(&params.index_path);
        let summary = self
            .engine
            .load_index(&path)
            .await
            .map_err(|e| tool_error(OP, e))?;

        tracing::info!(size = summary.size, path = %path.display(), "index loaded");
        Ok(serde_json::json!({
            "status": "success",
            "index_size": summary.size,
            "index": summary,
        })
        .to_string())
    }

    #[tool(description = "Report engine status: whether an index is loaded, its size, dimension and metric, and the configured models.")]
    async fn engine_status(&self) -> Result<String, String> {
        let status = self
            .engine
            .status()
            .map_err(|e| tool_error("engine_status", e))?;
        to_json(&status)
    }
}

#[tool_handler]
impl ServerHandler for MedVisionTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "MedVision analyzes medical images. Use analyze_image for classification plus \
                 similar-case retrieval, search_similar_cases for retrieval alone, and \
                 build_index or load_index to set up the reference collection."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

fn require_image(raw: &str) -> Result<PathBuf, RetrievalError> {
    let path = expand_tilde(raw);
    if path.is_file() {
        Ok(path)
    } else {
        Err(RetrievalError::ImageNotFound(path))
    }
}

/// Render a failure as the `{operation, kind, message}` JSON object.
fn tool_error(operation: &str, err: RetrievalError) -> String {
    tracing::warn!(operation, kind = err.kind(), error = %err, "tool call failed");
    let object = err.to_object(operation);
    serde_json::to_string(&object).unwrap_or_else(|_| object.message)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}
