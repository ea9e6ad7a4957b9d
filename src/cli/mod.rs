pub mod analyze;
pub mod build;
pub mod inspect;
pub mod search;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use medvision::config::MedVisionConfig;
use medvision::retrieval::RetrievalEngine;

/// Engine for one-shot commands. `index_override` replaces the configured
/// startup index for this invocation.
async fn engine_for_command(
    mut config: MedVisionConfig,
    index_override: Option<&Path>,
) -> Result<Arc<RetrievalEngine>> {
    if let Some(path) = index_override {
        config.storage.index_path = Some(path.to_string_lossy().into_owned());
    }
    let (engine, _config) = crate::server::setup_engine(config).await?;
    Ok(engine)
}

/// Shorten report text for terminal output.
fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
