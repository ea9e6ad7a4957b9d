//! CLI `index build` command: encode a directory of reference images into a saved index.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;

use medvision::config::MedVisionConfig;
use medvision::index::SharedIndex;
use medvision::inference;
use medvision::retrieval::{scan_directory, RetrievalEngine};

/// Build an index from `image_dir` and save it to `output` (or the configured
/// default output directory).
pub async fn build(
    config: &MedVisionConfig,
    image_dir: &Path,
    metadata: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let cases = scan_directory(image_dir, metadata)
        .with_context(|| format!("failed to scan {}", image_dir.display()))?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.resolved_default_output());

    let (encoder, classifier) = inference::create_models(&config.models)?;
    let engine = RetrievalEngine::new(
        Arc::new(SharedIndex::empty()),
        encoder,
        classifier,
        config.retrieval.metric,
    );

    let total = cases.len();
    println!(
        "Encoding {total} images with '{}' ({} metric)...",
        config.models.encoder_name, config.retrieval.metric
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .context("invalid progress template")?
            .progress_chars("##-"),
    );

    let progress = pb.clone();
    let result = engine
        .build_index(cases, Some(&output), move |done, _total| {
            progress.set_position(done as u64);
        })
        .await;
    pb.finish_and_clear();

    let summary = result.context("index build failed")?;
    println!(
        "Indexed {} cases ({}-dim, {}) into {}",
        summary.size,
        summary.dimension,
        summary.metric,
        output.display()
    );
    Ok(())
}
