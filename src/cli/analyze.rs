//! CLI `analyze` command: run one analysis and print the result.

use anyhow::Result;
use std::path::Path;

use medvision::config::MedVisionConfig;
use medvision::retrieval::{AnalysisMode, AnalyzeRequest};

/// Analyze one image. With `json`, print the full result as JSON instead of
/// the human-readable view.
pub async fn analyze(
    config: MedVisionConfig,
    image: &Path,
    mode: &str,
    index: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mode: AnalysisMode = mode.parse()?;
    let request = AnalyzeRequest {
        mode,
        top_k: config.retrieval.default_top_k,
        classification_threshold: config.retrieval.classification_threshold,
        include_reports: config.retrieval.include_reports,
    };
    let engine = super::engine_for_command(config, index).await?;

    let result = engine.analyze(image, &request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.confidence_summary);
    println!("{}", "=".repeat(50));

    if let Some(c) = &result.classification {
        println!("Positive findings: {}", display_list(&c.positive_findings));
    }
    if let Some(dim) = result.embedding_dim {
        println!("Embedding dim:     {dim}");
    }
    for advisory in &result.advisories {
        println!("Note: {}", advisory.message);
    }

    if !result.similar_cases.is_empty() {
        println!();
        println!("Similar cases:");
        for case in &result.similar_cases {
            println!("  {:<24} {:.2}", case.case.case_id, case.similarity);
        }
    }
    if !result.aggregated_labels.is_empty() {
        println!();
        println!("Aggregated labels:");
        for label in &result.aggregated_labels {
            println!(
                "  {:<24} {:.2} ({} case(s))",
                label.label, label.confidence, label.supporting_cases
            );
        }
    }

    Ok(())
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}
