use anyhow::Result;
use std::path::Path;

use medvision::config::MedVisionConfig;

/// Run a similar-case search from the terminal.
pub async fn search(
    config: MedVisionConfig,
    image: &Path,
    top_k: Option<usize>,
    index: Option<&Path>,
) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
    let engine = super::engine_for_command(config, index).await?;

    let result = engine.search_similar(image, top_k, true).await?;

    for advisory in &result.advisories {
        println!("Note: {}", advisory.message);
    }
    if result.similar_cases.is_empty() {
        println!("No similar cases found.");
        return Ok(());
    }

    println!(
        "Top {} of {} reference case(s)\n",
        result.similar_cases.len(),
        result.index_size
    );

    for (i, case) in result.similar_cases.iter().enumerate() {
        let labels: Vec<String> = case.case.labels.iter().map(|l| l.display_name()).collect();
        println!(
            "  {}. {} (similarity: {:.2}, distance: {:.4})",
            i + 1,
            case.case.case_id,
            case.similarity,
            case.distance,
        );
        if !labels.is_empty() {
            println!("     labels: {}", labels.join(", "));
        }
        if let Some(report) = &case.case.report {
            println!("     {}", super::preview(report, 120));
        }
        println!();
    }

    if !result.aggregated_labels.is_empty() {
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
