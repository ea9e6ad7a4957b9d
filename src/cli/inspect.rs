//! CLI `index inspect` command: describe a saved index without loading any models.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use medvision::index::SimilarityIndex;

/// Print size, dimension, metric, and the label distribution of a saved index.
pub fn inspect(dir: &Path) -> Result<()> {
    let index = SimilarityIndex::load(dir)
        .with_context(|| format!("failed to load index at {}", dir.display()))?;

    println!("Index: {}", dir.display());
    println!("{}", "=".repeat(50));
    println!("  Entries:        {}", index.size());
    println!("  Dimension:      {}", index.dimension());
    println!("  Metric:         {}", index.metric());

    let entries = index.store().entries();
    let unlabeled = entries.iter().filter(|e| e.metadata.labels.is_empty()).count();
    let distribution = label_distribution(entries.iter().map(|e| &e.metadata));

    println!();
    if distribution.is_empty() {
        println!("No labeled cases.");
    } else {
        println!("Labels:");
        for (label, count) in &distribution {
            println!("  {:<24} {}", label, count);
        }
    }
    if unlabeled > 0 {
        println!("  {:<24} {}", "(unlabeled)", unlabeled);
    }

    Ok(())
}

/// Count cases per label display name, most common first, ties by name.
fn label_distribution<'a>(
    cases: impl Iterator<Item = &'a medvision::index::CaseMetadata>,
) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for case in cases {
        let mut names: Vec<String> = case.labels.iter().map(|l| l.display_name()).collect();
        names.sort();
        names.dedup();
        for name in names {
            *counts.entry(name).or_default() += 1;
        }
    }
    let mut distribution: Vec<(String, usize)> = counts.into_iter().collect();
    distribution.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    distribution
}
