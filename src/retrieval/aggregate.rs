//! Similarity-weighted label aggregation over retrieved neighbors.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::index::CaseMetadata;

/// One label's combined evidence across the retrieved neighbors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedLabel {
    pub label: String,
    /// Mean similarity of the neighbors carrying this label.
    pub confidence: f64,
    /// How many neighbors carry this label.
    pub supporting_cases: usize,
}

/// Combine neighbors' labels into per-label confidences.
///
/// Each distinct display name gets the mean similarity of the neighbors that
/// carry it. A label repeated on the same case counts that case once. The
/// output is sorted by confidence, highest first; equal confidences keep the
/// order in which the labels were first seen.
pub fn aggregate_labels<'a, I>(neighbors: I) -> Vec<AggregatedLabel>
where
    I: IntoIterator<Item = (&'a CaseMetadata, f64)>,
{
    // (display name, similarity sum, supporting cases), in first-seen order
    let mut tallies: Vec<(String, f64, usize)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (metadata, similarity) in neighbors {
        let mut seen_on_case: HashSet<String> = HashSet::new();
        for label in &metadata.labels {
            let name = label.display_name();
            if !seen_on_case.insert(name.clone()) {
                continue;
            }
            match positions.get(&name) {
                Some(&pos) => {
                    tallies[pos].1 += similarity;
                    tallies[pos].2 += 1;
                }
                None => {
                    positions.insert(name.clone(), tallies.len());
                    tallies.push((name, similarity, 1));
                }
            }
        }
    }

    let mut aggregated: Vec<AggregatedLabel> = tallies
        .into_iter()
        .map(|(label, sum, count)| AggregatedLabel {
            label,
            confidence: sum / count as f64,
            supporting_cases: count,
        })
        .collect();
    // Stable sort: ties stay in first-seen order.
    aggregated.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    aggregated
}
