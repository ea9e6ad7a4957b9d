//! External model collaborators.
//!
//! The engine never runs neural networks itself. It talks to an [`Encoder`]
//! (image → fixed-dimension embedding) and a [`Classifier`] (image → label
//! probabilities) through these traits. [`http`] implements both against a
//! model-serving endpoint; tests substitute recording stubs.
//!
//! Both traits are async so a dropped request cancels the in-flight call.

pub mod http;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a model collaborator.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The encoder could not produce an embedding (unreadable or invalid image).
    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("classification failed: {0}")]
    Classification(String),

    /// The model-serving endpoint could not be reached or answered badly.
    #[error("model service request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Direct classifier output for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Probability for every label the classifier knows.
    pub predictions: BTreeMap<String, f64>,
    /// Labels at or above the requested threshold.
    #[serde(default)]
    pub positive_findings: Vec<String>,
    #[serde(default)]
    pub top_finding: Option<String>,
    #[serde(default)]
    pub top_probability: f64,
}

impl Classification {
    /// Derive `positive_findings`, `top_finding`, and `top_probability` from
    /// raw predictions. Equal probabilities resolve to the alphabetically
    /// first label.
    pub fn from_predictions(predictions: BTreeMap<String, f64>, threshold: f64) -> Self {
        let mut positive: Vec<(&String, f64)> = predictions
            .iter()
            .filter(|(_, p)| **p >= threshold)
            .map(|(label, p)| (label, *p))
            .collect();
        positive.sort_by(|a, b| b.1.total_cmp(&a.1));

        let top = predictions
            .iter()
            .fold(None::<(&String, f64)>, |best, (label, p)| match best {
                Some((_, bp)) if bp >= *p => best,
                _ => Some((label, *p)),
            });

        Self {
            positive_findings: positive.iter().map(|(l, _)| (*l).clone()).collect(),
            top_finding: top.map(|(l, _)| l.clone()),
            top_probability: top.map_or(0.0, |(_, p)| p),
            predictions,
        }
    }
}

/// Maps an image to a fixed-dimension embedding.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Model name reported in status output.
    fn name(&self) -> &str;

    /// Length of every embedding this encoder produces.
    fn dimension(&self) -> usize;

    async fn encode(&self, image: &Path) -> Result<Vec<f32>, ModelError>;
}

/// Maps an image to per-label probabilities.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Name used as the prefix of the analysis summary (e.g. `"DenseNet"`).
    fn name(&self) -> &str;

    async fn predict(&self, image: &Path, threshold: f64) -> Result<Classification, ModelError>;
}

/// Build the HTTP encoder and classifier from config.
pub fn create_models(
    config: &crate::config::ModelsConfig,
) -> anyhow::Result<(Arc<dyn Encoder>, Arc<dyn Classifier>)> {
    let client = http::ModelServiceClient::new(config)?;
    let encoder = http::HttpEncoder::new(client.clone(), &config.encoder_name, config.embedding_dim);
    let classifier = http::HttpClassifier::new(client, &config.classifier_name);
    Ok((Arc::new(encoder), Arc::new(classifier)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preds(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(l, p)| (l.to_string(), *p)).collect()
    }

    #[test]
    fn derives_top_and_positive_findings() {
        let c = Classification::from_predictions(
            preds(&[("Atelectasis", 0.2), ("Effusion", 0.55), ("Infiltration", 0.85)]),
            0.5,
        );
        assert_eq!(c.top_finding.as_deref(), Some("Infiltration"));
        assert_eq!(c.top_probability, 0.85);
        assert_eq!(c.positive_findings, vec!["Infiltration", "Effusion"]);
    }

    #[test]
    fn equal_probabilities_pick_first_label() {
        let c = Classification::from_predictions(preds(&[("B", 0.4), ("A", 0.4)]), 0.5);
        assert_eq!(c.top_finding.as_deref(), Some("A"));
        assert!(c.positive_findings.is_empty());
    }

    #[test]
    fn empty_predictions() {
        let c = Classification::from_predictions(BTreeMap::new(), 0.5);
        assert_eq!(c.top_finding, None);
        assert_eq!(c.top_probability, 0.0);
    }
}
