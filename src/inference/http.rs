//! HTTP model-serving client.
//!
//! Implements [`Encoder`] and [`Classifier`] against a JSON endpoint:
//!
//! - `POST {endpoint}/encode` with `{"image_path": ...}` → `{"embedding": [...]}`
//! - `POST {endpoint}/classify` with `{"image_path": ..., "threshold": ...}` →
//!   `{"predictions": {...}, "top_finding": ..., "top_probability": ...}`
//!
//! A 4xx answer means the service rejected the image and is reported as an
//! encoding/classification error; anything else unexpected is a transport
//! error.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Classification, Classifier, Encoder, ModelError};
use crate::config::ModelsConfig;

#[derive(Debug, Clone)]
pub struct ModelServiceClient {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct EncodeRequest<'a> {
    image_path: &'a str,
}

#[derive(Deserialize)]
struct EncodeResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_path: &'a str,
    threshold: f64,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    predictions: BTreeMap<String, f64>,
    #[serde(default)]
    positive_findings: Option<Vec<String>>,
    #[serde(default)]
    top_finding: Option<String>,
    #[serde(default)]
    top_probability: Option<f64>,
}

/// Which rejection variant a 4xx maps to.
#[derive(Clone, Copy)]
enum Call {
    Encode,
    Classify,
}

impl ModelServiceClient {
    pub fn new(config: &ModelsConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build model service HTTP client")?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        route: &str,
        body: &B,
        call: Call,
    ) -> Result<R, ModelError> {
        let url = format!("{}/{route}", self.endpoint);
        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("{status}: {}", detail.trim());
            return Err(match call {
                Call::Encode => ModelError::Encoding(message),
                Call::Classify => ModelError::Classification(message),
            });
        }

        let response = response.error_for_status()?;
        Ok(response.json::<R>().await?)
    }
}

pub struct HttpEncoder {
    client: ModelServiceClient,
    name: String,
    dimension: usize,
}

impl HttpEncoder {
    pub fn new(client: ModelServiceClient, name: &str, dimension: usize) -> Self {
        Self {
            client,
            name: name.to_string(),
            dimension,
        }
    }
}

#[async_trait]
impl Encoder for HttpEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, image: &Path) -> Result<Vec<f32>, ModelError> {
        let image_path = image.to_string_lossy();
        let response: EncodeResponse = self
            .client
            .post("encode", &EncodeRequest { image_path: &image_path }, Call::Encode)
            .await?;

        if response.embedding.len() != self.dimension {
            return Err(ModelError::Encoding(format!(
                "service returned a {}-dim embedding, expected {}",
                response.embedding.len(),
                self.dimension
            )));
        }
        tracing::debug!(image = %image.display(), "image encoded");
        Ok(response.embedding)
    }
}

pub struct HttpClassifier {
    client: ModelServiceClient,
    name: String,
}

impl HttpClassifier {
    pub fn new(client: ModelServiceClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, image: &Path, threshold: f64) -> Result<Classification, ModelError> {
        let image_path = image.to_string_lossy();
        let response: ClassifyResponse = self
            .client
            .post(
                "classify",
                &ClassifyRequest {
                    image_path: &image_path,
                    threshold,
                },
                Call::Classify,
            )
            .await?;
        tracing::debug!(image = %image.display(), "image classified");
        Ok(into_classification(response, threshold))
    }
}

/// Fill in whatever summary fields the service left out.
fn into_classification(response: ClassifyResponse, threshold: f64) -> Classification {
    let mut derived = Classification::from_predictions(response.predictions, threshold);
    if let Some(positive) = response.positive_findings {
        derived.positive_findings = positive;
    }
    if let Some(top) = response.top_finding {
        derived.top_probability = response
            .top_probability
            .or_else(|| derived.predictions.get(&top).copied())
            .unwrap_or(0.0);
        derived.top_finding = Some(top);
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_summary_fields_win() {
        let response: ClassifyResponse = serde_json::from_value(serde_json::json!({
            "predictions": {"Cardiomegaly": 0.7, "Edema": 0.72},
            "top_finding": "Cardiomegaly",
            "top_probability": 0.7
        }))
        .unwrap();
        let c = into_classification(response, 0.5);
        assert_eq!(c.top_finding.as_deref(), Some("Cardiomegaly"));
        assert_eq!(c.top_probability, 0.7);
        assert_eq!(c.positive_findings, vec!["Edema", "Cardiomegaly"]);
    }

    #[test]
    fn named_top_finding_takes_its_own_probability() {
        let response: ClassifyResponse = serde_json::from_value(serde_json::json!({
            "predictions": {"Cardiomegaly": 0.7, "Edema": 0.72},
            "top_finding": "Cardiomegaly"
        }))
        .unwrap();
        let c = into_classification(response, 0.5);
        assert_eq!(c.top_finding.as_deref(), Some("Cardiomegaly"));
        assert_eq!(c.top_probability, 0.7);

        let response: ClassifyResponse = serde_json::from_value(serde_json::json!({
            "predictions": {"Edema": 0.72},
            "top_finding": "Pneumothorax"
        }))
        .unwrap();
        let c = into_classification(response, 0.5);
        assert_eq!(c.top_finding.as_deref(), Some("Pneumothorax"));
        assert_eq!(c.top_probability, 0.0);
    }

    #[test]
    fn missing_summary_fields_are_derived() {
        let response: ClassifyResponse = serde_json::from_value(serde_json::json!({
            "predictions": {"Nodule": 0.3, "Mass": 0.6}
        }))
        .unwrap();
        let c = into_classification(response, 0.5);
        assert_eq!(c.top_finding.as_deref(), Some("Mass"));
        assert_eq!(c.top_probability, 0.6);
        assert_eq!(c.positive_findings, vec!["Mass"]);
    }

    #[test]
    fn client_trims_trailing_slash() {
        let config = ModelsConfig {
            endpoint: "http://localhost:8900/".into(),
            ..ModelsConfig::default()
        };
        let client = ModelServiceClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:8900");
    }
}
