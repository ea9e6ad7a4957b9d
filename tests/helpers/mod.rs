#![allow(dead_code)]

use async_trait::async_trait;
use medvision::index::{CaseMetadata, Metric, SharedIndex};
use medvision::inference::{Classification, Classifier, Encoder, ModelError};
use medvision::retrieval::{CatalogCase, RetrievalEngine};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const DIM: usize = 4;

/// Deterministic `dim`-wide embedding with a spike at position `seed`.
pub fn spike_embedding(dim: usize, seed: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    v[seed % dim] = 1.0;
    v
}

fn file_name(image: &Path) -> String {
    image
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Encoder stub that records its calls. Embeddings come from a table keyed
/// by file name; unknown images get a spike derived from the name's bytes.
pub struct StubEncoder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl StubEncoder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: HashMap::new(),
            failing: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_embedding(mut self, name: &str, embedding: Vec<f32>) -> Self {
        self.table.insert(name.to_string(), embedding);
        self
    }

    /// Make `encode` fail for this file name.
    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Encoder for StubEncoder {
    fn name(&self) -> &str {
        "stub-encoder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, image: &Path) -> Result<Vec<f32>, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = file_name(image);
        if self.failing.contains(&name) {
            return Err(ModelError::Encoding(format!("cannot decode {name}")));
        }
        Ok(self.table.get(&name).cloned().unwrap_or_else(|| {
            let seed = name.bytes().map(usize::from).sum();
            spike_embedding(self.dimension, seed)
        }))
    }
}

/// Classifier stub with fixed predictions that records its calls.
pub struct StubClassifier {
    predictions: BTreeMap<String, f64>,
    fail: bool,
    calls: AtomicUsize,
}

impl StubClassifier {
    pub fn new(predictions: &[(&str, f64)]) -> Self {
        Self {
            predictions: predictions
                .iter()
                .map(|(label, p)| (label.to_string(), *p))
                .collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    fn name(&self) -> &str {
        "StubNet"
    }

    async fn predict(&self, _image: &Path, threshold: f64) -> Result<Classification, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ModelError::Classification("model crashed".into()));
        }
        Ok(Classification::from_predictions(
            self.predictions.clone(),
            threshold,
        ))
    }
}

/// Encoder with embeddings for `a.png`, `b.png`, `c.png`, and a query
/// `q.png` that lies closest to `b`, then `a`, then `c` under L2.
pub fn reference_encoder() -> StubEncoder {
    StubEncoder::new(DIM)
        .with_embedding("a.png", vec![1.0, 0.0, 0.0, 0.0])
        .with_embedding("b.png", vec![0.0, 1.0, 0.0, 0.0])
        .with_embedding("c.png", vec![0.0, 0.0, 1.0, 0.0])
        .with_embedding("q.png", vec![0.1, 0.9, 0.0, 0.0])
}

pub fn default_classifier() -> StubClassifier {
    StubClassifier::new(&[("Effusion", 0.8), ("Edema", 0.3), ("Nodule", 0.6)])
}

/// Catalog for `a.png`, `b.png`, `c.png` with labels and reports.
pub fn reference_cases() -> Vec<CatalogCase> {
    [
        ("a.png", "case-a", vec!["Cardiomegaly"]),
        ("b.png", "case-b", vec!["Effusion", "Cardiomegaly"]),
        ("c.png", "case-c", vec!["Nodule"]),
    ]
    .into_iter()
    .map(|(file, id, labels)| {
        let image = PathBuf::from("/refs").join(file);
        let metadata = CaseMetadata::new(id, image.to_string_lossy())
            .with_labels(labels)
            .with_report(format!("Findings for {id}."));
        CatalogCase { image, metadata }
    })
    .collect()
}

pub struct Harness {
    pub engine: RetrievalEngine,
    pub encoder: Arc<StubEncoder>,
    pub classifier: Arc<StubClassifier>,
}

pub fn harness(encoder: StubEncoder, classifier: StubClassifier, metric: Metric) -> Harness {
    let encoder = Arc::new(encoder);
    let classifier = Arc::new(classifier);
    let engine = RetrievalEngine::new(
        Arc::new(SharedIndex::empty()),
        encoder.clone(),
        classifier.clone(),
        metric,
    );
    Harness {
        engine,
        encoder,
        classifier,
    }
}

pub fn default_harness() -> Harness {
    harness(reference_encoder(), default_classifier(), Metric::L2)
}

/// Build the reference index into `h` without saving it.
pub async fn with_reference_index(h: &Harness) {
    h.engine
        .build_index(reference_cases(), None, |_, _| {})
        .await
        .unwrap();
}
