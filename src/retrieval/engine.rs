//! The retrieval engine: classification, similar-case search, and index
//! lifecycle over one shared index.
//!
//! Model calls are awaited without holding the index lock. Index work
//! (search, build, load, save) runs on the blocking pool, and a new index
//! is only swapped in once it is complete.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{InferenceStage, RetrievalError, RetrievalResult};
use crate::index::{CaseMetadata, EntryId, IndexSummary, Metric, SharedIndex, SimilarityIndex};
use crate::inference::{Classification, Classifier, Encoder};
use crate::retrieval::aggregate::aggregate_labels;
use crate::retrieval::catalog::CatalogCase;
use crate::retrieval::summary::build_summary;
use crate::retrieval::types::{
    Advisory, AnalysisResult, AnalyzeRequest, EngineStatus, SimilarCase, SimilarCasesResult,
};

#[derive(Clone)]
pub struct RetrievalEngine {
    index: Arc<SharedIndex>,
    encoder: Arc<dyn Encoder>,
    classifier: Arc<dyn Classifier>,
    metric: Metric,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("encoder", &self.encoder.name())
            .field("classifier", &self.classifier.name())
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl RetrievalEngine {
    /// `metric` is the metric new indexes are built with and loaded indexes
    /// must match.
    pub fn new(
        index: Arc<SharedIndex>,
        encoder: Arc<dyn Encoder>,
        classifier: Arc<dyn Classifier>,
        metric: Metric,
    ) -> Self {
        Self {
            index,
            encoder,
            classifier,
            metric,
        }
    }

    pub fn index(&self) -> &Arc<SharedIndex> {
        &self.index
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Run the branches selected by `request.mode` on one image.
    ///
    /// A missing or empty index is not an error: retrieval yields no cases and
    /// the result carries a `NO_INDEX_LOADED` advisory. `full` mode still
    /// encodes the image so it can report the embedding dimension; `rag_only`
    /// skips the encoder entirely in that case.
    pub async fn analyze(
        &self,
        image: &Path,
        request: &AnalyzeRequest,
    ) -> RetrievalResult<AnalysisResult> {
        let mode = request.mode;
        if mode.runs_retrieval() && request.top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }
        tracing::info!(image = %image.display(), mode = %mode, top_k = request.top_k, "analyze");

        let classification = if mode.runs_classifier() {
            Some(self.classify(image, request.classification_threshold).await?)
        } else {
            None
        };

        let mut similar_cases = Vec::new();
        let mut embedding_dim = None;
        let mut advisories = Vec::new();

        if mode.runs_retrieval() {
            let has_entries = self.index.size()? > 0;
            if has_entries || mode.runs_classifier() {
                let embedding = self.encode(image).await?;
                embedding_dim = mode.runs_classifier().then_some(embedding.len());
                if has_entries {
                    (similar_cases, _) = self.search_embedding(embedding, request.top_k).await?;
                } else {
                    advisories.push(Advisory::no_index_loaded());
                }
            } else {
                advisories.push(Advisory::no_index_loaded());
            }
        }

        let aggregated_labels =
            aggregate_labels(similar_cases.iter().map(|c| (&c.case, c.similarity)));
        if !request.include_reports {
            strip_reports(&mut similar_cases);
        }
        let confidence_summary = build_summary(
            self.classifier.name(),
            classification.as_ref(),
            &similar_cases,
        );

        Ok(AnalysisResult {
            mode,
            classification,
            similar_cases,
            aggregated_labels,
            embedding_dim,
            confidence_summary,
            advisories,
        })
    }

    /// Classifier-only prediction.
    pub async fn classify(&self, image: &Path, threshold: f64) -> RetrievalResult<Classification> {
        let classification = self
            .classifier
            .predict(image, threshold)
            .await
            .map_err(|source| RetrievalError::ModelInference {
                stage: InferenceStage::Classify,
                source,
            })?;
        tracing::debug!(
            image = %image.display(),
            top = ?classification.top_finding,
            positives = classification.positive_findings.len(),
            "classified"
        );
        Ok(classification)
    }

    /// Nearest reference cases to `image` plus their aggregated labels.
    pub async fn search_similar(
        &self,
        image: &Path,
        top_k: usize,
        include_reports: bool,
    ) -> RetrievalResult<SimilarCasesResult> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }
        tracing::info!(image = %image.display(), top_k, "search_similar");

        let index_size = self.index.size()?;
        if index_size == 0 {
            return Ok(SimilarCasesResult {
                similar_cases: Vec::new(),
                aggregated_labels: Vec::new(),
                index_size,
                advisories: vec![Advisory::no_index_loaded()],
            });
        }

        let embedding = self.encode(image).await?;
        let (mut similar_cases, index_size) = self.search_embedding(embedding, top_k).await?;
        let aggregated_labels =
            aggregate_labels(similar_cases.iter().map(|c| (&c.case, c.similarity)));
        if !include_reports {
            strip_reports(&mut similar_cases);
        }

        Ok(SimilarCasesResult {
            similar_cases,
            aggregated_labels,
            index_size,
            advisories: Vec::new(),
        })
    }

    /// Encode every case, build a fresh index, optionally save it, then swap
    /// it in. On any failure the previously installed index stays live.
    ///
    /// `on_progress(done, total)` is called after each image is encoded.
    pub async fn build_index(
        &self,
        cases: Vec<CatalogCase>,
        save_to: Option<&Path>,
        on_progress: impl FnMut(usize, usize) + Send,
    ) -> RetrievalResult<IndexSummary> {
        if cases.is_empty() {
            return Err(RetrievalError::EmptyBatch);
        }
        let total = cases.len();
        tracing::info!(cases = total, metric = %self.metric, "building index");

        let batch = self.encode_cases(cases, on_progress).await?;
        let dimension = self.encoder.dimension();
        let metric = self.metric;
        let save_to: Option<PathBuf> = save_to.map(Path::to_path_buf);
        let save_dir = save_to.clone();

        let index = run_blocking(move || {
            let index = SimilarityIndex::build(dimension, metric, batch)?;
            if let Some(dir) = &save_dir {
                index.save(dir)?;
            }
            Ok(index)
        })
        .await?;

        self.index.replace(index, save_to)?;
        let summary = self.installed_summary()?;
        tracing::info!(size = summary.size, dimension = summary.dimension, "index built");
        Ok(summary)
    }

    /// Encode `cases` and append them to the live index, creating one if
    /// nothing is installed. Returns the ids assigned to the new entries.
    pub async fn add_cases(
        &self,
        cases: Vec<CatalogCase>,
        on_progress: impl FnMut(usize, usize) + Send,
    ) -> RetrievalResult<Range<EntryId>> {
        if cases.is_empty() {
            return Err(RetrievalError::EmptyBatch);
        }
        let batch = self.encode_cases(cases, on_progress).await?;
        let index = Arc::clone(&self.index);
        let dimension = self.encoder.dimension();
        let metric = self.metric;
        let ids = run_blocking(move || index.append(batch, dimension, metric)).await?;
        tracing::info!(first = ids.start, added = ids.end - ids.start, "cases added");
        Ok(ids)
    }

    /// Load a saved index and swap it in.
    ///
    /// The stored metric must match the engine's metric and the stored
    /// dimension must match the encoder's.
    pub async fn load_index(&self, dir: &Path) -> RetrievalResult<IndexSummary> {
        let path = dir.to_path_buf();
        let index = run_blocking(move || SimilarityIndex::load(&path)).await?;

        if index.metric() != self.metric {
            return Err(RetrievalError::MetricMismatch {
                expected: self.metric,
                found: index.metric(),
            });
        }
        if index.dimension() != self.encoder.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.encoder.dimension(),
                actual: index.dimension(),
            });
        }

        self.index.replace(index, Some(dir.to_path_buf()))?;
        self.installed_summary()
    }

    /// Persist the live index to `dir`.
    pub async fn save_index(&self, dir: &Path) -> RetrievalResult<IndexSummary> {
        let index = Arc::clone(&self.index);
        let path = dir.to_path_buf();
        run_blocking(move || index.save(&path)).await
    }

    pub fn status(&self) -> RetrievalResult<EngineStatus> {
        let index = self.index.summary()?;
        Ok(EngineStatus {
            index_loaded: index.is_some(),
            index_size: index.as_ref().map_or(0, |s| s.size),
            index,
            configured_metric: self.metric,
            encoder: self.encoder.name().to_string(),
            encoder_dimension: self.encoder.dimension(),
            classifier: self.classifier.name().to_string(),
        })
    }

    async fn encode(&self, image: &Path) -> RetrievalResult<Vec<f32>> {
        self.encoder
            .encode(image)
            .await
            .map_err(|source| RetrievalError::ModelInference {
                stage: InferenceStage::Encode,
                source,
            })
    }

    async fn encode_cases(
        &self,
        cases: Vec<CatalogCase>,
        mut on_progress: impl FnMut(usize, usize) + Send,
    ) -> RetrievalResult<Vec<(Vec<f32>, CaseMetadata)>> {
        let total = cases.len();
        let mut batch = Vec::with_capacity(total);
        for (done, case) in cases.into_iter().enumerate() {
            let embedding = self.encode(&case.image).await?;
            batch.push((embedding, case.metadata));
            on_progress(done + 1, total);
        }
        Ok(batch)
    }

    /// Search and resolve metadata under one read lock, so every case and the
    /// returned index size come from the same index.
    async fn search_embedding(
        &self,
        query: Vec<f32>,
        top_k: usize,
    ) -> RetrievalResult<(Vec<SimilarCase>, usize)> {
        let index = Arc::clone(&self.index);
        run_blocking(move || {
            index.read(|installed| {
                let idx = installed.ok_or(RetrievalError::NoIndexLoaded)?;
                let cases = idx
                    .search(&query, top_k)?
                    .into_iter()
                    .map(|n| {
                        let entry = idx.get(n.id)?;
                        Ok(SimilarCase {
                            id: n.id,
                            distance: n.distance,
                            similarity: idx.similarity(n.distance),
                            case: entry.metadata.clone(),
                        })
                    })
                    .collect::<RetrievalResult<Vec<_>>>()?;
                Ok((cases, idx.size()))
            })?
        })
        .await
    }

    fn installed_summary(&self) -> RetrievalResult<IndexSummary> {
        self.index.summary()?.ok_or(RetrievalError::NoIndexLoaded)
    }
}

fn strip_reports(cases: &mut [SimilarCase]) {
    for case in cases {
        case.case.report = None;
    }
}

async fn run_blocking<T, F>(f: F) -> RetrievalResult<T>
where
    F: FnOnce() -> RetrievalResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RetrievalError::TaskFailed(e.to_string()))?
}
