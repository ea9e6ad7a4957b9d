//! Error taxonomy for the index and retrieval engine.
//!
//! [`RetrievalError`] covers every failure the core can surface. Each variant
//! has a stable [`kind`](RetrievalError::kind) code so callers can match on it
//! without parsing messages, and [`ErrorObject`] is the structured form handed
//! to tool callers.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::index::metric::Metric;
use crate::inference::ModelError;

/// Result alias used throughout the index and retrieval modules.
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Which external model call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStage {
    Encode,
    Classify,
}

impl std::fmt::Display for InferenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Encode => "encode",
            Self::Classify => "classify",
        })
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("refusing to add an empty batch of entries")]
    EmptyBatch,

    #[error("entry {id} not found (index holds {size} entries)")]
    NotFound { id: u64, size: usize },

    #[error("index at '{path}' is corrupt: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("failed to read index at '{path}': {reason}")]
    UnreadableIndex { path: PathBuf, reason: String },

    #[error("failed to write index at '{path}': {reason}")]
    IndexWrite { path: PathBuf, reason: String },

    #[error("image not found: '{0}'")]
    ImageNotFound(PathBuf),

    #[error("unknown analysis mode '{0}'. Supported: quick, full, rag_only")]
    InvalidMode(String),

    #[error("top_k must be at least 1")]
    InvalidTopK,

    /// Advisory only: the engine reports it alongside partial results.
    #[error("no reference index loaded; build or load an index first")]
    NoIndexLoaded,

    #[error("index metric is {found}, but the engine is configured for {expected}")]
    MetricMismatch { expected: Metric, found: Metric },

    #[error("model inference failed during {stage}: {source}")]
    ModelInference {
        stage: InferenceStage,
        #[source]
        source: ModelError,
    },

    #[error("case catalog error: {0}")]
    Catalog(String),

    #[error("index lock was poisoned by a panicking writer")]
    LockPoisoned,

    #[error("background task failed: {0}")]
    TaskFailed(String),
}

impl RetrievalError {
    /// Stable, machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::EmptyBatch => "EMPTY_BATCH",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::CorruptIndex { .. } => "CORRUPT_INDEX",
            Self::UnreadableIndex { .. } => "UNREADABLE_INDEX",
            Self::IndexWrite { .. } => "INDEX_WRITE_FAILED",
            Self::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            Self::InvalidMode(_) => "INVALID_MODE",
            Self::InvalidTopK => "INVALID_TOP_K",
            Self::NoIndexLoaded => "NO_INDEX_LOADED",
            Self::MetricMismatch { .. } => "METRIC_MISMATCH",
            Self::ModelInference { .. } => "MODEL_INFERENCE_ERROR",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::LockPoisoned => "LOCK_POISONED",
            Self::TaskFailed(_) => "BACKGROUND_TASK_FAILED",
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::UnreadableIndex {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write_failed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::IndexWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Render this error as the structured object returned to tool callers.
    pub fn to_object(&self, operation: &str) -> ErrorObject {
        ErrorObject {
            operation: operation.to_string(),
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Structured error payload: the failing operation, the error kind, and a
/// human-readable message.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorObject {
    pub operation: String,
    pub kind: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(RetrievalError::EmptyBatch.kind(), "EMPTY_BATCH");
        assert_eq!(
            RetrievalError::InvalidMode("fast".into()).kind(),
            "INVALID_MODE"
        );
        assert_eq!(
            RetrievalError::DimensionMismatch {
                expected: 768,
                actual: 512
            }
            .kind(),
            "DIMENSION_MISMATCH"
        );
    }

    #[test]
    fn error_object_names_operation() {
        let err = RetrievalError::NotFound { id: 7, size: 3 };
        let obj = err.to_object("search_similar");
        assert_eq!(obj.operation, "search_similar");
        assert_eq!(obj.kind, "NOT_FOUND");
        assert!(obj.message.contains("entry 7"));
    }

    #[test]
    fn model_inference_message_names_stage() {
        let err = RetrievalError::ModelInference {
            stage: InferenceStage::Encode,
            source: ModelError::Encoding("unreadable image".into()),
        };
        assert!(err.to_string().contains("during encode"));
        assert_eq!(err.kind(), "MODEL_INFERENCE_ERROR");
    }
}
