//! Append-only embedding storage.
//!
//! [`EmbeddingStore`] owns the raw vectors and their metadata. Entries get
//! sequential ids in insertion order and are never mutated or removed; the
//! whole store is replaced when an index is rebuilt or loaded.

use std::ops::Range;
use std::path::Path;

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::metric::Metric;
use crate::index::persist;
use crate::index::types::{CaseMetadata, EntryId, IndexEntry};

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingStore {
    dimension: usize,
    metric: Metric,
    entries: Vec<IndexEntry>,
}

impl EmbeddingStore {
    /// Create an empty store of fixed `dimension` and `metric`.
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_entries(dimension: usize, metric: Metric, entries: Vec<IndexEntry>) -> Self {
        Self {
            dimension,
            metric,
            entries,
        }
    }

    /// Append a batch, assigning the next sequential ids.
    ///
    /// The batch is validated before anything is written: a single
    /// wrong-length embedding rejects the whole batch and leaves the store
    /// unchanged. Returns the range of ids assigned.
    pub fn add(
        &mut self,
        batch: impl IntoIterator<Item = (Vec<f32>, CaseMetadata)>,
    ) -> RetrievalResult<Range<EntryId>> {
        let batch: Vec<(Vec<f32>, CaseMetadata)> = batch.into_iter().collect();
        if batch.is_empty() {
            return Err(RetrievalError::EmptyBatch);
        }
        if let Some((embedding, _)) = batch.iter().find(|(e, _)| e.len() != self.dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let start = self.entries.len() as EntryId;
        self.entries.reserve(batch.len());
        for (offset, (embedding, metadata)) in batch.into_iter().enumerate() {
            self.entries.push(IndexEntry {
                id: start + offset as EntryId,
                embedding,
                metadata,
            });
        }
        let end = self.entries.len() as EntryId;

        tracing::debug!(first = start, count = end - start, "entries appended");
        Ok(start..end)
    }

    pub fn get(&self, id: EntryId) -> RetrievalResult<&IndexEntry> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.entries.get(i))
            .ok_or(RetrievalError::NotFound {
                id,
                size: self.entries.len(),
            })
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Persist to the directory `dir` (see [`persist`] for the layout).
    pub fn save(&self, dir: impl AsRef<Path>) -> RetrievalResult<()> {
        persist::write_store(self, dir.as_ref())
    }

    /// Load a store previously written by [`save`](Self::save).
    pub fn load(dir: impl AsRef<Path>) -> RetrievalResult<Self> {
        persist::read_store(dir.as_ref())
    }
}
