//! The live index slot shared between concurrent requests.
//!
//! [`SharedIndex`] guards an optional [`SimilarityIndex`] with a
//! single-writer/multi-reader lock. Searches and saves take the read lock.
//! Appends take the write lock. Builds and loads construct the new index
//! without any lock and only take the write lock to swap it in, so a reader
//! observes either the previous index or the new one, never a partial build.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::metric::Metric;
use crate::index::search::SimilarityIndex;
use crate::index::types::{CaseMetadata, EntryId};

#[derive(Debug)]
struct Installed {
    index: SimilarityIndex,
    source: Option<PathBuf>,
}

/// Point-in-time description of the installed index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub size: usize,
    pub dimension: usize,
    pub metric: Metric,
    pub strategy: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct SharedIndex {
    slot: RwLock<Option<Installed>>,
}

impl SharedIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    fn read_guard(&self) -> RetrievalResult<RwLockReadGuard<'_, Option<Installed>>> {
        self.slot.read().map_err(|_| RetrievalError::LockPoisoned)
    }

    fn write_guard(&self) -> RetrievalResult<RwLockWriteGuard<'_, Option<Installed>>> {
        self.slot.write().map_err(|_| RetrievalError::LockPoisoned)
    }

    /// Run `f` against the installed index (or `None`) under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(Option<&SimilarityIndex>) -> R) -> RetrievalResult<R> {
        let guard = self.read_guard()?;
        Ok(f(guard.as_ref().map(|installed| &installed.index)))
    }

    /// Swap in a fully built index. Returns the index it replaced.
    pub fn replace(
        &self,
        index: SimilarityIndex,
        source: Option<PathBuf>,
    ) -> RetrievalResult<Option<SimilarityIndex>> {
        let mut guard = self.write_guard()?;
        let previous = guard.replace(Installed { index, source });
        Ok(previous.map(|installed| installed.index))
    }

    /// Append entries to the installed index under the write lock. When no
    /// index is installed, an empty one of `dimension` and `metric` is created
    /// first; it is installed only if the append succeeds.
    pub fn append(
        &self,
        batch: Vec<(Vec<f32>, CaseMetadata)>,
        dimension: usize,
        metric: Metric,
    ) -> RetrievalResult<Range<EntryId>> {
        let mut guard = self.write_guard()?;
        match guard.as_mut() {
            Some(installed) => installed.index.add(batch),
            None => {
                let mut index = SimilarityIndex::new(dimension, metric);
                let ids = index.add(batch)?;
                *guard = Some(Installed {
                    index,
                    source: None,
                });
                Ok(ids)
            }
        }
    }

    /// Persist the installed index. Only observes state, so it holds the read
    /// lock and runs concurrently with searches.
    pub fn save(&self, dir: &Path) -> RetrievalResult<IndexSummary> {
        let guard = self.read_guard()?;
        let installed = guard.as_ref().ok_or(RetrievalError::NoIndexLoaded)?;
        installed.index.save(dir)?;
        Ok(summarize(installed))
    }

    pub fn summary(&self) -> RetrievalResult<Option<IndexSummary>> {
        Ok(self.read_guard()?.as_ref().map(summarize))
    }

    /// Number of entries, `0` when nothing is installed.
    pub fn size(&self) -> RetrievalResult<usize> {
        self.read(|index| index.map_or(0, SimilarityIndex::size))
    }

    pub fn is_loaded(&self) -> RetrievalResult<bool> {
        self.read(|index| index.is_some())
    }
}

fn summarize(installed: &Installed) -> IndexSummary {
    IndexSummary {
        size: installed.index.size(),
        dimension: installed.index.dimension(),
        metric: installed.index.metric(),
        strategy: installed.index.strategy_name(),
        source: installed.source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(n: usize) -> Vec<(Vec<f32>, CaseMetadata)> {
        (0..n)
            .map(|i| (vec![i as f32, 0.0], CaseMetadata::new(format!("c{i}"), "")))
            .collect()
    }

    #[test]
    fn starts_empty() {
        let shared = SharedIndex::empty();
        assert!(!shared.is_loaded().unwrap());
        assert_eq!(shared.size().unwrap(), 0);
        assert!(shared.summary().unwrap().is_none());
    }

    #[test]
    fn append_creates_index_on_demand() {
        let shared = SharedIndex::empty();
        let ids = shared.append(batch(3), 2, Metric::L2).unwrap();
        assert_eq!(ids, 0..3);
        let more = shared.append(batch(2), 2, Metric::L2).unwrap();
        assert_eq!(more, 3..5);
        assert_eq!(shared.size().unwrap(), 5);
    }

    #[test]
    fn failed_append_installs_nothing() {
        let shared = SharedIndex::empty();
        let err = shared.append(batch(2), 3, Metric::L2).unwrap_err();
        assert_eq!(err.kind(), "DIMENSION_MISMATCH");
        assert!(!shared.is_loaded().unwrap());
    }

    #[test]
    fn replace_returns_previous() {
        let shared = SharedIndex::empty();
        let first = SimilarityIndex::build(2, Metric::L2, batch(1)).unwrap();
        assert!(shared.replace(first, None).unwrap().is_none());

        let second = SimilarityIndex::build(2, Metric::L2, batch(4)).unwrap();
        let previous = shared
            .replace(second, Some(PathBuf::from("/tmp/idx")))
            .unwrap()
            .unwrap();
        assert_eq!(previous.size(), 1);

        let summary = shared.summary().unwrap().unwrap();
        assert_eq!(summary.size, 4);
        assert_eq!(summary.source, Some(PathBuf::from("/tmp/idx")));
        assert_eq!(summary.strategy, "exact");
    }

    #[test]
    fn save_without_index_is_advisory_error() {
        let shared = SharedIndex::empty();
        let err = shared.save(Path::new("/nonexistent")).unwrap_err();
        assert!(matches!(err, RetrievalError::NoIndexLoaded));
    }
}
