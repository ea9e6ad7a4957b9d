//! Nearest-neighbor search over an [`EmbeddingStore`].
//!
//! [`SimilarityIndex`] pairs a store with a [`NeighborSearch`] strategy. The
//! only strategy shipped is [`ExactSearch`] (brute force); an approximate
//! graph or tree index can replace it behind the same trait without touching
//! the store, the aggregator, or the engine.

use std::cmp::Ordering;
use std::ops::Range;
use std::path::Path;

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::metric::{self, Metric};
use crate::index::store::EmbeddingStore;
use crate::index::types::{CaseMetadata, EntryId, IndexEntry, Neighbor};

/// A search strategy over the vectors of an [`EmbeddingStore`].
///
/// Implementations must return at most `top_k` hits ordered by ascending
/// distance, breaking distance ties by ascending id. Callers rely only on that
/// ordering, never on exact distance values.
pub trait NeighborSearch: Send + Sync + std::fmt::Debug {
    /// Short name reported in status output.
    fn name(&self) -> &'static str;

    /// Called after entries in `ids` were appended to `store`. Strategies that
    /// keep their own structure update it here.
    fn on_append(&mut self, _store: &EmbeddingStore, _ids: Range<EntryId>) {}

    /// Nearest `top_k` entries to `query`. `query` has already been checked
    /// against the store dimension and `top_k` is at least 1.
    fn search(&self, store: &EmbeddingStore, query: &[f32], top_k: usize) -> Vec<Neighbor>;
}

/// Brute-force search: distance to every stored vector, then partial
/// selection of the `top_k` smallest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactSearch;

impl NeighborSearch for ExactSearch {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn search(&self, store: &EmbeddingStore, query: &[f32], top_k: usize) -> Vec<Neighbor> {
        let metric = store.metric();
        let mut scored: Vec<Neighbor> = store
            .entries()
            .iter()
            .map(|entry| Neighbor {
                id: entry.id,
                distance: metric.distance(query, &entry.embedding),
            })
            .collect();

        let k = top_k.min(scored.len());
        if k == 0 {
            return Vec::new();
        }
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_unstable_by(rank_order);
        scored
    }
}

/// Ascending distance, then ascending id. `total_cmp` keeps the order total
/// even if a distance is NaN.
fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

/// A searchable index: the embedding store plus its search strategy.
#[derive(Debug)]
pub struct SimilarityIndex {
    store: EmbeddingStore,
    strategy: Box<dyn NeighborSearch>,
}

impl SimilarityIndex {
    /// Empty index with exact search.
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self::from_store(EmbeddingStore::new(dimension, metric))
    }

    /// Wrap an existing store with exact search.
    pub fn from_store(store: EmbeddingStore) -> Self {
        Self::with_strategy(store, Box::new(ExactSearch))
    }

    /// Wrap a store with a custom search strategy. The strategy is told about
    /// every entry already present.
    pub fn with_strategy(store: EmbeddingStore, mut strategy: Box<dyn NeighborSearch>) -> Self {
        if !store.is_empty() {
            let ids = 0..store.size() as EntryId;
            strategy.on_append(&store, ids);
        }
        Self { store, strategy }
    }

    /// Build a fresh index from a batch in one step.
    pub fn build(
        dimension: usize,
        metric: Metric,
        batch: impl IntoIterator<Item = (Vec<f32>, CaseMetadata)>,
    ) -> RetrievalResult<Self> {
        let mut index = Self::new(dimension, metric);
        index.add(batch)?;
        Ok(index)
    }

    pub fn add(
        &mut self,
        batch: impl IntoIterator<Item = (Vec<f32>, CaseMetadata)>,
    ) -> RetrievalResult<Range<EntryId>> {
        let ids = self.store.add(batch)?;
        self.strategy.on_append(&self.store, ids.clone());
        Ok(ids)
    }

    /// Nearest `top_k` entries to `query`, nearest first.
    ///
    /// Returns `min(top_k, size)` hits; an empty index yields an empty list.
    pub fn search(&self, query: &[f32], top_k: usize) -> RetrievalResult<Vec<Neighbor>> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidTopK);
        }
        if query.len() != self.store.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.store.dimension(),
                actual: query.len(),
            });
        }
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.strategy.search(&self.store, query, top_k))
    }

    /// Similarity score for a distance returned by [`search`](Self::search).
    pub fn similarity(&self, distance: f32) -> f64 {
        metric::similarity(distance)
    }

    pub fn get(&self, id: EntryId) -> RetrievalResult<&IndexEntry> {
        self.store.get(id)
    }

    pub fn size(&self) -> usize {
        self.store.size()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn metric(&self) -> Metric {
        self.store.metric()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> RetrievalResult<()> {
        self.store.save(dir)
    }

    pub fn load(dir: impl AsRef<Path>) -> RetrievalResult<Self> {
        EmbeddingStore::load(dir).map(Self::from_store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(id: &str) -> CaseMetadata {
        CaseMetadata::new(id, format!("{id}.png"))
    }

    fn index_of(vectors: &[[f32; 2]]) -> SimilarityIndex {
        SimilarityIndex::build(
            2,
            Metric::L2,
            vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (v.to_vec(), case(&format!("c{i}")))),
        )
        .unwrap()
    }

    #[test]
    fn nearest_first() {
        let index = index_of(&[[5.0, 5.0], [0.0, 0.0], [1.0, 1.0], [3.0, 3.0]]);
        let hits = index.search(&[0.1, 0.1], 3).unwrap();
        let ids: Vec<EntryId> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn top_k_larger_than_size_returns_everything() {
        let index = index_of(&[[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 2);
    }

    #[test]
    fn ties_break_by_insertion_id() {
        let index = index_of(&[[9.0, 9.0], [1.0, 1.0], [2.0, 2.0], [1.0, 1.0], [1.0, 1.0]]);
        let hits = index.search(&[1.0, 1.0], 3).unwrap();
        let ids: Vec<EntryId> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);

        // Selection boundary falls inside the tied group.
        let two = index.search(&[1.0, 1.0], 2).unwrap();
        assert_eq!(two.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let index = index_of(&[[1.0, 0.0]]);
        assert!(matches!(
            index.search(&[1.0, 0.0], 0),
            Err(RetrievalError::InvalidTopK)
        ));
    }

    #[test]
    fn empty_index_searches_to_nothing() {
        let index = SimilarityIndex::new(2, Metric::L2);
        assert!(index.search(&[0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn similarity_tracks_distance() {
        let index = index_of(&[[0.0, 0.0], [1.0, 0.0]]);
        let hits = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(index.similarity(hits[0].distance), 1.0);
        assert_eq!(index.similarity(hits[1].distance), 0.5);
    }

    #[derive(Debug, Default)]
    struct CountingSearch {
        seen: usize,
    }

    impl NeighborSearch for CountingSearch {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn on_append(&mut self, _store: &EmbeddingStore, ids: Range<EntryId>) {
            self.seen += (ids.end - ids.start) as usize;
        }

        fn search(&self, store: &EmbeddingStore, query: &[f32], top_k: usize) -> Vec<Neighbor> {
            assert_eq!(self.seen, store.size());
            ExactSearch.search(store, query, top_k)
        }
    }

    #[test]
    fn custom_strategy_sees_every_append() {
        let mut store = EmbeddingStore::new(2, Metric::L2);
        store.add(vec![(vec![0.0, 0.0], case("a"))]).unwrap();
        let mut index = SimilarityIndex::with_strategy(store, Box::new(CountingSearch::default()));
        index.add(vec![(vec![1.0, 1.0], case("b"))]).unwrap();
        assert_eq!(index.strategy_name(), "counting");
        assert_eq!(index.search(&[1.0, 1.0], 1).unwrap()[0].id, 1);
    }
}
