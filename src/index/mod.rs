//! Persisted vector index: storage, search, and the shared live slot.

pub mod metric;
pub mod persist;
pub mod search;
pub mod shared;
pub mod store;
pub mod types;

pub use metric::Metric;
pub use search::{ExactSearch, NeighborSearch, SimilarityIndex};
pub use shared::{IndexSummary, SharedIndex};
pub use store::EmbeddingStore;
pub use types::{CaseMetadata, EntryId, IndexEntry, Label, Neighbor};
