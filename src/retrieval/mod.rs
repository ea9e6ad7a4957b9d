//! Analysis on top of the similarity index: classification, similar-case
//! retrieval, label aggregation, and the case catalog used to build indexes.

pub mod aggregate;
pub mod catalog;
pub mod engine;
pub mod summary;
pub mod types;

pub use aggregate::{aggregate_labels, AggregatedLabel};
pub use catalog::{scan_directory, CatalogCase, IMAGE_EXTENSIONS};
pub use engine::RetrievalEngine;
pub use summary::{build_summary, NO_ANALYSIS};
pub use types::{
    Advisory, AnalysisMode, AnalysisResult, AnalyzeRequest, EngineStatus, SimilarCase,
    SimilarCasesResult,
};
