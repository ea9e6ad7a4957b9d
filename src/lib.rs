//! Visual case retrieval for medical image analysis, served over MCP.
//!
//! MedVision pairs an image classifier with a retrieval-augmented view of a
//! reference collection: each query image is encoded into an embedding,
//! matched against an index of previously diagnosed cases, and the labels of
//! the nearest cases are aggregated into similarity-weighted evidence.
//!
//! | Mode | Classifier | Retrieval | Aggregation |
//! |------|------------|-----------|-------------|
//! | `quick` | yes | no | no |
//! | `full` | yes | yes | yes |
//! | `rag_only` | no | yes | yes |
//!
//! # Architecture
//!
//! - **Index**: exact brute-force k-NN over `f32` embeddings (squared L2 or
//!   cosine distance), persisted as a directory of manifest, vectors, and
//!   metadata files
//! - **Models**: encoder and classifier behind async traits, served by an
//!   external model service over HTTP
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP/SSE
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`error`]: Error kinds shared by the index and the engine
//! - [`index`]: Embedding store, distance metrics, search, persistence, and the shared slot
//! - [`inference`]: Encoder and classifier traits plus the HTTP model client
//! - [`retrieval`]: Analysis modes, label aggregation, summaries, and the case catalog

pub mod config;
pub mod error;
pub mod index;
pub mod inference;
pub mod retrieval;
