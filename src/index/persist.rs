//! On-disk index layout.
//!
//! An index is a directory holding three files:
//!
//! | File | Contents |
//! |------|----------|
//! | `manifest.json` | `format_version`, `dimension`, `metric`, `count`, `created_at` |
//! | `vectors.bin` | `count × dimension` little-endian `f32`, row-major in id order |
//! | `metadata.json` | JSON array of `count` case metadata records, in id order |
//!
//! Each file is written to a temp path and renamed into place; the manifest is
//! written last so a directory without one is never mistaken for an index.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::metric::Metric;
use crate::index::store::EmbeddingStore;
use crate::index::types::{CaseMetadata, EntryId, IndexEntry};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const METADATA_FILE: &str = "metadata.json";

/// Highest layout version this build reads and the one it writes.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    format_version: u32,
    dimension: usize,
    metric: Metric,
    count: usize,
    created_at: &'a str,
}

/// Manifest as read back. Every field is optional so a missing tag is
/// reported as corruption rather than a parse failure.
#[derive(Debug, Deserialize)]
struct RawManifest {
    format_version: Option<u32>,
    dimension: Option<usize>,
    metric: Option<String>,
    count: Option<usize>,
}

pub(crate) fn write_store(store: &EmbeddingStore, dir: &Path) -> RetrievalResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| RetrievalError::write_failed(dir, e))?;

    let mut vectors = Vec::with_capacity(store.size() * store.dimension() * 4);
    for entry in store.entries() {
        for value in &entry.embedding {
            vectors.extend_from_slice(&value.to_le_bytes());
        }
    }
    write_atomic(&dir.join(VECTORS_FILE), &vectors)?;

    let metadata: Vec<&CaseMetadata> = store.entries().iter().map(|e| &e.metadata).collect();
    let metadata_json =
        serde_json::to_vec_pretty(&metadata).map_err(|e| RetrievalError::write_failed(dir, e))?;
    write_atomic(&dir.join(METADATA_FILE), &metadata_json)?;

    let created_at = chrono::Utc::now().to_rfc3339();
    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        dimension: store.dimension(),
        metric: store.metric(),
        count: store.size(),
        created_at: &created_at,
    };
    let manifest_json =
        serde_json::to_vec_pretty(&manifest).map_err(|e| RetrievalError::write_failed(dir, e))?;
    write_atomic(&dir.join(MANIFEST_FILE), &manifest_json)?;

    tracing::info!(
        path = %dir.display(),
        entries = store.size(),
        dimension = store.dimension(),
        metric = %store.metric(),
        "index saved"
    );
    Ok(())
}

pub(crate) fn read_store(dir: &Path) -> RetrievalResult<EmbeddingStore> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let manifest_text = std::fs::read_to_string(&manifest_path)
        .map_err(|e| RetrievalError::unreadable(&manifest_path, e))?;
    let raw: RawManifest = serde_json::from_str(&manifest_text)
        .map_err(|e| RetrievalError::unreadable(&manifest_path, e))?;

    let version = raw.format_version.unwrap_or(FORMAT_VERSION);
    if version > FORMAT_VERSION {
        return Err(RetrievalError::corrupt(
            dir,
            format!("format version {version} is newer than supported version {FORMAT_VERSION}"),
        ));
    }
    let dimension = match raw.dimension {
        Some(0) => return Err(RetrievalError::corrupt(dir, "dimension tag is zero")),
        Some(d) => d,
        None => return Err(RetrievalError::corrupt(dir, "manifest has no dimension tag")),
    };
    let metric: Metric = raw
        .metric
        .as_deref()
        .ok_or_else(|| RetrievalError::corrupt(dir, "manifest has no metric tag"))?
        .parse()
        .map_err(|e: String| RetrievalError::corrupt(dir, e))?;
    let count = raw
        .count
        .ok_or_else(|| RetrievalError::corrupt(dir, "manifest has no entry count"))?;

    let vectors_path = dir.join(VECTORS_FILE);
    let bytes =
        std::fs::read(&vectors_path).map_err(|e| RetrievalError::unreadable(&vectors_path, e))?;
    let expected_len = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| RetrievalError::corrupt(dir, "count × dimension overflows"))?;
    if bytes.len() != expected_len {
        return Err(RetrievalError::corrupt(
            dir,
            format!(
                "{VECTORS_FILE} holds {} bytes, expected {expected_len} for {count} entries of dimension {dimension}",
                bytes.len()
            ),
        ));
    }

    let metadata_path = dir.join(METADATA_FILE);
    let metadata_text = std::fs::read_to_string(&metadata_path)
        .map_err(|e| RetrievalError::unreadable(&metadata_path, e))?;
    let metadata: Vec<CaseMetadata> = serde_json::from_str(&metadata_text)
        .map_err(|e| RetrievalError::unreadable(&metadata_path, e))?;
    if metadata.len() != count {
        return Err(RetrievalError::corrupt(
            dir,
            format!(
                "{METADATA_FILE} holds {} records, manifest declares {count}",
                metadata.len()
            ),
        ));
    }

    let entries: Vec<IndexEntry> = bytes
        .chunks_exact(dimension * 4)
        .zip(metadata)
        .enumerate()
        .map(|(i, (row, metadata))| IndexEntry {
            id: i as EntryId,
            embedding: row
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            metadata,
        })
        .collect();

    tracing::info!(
        path = %dir.display(),
        entries = entries.len(),
        dimension,
        metric = %metric,
        "index loaded"
    );
    Ok(EmbeddingStore::from_entries(dimension, metric, entries))
}

/// Write `bytes` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> RetrievalResult<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes).map_err(|e| RetrievalError::write_failed(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| RetrievalError::write_failed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn manifest_records_tags() {
        let tmp = TempDir::new().unwrap();
        let mut store = EmbeddingStore::new(3, Metric::Cosine);
        store
            .add(vec![(vec![1.0, 0.0, 0.0], CaseMetadata::new("c1", "c1.png"))])
            .unwrap();
        write_store(&store, tmp.path()).unwrap();

        let manifest: serde_json::Value =
            serde_json::from_slice(&std::fs::read(tmp.path().join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest["dimension"], 3);
        assert_eq!(manifest["metric"], "cosine");
        assert_eq!(manifest["count"], 1);
        assert_eq!(manifest["format_version"], FORMAT_VERSION);
        assert!(manifest["created_at"].is_string());

        let vectors = std::fs::read(tmp.path().join(VECTORS_FILE)).unwrap();
        assert_eq!(vectors.len(), 12);
        assert!(!tmp.path().join("vectors.tmp").exists());
    }

    #[test]
    fn empty_store_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = EmbeddingStore::new(8, Metric::L2);
        write_store(&store, tmp.path()).unwrap();
        let loaded = read_store(tmp.path()).unwrap();
        assert_eq!(loaded, store);
    }

    #[test]
    fn newer_format_version_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        write_store(&EmbeddingStore::new(2, Metric::L2), tmp.path()).unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{"format_version": 99, "dimension": 2, "metric": "l2", "count": 0}"#,
        )
        .unwrap();
        let err = read_store(tmp.path()).unwrap_err();
        assert_eq!(err.kind(), "CORRUPT_INDEX");
    }
}
