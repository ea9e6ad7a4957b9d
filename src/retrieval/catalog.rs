//! Case catalog: pairs a directory of images with their metadata for index
//! builds.
//!
//! Images are matched to records of an optional JSON metadata file by file
//! name. A record is keyed by the file name of its `image_path`, falling back
//! to `filename`. Images without a record get `{case_id: <file stem>,
//! labels: []}`. `image_path` is always set to the scanned location.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{RetrievalError, RetrievalResult};
use crate::index::CaseMetadata;

/// File extensions picked up by [`scan_directory`], compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "dcm", "dicom"];

/// An image to encode plus the metadata to index it under.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogCase {
    pub image: PathBuf,
    pub metadata: CaseMetadata,
}

/// Collect every image in `image_dir` (not recursive), sorted by file name.
pub fn scan_directory(
    image_dir: &Path,
    metadata_file: Option<&Path>,
) -> RetrievalResult<Vec<CatalogCase>> {
    if !image_dir.is_dir() {
        return Err(RetrievalError::Catalog(format!(
            "directory not found: {}",
            image_dir.display()
        )));
    }

    let records = match metadata_file {
        Some(path) => load_metadata_records(path)?,
        None => HashMap::new(),
    };

    let read_dir = std::fs::read_dir(image_dir).map_err(|e| {
        RetrievalError::Catalog(format!("failed to list {}: {e}", image_dir.display()))
    })?;

    let mut images: Vec<PathBuf> = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| {
            RetrievalError::Catalog(format!("failed to list {}: {e}", image_dir.display()))
        })?;
        let path = entry.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if images.is_empty() {
        return Err(RetrievalError::Catalog(format!(
            "no images found in {}",
            image_dir.display()
        )));
    }

    let matched = images
        .iter()
        .filter(|p| file_name(p).is_some_and(|n| records.contains_key(n)))
        .count();
    tracing::info!(
        dir = %image_dir.display(),
        images = images.len(),
        with_metadata = matched,
        "case catalog scanned"
    );

    images
        .into_iter()
        .map(|image| {
            let metadata = metadata_for(&image, &records)?;
            Ok(CatalogCase { image, metadata })
        })
        .collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Read the metadata file into records keyed by image file name. Later
/// records with the same key replace earlier ones.
fn load_metadata_records(path: &Path) -> RetrievalResult<HashMap<String, Map<String, Value>>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        RetrievalError::Catalog(format!("failed to read metadata file {}: {e}", path.display()))
    })?;
    let records: Vec<Map<String, Value>> = serde_json::from_str(&text).map_err(|e| {
        RetrievalError::Catalog(format!(
            "metadata file {} must be a JSON array of objects: {e}",
            path.display()
        ))
    })?;

    let mut by_name = HashMap::with_capacity(records.len());
    for record in records {
        let source = record
            .get("image_path")
            .or_else(|| record.get("filename"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if let Some(name) = file_name(Path::new(source)) {
            by_name.insert(name.to_string(), record);
        }
    }
    Ok(by_name)
}

fn metadata_for(
    image: &Path,
    records: &HashMap<String, Map<String, Value>>,
) -> RetrievalResult<CaseMetadata> {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image_path = image.to_string_lossy().into_owned();

    let Some(record) = file_name(image).and_then(|n| records.get(n)) else {
        return Ok(CaseMetadata::new(stem, image_path));
    };

    let mut record = record.clone();
    record
        .entry("case_id")
        .or_insert_with(|| Value::String(stem.clone()));
    record.insert("image_path".into(), Value::String(image_path));
    serde_json::from_value(Value::Object(record)).map_err(|e| {
        RetrievalError::Catalog(format!("invalid metadata for {}: {e}", image.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"not really an image").unwrap();
    }

    #[test]
    fn picks_up_images_sorted() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.PNG");
        touch(tmp.path(), "a.dcm");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "c.jpeg");

        let cases = scan_directory(tmp.path(), None).unwrap();
        let ids: Vec<&str> = cases.iter().map(|c| c.metadata.case_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(cases.iter().all(|c| c.metadata.labels.is_empty()));
        assert!(cases[0].metadata.image_path.ends_with("a.dcm"));
    }

    #[test]
    fn joins_metadata_by_file_name() {
        let tmp = TempDir::new().unwrap();
        let images = tmp.path().join("images");
        std::fs::create_dir(&images).unwrap();
        touch(&images, "p1.png");
        touch(&images, "p2.png");
        let meta = tmp.path().join("meta.json");
        std::fs::write(
            &meta,
            r#"[
                {"case_id": "mimic-001", "image_path": "/old/location/p1.png",
                 "labels": ["Pneumonia"], "report": "RLL consolidation."},
                {"filename": "p2.png", "labels": [{"name": "Effusion"}]}
            ]"#,
        )
        .unwrap();

        let cases = scan_directory(&images, Some(&meta)).unwrap();
        assert_eq!(cases[0].metadata.case_id, "mimic-001");
        assert_eq!(cases[0].metadata.report.as_deref(), Some("RLL consolidation."));
        assert!(cases[0].metadata.image_path.starts_with(images.to_str().unwrap()));
        // No case_id in the record: falls back to the file stem.
        assert_eq!(cases[1].metadata.case_id, "p2");
        assert_eq!(cases[1].metadata.labels[0].display_name(), "Effusion");
        assert_eq!(cases[1].metadata.extra.get("filename"), Some(&Value::from("p2.png")));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = scan_directory(Path::new("/definitely/not/here"), None).unwrap_err();
        assert_eq!(err.kind(), "CATALOG_ERROR");
    }

    #[test]
    fn directory_without_images_is_an_error() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "readme.md");
        assert!(scan_directory(tmp.path(), None).is_err());
    }

    #[test]
    fn malformed_metadata_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "x.png");
        let meta = tmp.path().join("meta.json");
        std::fs::write(&meta, r#"{"not": "an array"}"#).unwrap();
        assert!(scan_directory(tmp.path(), Some(&meta)).is_err());
    }
}
