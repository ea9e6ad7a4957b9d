//! Core index record types.
//!
//! Defines [`IndexEntry`] (a stored case), [`CaseMetadata`] (its opaque
//! payload), [`Label`] (a diagnostic label in either of its two shapes), and
//! [`Neighbor`] (one ranked search hit).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stable identifier of an index entry: its 0-based insertion position.
pub type EntryId = u64;

/// A diagnostic label as it appears in case metadata.
///
/// Metadata files carry labels either as bare strings (`"Pneumonia"`) or as
/// objects (`{"name": "Pneumonia", "severity": "mild"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Plain(String),
    Structured(Map<String, Value>),
}

impl Label {
    /// Name used for aggregation and display.
    ///
    /// Structured labels resolve through `name`, then `label`, then the JSON
    /// form of the whole object; the first present field wins.
    pub fn display_name(&self) -> String {
        match self {
            Self::Plain(name) => name.clone(),
            Self::Structured(fields) => match fields.get("name").or_else(|| fields.get("label")) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(fields.clone()).to_string(),
            },
        }
    }
}

impl From<&str> for Label {
    fn from(name: &str) -> Self {
        Self::Plain(name.to_string())
    }
}

/// Metadata attached to an indexed case. Opaque to the index; only the label
/// aggregator reads `labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMetadata {
    /// Externally supplied case identifier. Not guaranteed unique.
    pub case_id: String,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    /// Where the indexed image came from.
    #[serde(default)]
    pub image_path: String,
    /// Any other fields from the metadata source, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CaseMetadata {
    pub fn new(case_id: impl Into<String>, image_path: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            labels: Vec::new(),
            report: None,
            image_path: image_path.into(),
            extra: Map::new(),
        }
    }

    pub fn with_labels<I, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_report(mut self, report: impl Into<String>) -> Self {
        self.report = Some(report.into());
        self
    }
}

/// A stored case: id, embedding, and metadata. Immutable once added.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: EntryId,
    pub embedding: Vec<f32>,
    pub metadata: CaseMetadata,
}

/// One search hit, ranked by ascending distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: EntryId,
    pub distance: f32,
}
