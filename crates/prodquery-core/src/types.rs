//! Domain types shared by the loader, the index and the retrieval service.

use serde::{Deserialize, Serialize};

pub type DocumentId = String;

/// One unit of retrievable knowledge.
///
/// - `id`: unique within a corpus snapshot (the source file stem)
/// - `path`: the file the document was read from, kept for diagnostics
/// - `content`: the full decoded text, never empty
///
/// The embedding is not stored here: once a corpus is indexed, the vector
/// of the document at ordinal `i` is row `i` of the index matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub path: String,
    pub content: String,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), path: String::new(), content: content.into() }
    }
}

/// What the corpus loader does when two source files map to the same id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the file loaded last and log a warning.
    #[default]
    LastWins,
    /// Fail the load with `Error::DuplicateDocumentId`.
    Reject,
}

/// Distance used by the flat index. Lower is always closer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// `1 - cosine_similarity`.
    Cosine,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::L2 => f.write_str("l2"),
            Self::Cosine => f.write_str("cosine"),
        }
    }
}
