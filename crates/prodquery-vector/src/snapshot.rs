use std::collections::HashMap;

use chrono::{DateTime, Utc};

use prodquery_core::types::Document;
use prodquery_core::{Error, Result};

use crate::index::{FlatIndex, Neighbor};

/// Ordered, immutable documents plus the identity of the model that embedded them.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    documents: Vec<Document>,
    model_id: String,
    dim: usize,
    fingerprint: String,
    built_at: DateTime<Utc>,
}

impl CorpusSnapshot {
    pub fn new(documents: Vec<Document>, model_id: impl Into<String>, dim: usize) -> Self {
        let model_id = model_id.into();
        let fingerprint = fingerprint(&model_id, &documents);
        Self { documents, model_id, dim, fingerprint, built_at: Utc::now() }
    }

    pub fn documents(&self) -> &[Document] { &self.documents }
    pub fn document(&self, ordinal: usize) -> Option<&Document> { self.documents.get(ordinal) }
    pub fn len(&self) -> usize { self.documents.len() }
    pub fn is_empty(&self) -> bool { self.documents.is_empty() }
    pub fn model_id(&self) -> &str { &self.model_id }
    pub fn dim(&self) -> usize { self.dim }
    /// blake3 over the model id and every `(id, content)` in order.
    pub fn fingerprint(&self) -> &str { &self.fingerprint }
    pub fn built_at(&self) -> DateTime<Utc> { self.built_at }
}

fn fingerprint(model_id: &str, documents: &[Document]) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut field = |bytes: &[u8]| {
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };
    field(model_id.as_bytes());
    for doc in documents {
        field(doc.id.as_bytes());
        field(doc.content.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

pub(crate) fn check_unique_ids(documents: &[Document]) -> Result<()> {
    let mut seen: HashMap<&str, &Document> = HashMap::with_capacity(documents.len());
    for doc in documents {
        if let Some(first) = seen.insert(doc.id.as_str(), doc) {
            return Err(Error::DuplicateDocumentId {
                id: doc.id.clone(),
                first: first.path.clone().into(),
                second: doc.path.clone().into(),
            });
        }
    }
    Ok(())
}

/// A search result resolved against the snapshot that produced the index.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    pub ordinal: usize,
    pub distance: f32,
    pub document: &'a Document,
}

/// A corpus snapshot together with the index built from it.
///
/// The pair is only constructed whole, so a reader holding one can never see
/// documents from one build and index rows from another.
#[derive(Debug, Clone)]
pub struct IndexedCorpus {
    snapshot: CorpusSnapshot,
    index: FlatIndex,
}

impl IndexedCorpus {
    /// Fails on a dimension or size mismatch, or when two documents share an id.
    pub fn new(snapshot: CorpusSnapshot, index: FlatIndex) -> Result<Self> {
        check_unique_ids(snapshot.documents())?;
        if snapshot.dim() != index.dim() {
            return Err(Error::InconsistentEmbeddingDimension { expected: snapshot.dim(), found: index.dim() });
        }
        if snapshot.len() != index.len() {
            return Err(Error::Encoding(format!(
                "index has {} vectors for {} documents",
                index.len(),
                snapshot.len()
            )));
        }
        Ok(Self { snapshot, index })
    }

    pub fn snapshot(&self) -> &CorpusSnapshot { &self.snapshot }
    pub fn index(&self) -> &FlatIndex { &self.index }
    pub fn len(&self) -> usize { self.snapshot.len() }
    pub fn is_empty(&self) -> bool { self.snapshot.is_empty() }

    /// The embedding of the document at `ordinal`.
    pub fn embedding(&self, ordinal: usize) -> Option<&[f32]> { self.index.vector(ordinal) }

    /// Search the index and map every ordinal back to its document. Ordinals
    /// without a document are dropped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit<'_>>> {
        let neighbors = self.index.search(query, k)?;
        Ok(neighbors
            .into_iter()
            .filter_map(|Neighbor { ordinal, distance }| {
                self.snapshot.document(ordinal).map(|document| Hit { ordinal, distance, document })
            })
            .collect())
    }
}
