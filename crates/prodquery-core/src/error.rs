use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Corpus not found at {}: {reason}", path.display())]
    CorpusNotFound { path: PathBuf, reason: String },

    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Encoding failed: {0}")]
    Encoding(String),

    #[error("Inconsistent embedding dimension: expected {expected}, found {found}")]
    InconsistentEmbeddingDimension { expected: usize, found: usize },

    #[error("Invalid top_k {0}: must be a positive integer")]
    InvalidTopK(i64),

    #[error("Duplicate document id '{id}' ({} and {})", first.display(), second.display())]
    DuplicateDocumentId { id: String, first: PathBuf, second: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
