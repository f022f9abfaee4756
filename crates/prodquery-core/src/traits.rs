use crate::error::Result;

/// Maps text to fixed-length vectors for one model identity.
///
/// Implementations must return exactly one vector per input, all of length
/// `dim()`, and must be deterministic for a given `model_id()`. Embedding a
/// batch means the same as embedding each text on its own; when any input
/// cannot be embedded the whole call fails.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `bert:all-MiniLM-L6-v2:d384`).
    fn model_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Maximum token length for one input.
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_id(&self) -> &str { (**self).model_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn model_id(&self) -> &str { (**self).model_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}
