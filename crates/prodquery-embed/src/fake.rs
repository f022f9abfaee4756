use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use prodquery_core::traits::Embedder;
use prodquery_core::{Error, Result};

/// Deterministic bag-of-words embedder for tests and development.
///
/// Each lower-cased alphanumeric token is hashed with xxh64 into one of `dim`
/// buckets; the bucket counts are L2-normalized. Texts sharing more tokens
/// end up closer, so retrieval behaves sensibly without a model.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Option<Vec<f32>> {
        let mut v = vec![0f32; self.dim];
        let mut seen = false;
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let idx = (hasher.finish() % self.dim as u64) as usize;
            v[idx] += 1.0;
            seen = true;
        }
        if !seen { return None; }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v { *x /= norm; }
        Some(v)
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                self.embed_one(text)
                    .ok_or_else(|| Error::Encoding(format!("input {i} contains no embeddable tokens")))
            })
            .collect()
    }
}
