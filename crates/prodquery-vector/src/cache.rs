//! In-memory embedding cache keyed by `(model_id, blake3(content))`.
//!
//! Encoding is pure for a given model identity, so a cached vector is the
//! vector a fresh encode would produce. Rebuilds use it to skip documents
//! whose content has not changed.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<(String, blake3::Hash), Vec<f32>>>,
}

pub fn hash_content(content: &str) -> blake3::Hash { blake3::hash(content.as_bytes()) }

impl EmbeddingCache {
    pub fn new() -> Self { Self::default() }

    pub fn get_many(&self, model_id: &str, hashes: &[blake3::Hash]) -> Vec<Option<Vec<f32>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        hashes.iter().map(|h| entries.get(&(model_id.to_string(), *h)).cloned()).collect()
    }

    pub fn put_many(&self, model_id: &str, items: impl IntoIterator<Item = (blake3::Hash, Vec<f32>)>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (hash, vector) in items {
            entries.insert((model_id.to_string(), hash), vector);
        }
    }

    /// Keep only the entries of `model_id` whose hash is in `live`.
    pub fn retain(&self, model_id: &str, live: &[blake3::Hash]) {
        let live: HashSet<&blake3::Hash> = live.iter().collect();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(m, h), _| m == model_id && live.contains(h));
    }

    pub fn len(&self) -> usize { self.entries.lock().unwrap_or_else(PoisonError::into_inner).len() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
    pub fn clear(&self) { self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_scoped_by_model() {
        let cache = EmbeddingCache::new();
        let h = hash_content("Router X supports WiFi 6");
        cache.put_many("m1", [(h, vec![1.0, 2.0])]);
        assert_eq!(cache.get_many("m1", &[h]), vec![Some(vec![1.0, 2.0])]);
        assert_eq!(cache.get_many("m2", &[h]), vec![None]);
    }

    #[test]
    fn retain_drops_stale_entries() {
        let cache = EmbeddingCache::new();
        let keep = hash_content("keep");
        let drop = hash_content("drop");
        cache.put_many("m", [(keep, vec![1.0]), (drop, vec![2.0])]);
        cache.put_many("other", [(keep, vec![3.0])]);
        cache.retain("m", &[keep]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_many("m", &[keep, drop]), vec![Some(vec![1.0]), None]);
    }

    #[test]
    fn retain_scales_with_large_live_sets() {
        let cache = EmbeddingCache::new();
        let hashes: Vec<blake3::Hash> = (0..20_000).map(|i| hash_content(&format!("product {i}"))).collect();
        cache.put_many("m", hashes.iter().map(|h| (*h, vec![0.0])));
        let start = std::time::Instant::now();
        cache.retain("m", &hashes[..10_000]);
        assert_eq!(cache.len(), 10_000);
        assert!(start.elapsed() < std::time::Duration::from_secs(2), "retain took {:?}", start.elapsed());
    }
}
