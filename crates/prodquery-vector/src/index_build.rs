//! Encode a corpus and build its flat index.
//!
//! Typical flow:
//! 1) Hash every document and reuse cached vectors for unchanged content
//! 2) Encode the rest in batches, checking count and dimension of every batch
//! 3) Copy the vectors into a [`FlatIndex`] and pair it with the snapshot
//!
//! Nothing is returned until all three steps succeed.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use prodquery_core::config::{EmbeddingSettings, RetrievalSettings};
use prodquery_core::traits::Embedder;
use prodquery_core::types::{DistanceMetric, Document};
use prodquery_core::{Error, Result};

use crate::cache::{hash_content, EmbeddingCache};
use crate::index::FlatIndex;
use crate::snapshot::{check_unique_ids, CorpusSnapshot, IndexedCorpus};

#[derive(Debug, Clone)]
pub struct IndexBuilder {
    metric: DistanceMetric,
    batch_size: usize,
    show_progress: bool,
}

impl Default for IndexBuilder {
    fn default() -> Self { Self { metric: DistanceMetric::L2, batch_size: 32, show_progress: false } }
}

impl IndexBuilder {
    pub fn new(metric: DistanceMetric) -> Self { Self { metric, ..Self::default() } }

    pub fn from_settings(embedding: &EmbeddingSettings, retrieval: &RetrievalSettings) -> Self {
        Self { metric: retrieval.metric, batch_size: embedding.batch_size.max(1), show_progress: embedding.show_progress }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn metric(&self) -> DistanceMetric { self.metric }

    pub fn build(&self, documents: Vec<Document>, embedder: &dyn Embedder) -> Result<IndexedCorpus> {
        self.build_with_cache(documents, embedder, None)
    }

    pub fn build_with_cache(
        &self,
        documents: Vec<Document>,
        embedder: &dyn Embedder,
        cache: Option<&EmbeddingCache>,
    ) -> Result<IndexedCorpus> {
        let start = Instant::now();
        let dim = embedder.dim();
        let model_id = embedder.model_id().to_string();
        check_unique_ids(&documents)?;

        if documents.is_empty() {
            info!(model_id = %model_id, "building empty index");
            let snapshot = CorpusSnapshot::new(documents, model_id, dim);
            return IndexedCorpus::new(snapshot, FlatIndex::empty(dim, self.metric));
        }

        let hashes: Vec<blake3::Hash> = documents.iter().map(|d| hash_content(&d.content)).collect();
        let mut vectors: Vec<Option<Vec<f32>>> = match cache {
            Some(cache) => cache.get_many(&model_id, &hashes),
            None => vec![None; documents.len()],
        };
        let missing: Vec<usize> = (0..documents.len()).filter(|&i| vectors[i].is_none()).collect();
        let cache_hits = documents.len() - missing.len();
        info!(documents = documents.len(), cache_hits, model_id = %model_id, metric = %self.metric, "encoding corpus");

        let pb = self.progress_bar(missing.len());
        let mut fresh = Vec::with_capacity(missing.len());
        for batch in missing.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|&i| documents[i].content.clone()).collect();
            let embeddings = embedder.embed_batch(&texts)?;
            if embeddings.len() != texts.len() {
                return Err(Error::Encoding(format!(
                    "encoder returned {} vectors for a batch of {}",
                    embeddings.len(),
                    texts.len()
                )));
            }
            for (&i, embedding) in batch.iter().zip(embeddings) {
                if embedding.len() != dim {
                    return Err(Error::InconsistentEmbeddingDimension { expected: dim, found: embedding.len() });
                }
                fresh.push((hashes[i], embedding.clone()));
                vectors[i] = Some(embedding);
            }
            pb.inc(batch.len() as u64);
            debug!(batch = batch.len(), "encoded batch");
        }
        pb.finish_and_clear();

        let vectors: Vec<Vec<f32>> = vectors
            .into_iter()
            .map(|v| v.ok_or_else(|| Error::Encoding("document left without an embedding".into())))
            .collect::<Result<_>>()?;
        let index = FlatIndex::build(dim, self.metric, &vectors)?;
        let snapshot = CorpusSnapshot::new(documents, model_id, dim);
        let pair = IndexedCorpus::new(snapshot, index)?;

        if let Some(cache) = cache {
            cache.put_many(pair.snapshot().model_id(), fresh);
            cache.retain(pair.snapshot().model_id(), &hashes);
        }
        info!(
            documents = pair.len(),
            dim,
            fingerprint = %pair.snapshot().fingerprint(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "index built"
        );
        Ok(pair)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress || len == 0 { return ProgressBar::hidden(); }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%)")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}
