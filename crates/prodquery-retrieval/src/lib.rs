//! The retrieval service: owns the published (snapshot, index) pair, rebuilds
//! it on demand and answers top-k queries against it.
//!
//! Readers take a clone of the published `Arc<IndexedCorpus>` and search it
//! without holding any lock. A rebuild constructs the complete new pair first
//! and only then swaps the `Arc`, so every reader sees either the old pair or
//! the new one. A failed rebuild leaves the published pair untouched.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use prodquery_core::config::Settings;
use prodquery_core::corpus::CorpusLoader;
use prodquery_core::traits::Embedder;
use prodquery_core::types::Document;
use prodquery_core::{Error, Result};
use prodquery_vector::{EmbeddingCache, IndexBuilder, IndexedCorpus};

/// A retrieved document with its 1-based rank and distance to the query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub rank: usize,
    pub distance: f32,
    pub document: Document,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServiceStatus {
    /// No build has completed yet; retrieval returns empty results.
    NotReady,
    Ready {
        documents: usize,
        dim: usize,
        model_id: String,
        fingerprint: String,
        built_at: DateTime<Utc>,
    },
}

impl ServiceStatus {
    pub fn is_ready(&self) -> bool { matches!(self, Self::Ready { .. }) }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub documents: usize,
    pub dim: usize,
    pub model_id: String,
    pub fingerprint: String,
    pub built_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Whether a previously published pair was replaced.
    pub replaced: bool,
}

pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    loader: CorpusLoader,
    builder: IndexBuilder,
    cache: Option<EmbeddingCache>,
    default_top_k: usize,
    current: RwLock<Option<Arc<IndexedCorpus>>>,
    build_lock: Mutex<()>,
}

impl RetrievalService {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            loader: CorpusLoader::new(),
            builder: IndexBuilder::default(),
            cache: None,
            default_top_k: 3,
            current: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        Self::new(embedder)
            .with_loader(CorpusLoader::from_settings(&settings.data))
            .with_builder(IndexBuilder::from_settings(&settings.embedding, &settings.retrieval))
            .with_cache(settings.retrieval.cache_embeddings)
            .with_default_top_k(settings.retrieval.default_top_k)
    }

    pub fn with_loader(mut self, loader: CorpusLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_builder(mut self, builder: IndexBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(EmbeddingCache::new);
        self
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    pub fn default_top_k(&self) -> usize { self.default_top_k }
    pub fn embedder(&self) -> &dyn Embedder { self.embedder.as_ref() }

    /// The published pair, if any build has completed.
    pub fn current(&self) -> Option<Arc<IndexedCorpus>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn status(&self) -> ServiceStatus {
        match self.current() {
            None => ServiceStatus::NotReady,
            Some(pair) => ServiceStatus::Ready {
                documents: pair.len(),
                dim: pair.snapshot().dim(),
                model_id: pair.snapshot().model_id().to_string(),
                fingerprint: pair.snapshot().fingerprint().to_string(),
                built_at: pair.snapshot().built_at(),
            },
        }
    }

    /// Load `corpus_dir`, encode it, index it and publish the result.
    pub fn rebuild(&self, corpus_dir: &Path) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        info!(corpus = %corpus_dir.display(), "rebuilding index");
        let result = self
            .loader
            .load(corpus_dir)
            .and_then(|documents| self.build_pair(documents));
        self.finish_build(result, start)
    }

    /// Same as [`rebuild`](Self::rebuild) for documents that are already in memory.
    pub fn rebuild_from_documents(&self, documents: Vec<Document>) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        let result = self.build_pair(documents);
        self.finish_build(result, start)
    }

    /// Publish a pair built elsewhere. It must come from this service's model.
    pub fn install(&self, pair: IndexedCorpus) -> Result<BuildReport> {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let start = Instant::now();
        let result = self.check_compatible(&pair).map(|()| pair);
        self.finish_build(result, start)
    }

    /// Up to `top_k` documents ordered by ascending distance to `query`.
    ///
    /// `top_k <= 0` fails with `InvalidTopK`; a `top_k` above the corpus
    /// size is clamped. Before the first successful build, or with an empty
    /// corpus, the result is empty.
    pub fn retrieve(&self, query: &str, top_k: i64) -> Result<Vec<Document>> {
        Ok(self.retrieve_scored(query, top_k)?.into_iter().map(|r| r.document).collect())
    }

    pub fn retrieve_scored(&self, query: &str, top_k: i64) -> Result<Vec<RetrievedDocument>> {
        if top_k <= 0 {
            return Err(Error::InvalidTopK(top_k));
        }
        let Some(pair) = self.current() else {
            debug!("index not ready, returning no documents");
            return Ok(vec![]);
        };
        if pair.is_empty() {
            debug!("index is empty, returning no documents");
            return Ok(vec![]);
        }
        let k = usize::try_from(top_k).unwrap_or(usize::MAX).min(pair.len());

        let query_vec = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Encoding("encoder returned no vector for the query".into()))?;
        let hits = pair.search(&query_vec, k)?;
        debug!(top_k, k, hits = hits.len(), fingerprint = %pair.snapshot().fingerprint(), "retrieved");
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| RetrievedDocument { rank: i + 1, distance: hit.distance, document: hit.document.clone() })
            .collect())
    }

    fn build_pair(&self, documents: Vec<Document>) -> Result<IndexedCorpus> {
        self.builder.build_with_cache(documents, self.embedder.as_ref(), self.cache.as_ref())
    }

    fn check_compatible(&self, pair: &IndexedCorpus) -> Result<()> {
        let snapshot = pair.snapshot();
        if snapshot.dim() != self.embedder.dim() {
            return Err(Error::InconsistentEmbeddingDimension { expected: self.embedder.dim(), found: snapshot.dim() });
        }
        if snapshot.model_id() != self.embedder.model_id() {
            return Err(Error::ModelUnavailable(format!(
                "index was built with '{}' but queries are encoded with '{}'",
                snapshot.model_id(),
                self.embedder.model_id()
            )));
        }
        Ok(())
    }

    fn finish_build(&self, result: Result<IndexedCorpus>, start: Instant) -> Result<BuildReport> {
        let pair = match result {
            Ok(pair) => Arc::new(pair),
            Err(e) => {
                if self.current().is_some() {
                    warn!(error = %e, "build failed, keeping the previously published index");
                } else {
                    warn!(error = %e, "build failed, service stays not ready");
                }
                return Err(e);
            }
        };
        let snapshot = pair.snapshot();
        let report = BuildReport {
            documents: pair.len(),
            dim: snapshot.dim(),
            model_id: snapshot.model_id().to_string(),
            fingerprint: snapshot.fingerprint().to_string(),
            built_at: snapshot.built_at(),
            elapsed: start.elapsed(),
            replaced: false,
        };
        let previous = self.publish(Arc::clone(&pair));
        info!(documents = report.documents, fingerprint = %report.fingerprint, "index published");
        Ok(BuildReport { replaced: previous.is_some(), ..report })
    }

    fn publish(&self, pair: Arc<IndexedCorpus>) -> Option<Arc<IndexedCorpus>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.replace(pair)
    }
}
