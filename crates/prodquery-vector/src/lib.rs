//! Flat (brute-force) nearest-neighbor index over an embedded corpus.
//!
//! A build turns `Vec<Document>` into an [`IndexedCorpus`]: the corpus
//! snapshot and the index matrix built from it, created together and never
//! mutated afterwards. Ordinal `i` of the index is document `i` of the snapshot.

pub mod cache;
pub mod index;
pub mod index_build;
pub mod snapshot;

pub use cache::EmbeddingCache;
pub use index::{FlatIndex, Neighbor};
pub use index_build::IndexBuilder;
pub use snapshot::{CorpusSnapshot, Hit, IndexedCorpus};
