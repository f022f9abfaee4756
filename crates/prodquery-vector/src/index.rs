use std::cmp::Ordering;

use prodquery_core::types::DistanceMetric;
use prodquery_core::{Error, Result};

/// One search result: the row ordinal and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

/// Exact nearest-neighbor index: a row-major `len x dim` matrix scanned in
/// full on every query.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    metric: DistanceMetric,
    data: Vec<f32>,
    norms: Vec<f32>,
}

impl FlatIndex {
    pub fn empty(dim: usize, metric: DistanceMetric) -> Self {
        Self { dim, metric, data: Vec::new(), norms: Vec::new() }
    }

    /// Copy `vectors` into a new index. Every vector must have length `dim`.
    pub fn build(dim: usize, metric: DistanceMetric, vectors: &[Vec<f32>]) -> Result<Self> {
        let mut data = Vec::with_capacity(vectors.len() * dim);
        let mut norms = Vec::with_capacity(vectors.len());
        for v in vectors {
            if v.len() != dim {
                return Err(Error::InconsistentEmbeddingDimension { expected: dim, found: v.len() });
            }
            data.extend_from_slice(v);
            norms.push(l2_norm(v));
        }
        Ok(Self { dim, metric, data, norms })
    }

    pub fn len(&self) -> usize { self.norms.len() }
    pub fn is_empty(&self) -> bool { self.norms.is_empty() }
    pub fn dim(&self) -> usize { self.dim }
    pub fn metric(&self) -> DistanceMetric { self.metric }

    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        if ordinal >= self.len() { return None; }
        let start = ordinal * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// The `min(k, len)` rows closest to `query`, ascending by distance;
    /// equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::InconsistentEmbeddingDimension { expected: self.dim, found: query.len() });
        }
        let k = k.min(self.len());
        if k == 0 { return Ok(vec![]); }

        let query_norm = l2_norm(query);
        let mut scored: Vec<Neighbor> = (0..self.len())
            .map(|ordinal| Neighbor { ordinal, distance: self.distance(query, query_norm, ordinal) })
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_ordinal);
            scored.truncate(k);
        }
        scored.sort_by(by_distance_then_ordinal);
        Ok(scored)
    }

    fn distance(&self, query: &[f32], query_norm: f32, ordinal: usize) -> f32 {
        let start = ordinal * self.dim;
        let row = &self.data[start..start + self.dim];
        match self.metric {
            DistanceMetric::L2 => row.iter().zip(query).map(|(a, b)| (a - b) * (a - b)).sum(),
            DistanceMetric::Cosine => {
                let denom = self.norms[ordinal] * query_norm;
                if denom == 0.0 { return 1.0; }
                let dot: f32 = row.iter().zip(query).map(|(a, b)| a * b).sum();
                1.0 - dot / denom
            }
        }
    }
}

fn by_distance_then_ordinal(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance.total_cmp(&b.distance).then(a.ordinal.cmp(&b.ordinal))
}

fn l2_norm(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }
