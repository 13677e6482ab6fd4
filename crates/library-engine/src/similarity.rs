//! Similarity Core (C3)
//!
//! Cosine similarity with a lazily-computed, invalidate-on-delete magnitude
//! cache, mirroring the teacher's embedding-utility module
//! (`embeddings::local::cosine_similarity`) but exposing `None` rather than
//! panicking on the degenerate cases the spec calls out (dimension
//! mismatch, zero magnitude, non-finite result).

use std::collections::HashMap;

/// Euclidean magnitude (L2 norm) of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors.
///
/// Returns `None` if the lengths differ, either magnitude is zero, or the
/// result is non-finite. Otherwise the result is clamped to `[-1, 1]`.
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let score = dot / (mag_a * mag_b);
    if !score.is_finite() {
        return None;
    }
    Some(score.clamp(-1.0, 1.0))
}

/// Lazily-populated cache of embedding magnitudes, keyed by volume id.
///
/// Entries are invalidated (removed) on delete; a cache miss is recomputed
/// and stored on the next lookup.
#[derive(Debug, Default)]
pub struct MagnitudeCache {
    cache: HashMap<String, f32>,
}

impl MagnitudeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached magnitude, computing and storing it on miss.
    pub fn get_or_compute(&mut self, id: &str, embedding: &[f32]) -> f32 {
        if let Some(&m) = self.cache.get(id) {
            return m;
        }
        let m = magnitude(embedding);
        self.cache.insert(id.to_string(), m);
        m
    }

    /// Drop a cached entry (called on volume delete).
    pub fn invalidate(&mut self, id: &str) {
        self.cache.remove(id);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

/// Cosine similarity using a pre-populated/lazily-populated magnitude cache
/// for the `entry` side. `query` is assumed to already be the caller's raw
/// query vector; its magnitude is passed in precomputed since queries aren't
/// cached across calls.
pub fn fast_cosine(
    query: &[f32],
    query_magnitude: f32,
    entry_id: &str,
    entry_embedding: &[f32],
    cache: &mut MagnitudeCache,
) -> Option<f32> {
    if query.len() != entry_embedding.len() || query.is_empty() {
        return None;
    }
    if query_magnitude == 0.0 {
        return None;
    }
    let entry_mag = cache.get_or_compute(entry_id, entry_embedding);
    if entry_mag == 0.0 {
        return None;
    }
    let dot: f32 = query
        .iter()
        .zip(entry_embedding.iter())
        .map(|(x, y)| x * y)
        .sum();
    let score = dot / (query_magnitude * entry_mag);
    if !score.is_finite() {
        return None;
    }
    Some(score.clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_are_perfectly_similar() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine(&a, &a).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!((cosine(&[1.0, 0.0], &[0.0, 1.0]).unwrap()).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_undefined() {
        assert_eq!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]), None);
    }

    #[test]
    fn zero_magnitude_is_undefined() {
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn near_duplicate_scores_high() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.9, 0.1, 0.0];
        let score = cosine(&a, &b).unwrap();
        assert!((score - 0.9939).abs() < 1e-3);
    }

    #[test]
    fn magnitude_cache_invalidation() {
        let mut cache = MagnitudeCache::new();
        let m1 = cache.get_or_compute("a", &[3.0, 4.0]);
        assert!((m1 - 5.0).abs() < 1e-6);
        cache.invalidate("a");
        // Changing the underlying vector after invalidation recomputes.
        let m2 = cache.get_or_compute("a", &[0.0, 0.0]);
        assert_eq!(m2, 0.0);
    }

    #[test]
    fn fast_cosine_matches_plain_cosine() {
        let q = vec![1.0, 0.0, 0.0];
        let e = vec![0.9, 0.1, 0.0];
        let mut cache = MagnitudeCache::new();
        let fast = fast_cosine(&q, magnitude(&q), "e1", &e, &mut cache).unwrap();
        let plain = cosine(&q, &e).unwrap();
        assert!((fast - plain).abs() < 1e-5);
    }
}
