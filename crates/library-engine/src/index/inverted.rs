//! Inverted index (C4) — term -> posting list, plus BM25 and token-cosine
//! scoring over it.

use std::collections::HashMap;

use super::tokenize;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

#[derive(Debug, Clone, Default)]
struct Posting {
    /// id -> term frequency in that document.
    tf: HashMap<String, u32>,
}

/// Term index for BM25/token search, maintained incrementally as volumes
/// are added/removed.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Posting>,
    /// id -> document length (token count).
    doc_len: HashMap<String, u32>,
    /// Sum of all document lengths, for avgdl.
    total_len: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) a document's text under `id`.
    pub fn add(&mut self, id: &str, text: &str) {
        self.remove(id);
        let tokens = tokenize(text);
        self.doc_len.insert(id.to_string(), tokens.len() as u32);
        self.total_len += tokens.len() as u64;

        let mut counts: HashMap<String, u32> = HashMap::new();
        for tok in tokens {
            *counts.entry(tok).or_default() += 1;
        }
        for (term, count) in counts {
            let posting = self.postings.entry(term).or_default();
            posting.tf.insert(id.to_string(), count);
        }
    }

    /// Remove a document from the index.
    pub fn remove(&mut self, id: &str) {
        if let Some(len) = self.doc_len.remove(id) {
            self.total_len = self.total_len.saturating_sub(len as u64);
        }
        self.postings.retain(|_, posting| {
            posting.tf.remove(id);
            !posting.tf.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_len.clear();
        self.total_len = 0;
    }

    fn n(&self) -> usize {
        self.doc_len.len()
    }

    fn avgdl(&self) -> f32 {
        if self.doc_len.is_empty() {
            0.0
        } else {
            self.total_len as f32 / self.doc_len.len() as f32
        }
    }

    fn df(&self, term: &str) -> usize {
        self.postings.get(term).map(|p| p.tf.len()).unwrap_or(0)
    }

    /// BM25 scores for `query` over every document that shares at least one
    /// query term, sorted descending and renormalized to `[0, 1]` within
    /// the result set (spec §4.4).
    pub fn bm25(&self, query: &str) -> Vec<(String, f32)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.n() == 0 {
            return Vec::new();
        }

        let n = self.n() as f32;
        let avgdl = self.avgdl();
        let mut scores: HashMap<String, f32> = HashMap::new();

        for term in &terms {
            let df = self.df(term);
            if df == 0 {
                continue;
            }
            // Standard BM25 idf; clamps above zero isn't required by the
            // spec, left as the textbook formula.
            let idf = ((n - df as f32 + 0.5) / (df as f32 + 0.5) + 1.0).ln();
            let posting = &self.postings[term];
            for (id, &tf) in &posting.tf {
                let dl = *self.doc_len.get(id).unwrap_or(&0) as f32;
                let denom = tf as f32 + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl.max(1.0));
                let score = idf * (tf as f32 * (BM25_K1 + 1.0)) / denom.max(1e-6);
                *scores.entry(id.clone()).or_default() += score;
            }
        }

        let mut results: Vec<(String, f32)> = scores.into_iter().collect();
        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let max = results.first().map(|(_, s)| *s).unwrap_or(0.0);
        if max > 0.0 {
            for (_, score) in &mut results {
                *score /= max;
            }
        } else {
            for (_, score) in &mut results {
                *score = 1.0;
            }
        }
        results
    }

    /// Bag-of-words frequency vector for a document already indexed under
    /// `id`. Used by token-mode cosine scoring.
    pub fn bow(&self, id: &str) -> HashMap<String, u32> {
        let mut out = HashMap::new();
        for (term, posting) in &self.postings {
            if let Some(&tf) = posting.tf.get(id) {
                out.insert(term.clone(), tf);
            }
        }
        out
    }

    /// All indexed ids.
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.doc_len.keys()
    }
}

/// Outcome of a token-mode comparison: id plus cosine score over bag-of-words
/// frequency vectors.
pub type TokenScore = (String, f32);

/// Cosine similarity between two bag-of-words frequency vectors.
pub fn bow_cosine(a: &HashMap<String, u32>, b: &HashMap<String, u32>) -> f32 {
    let dot: f32 = a
        .iter()
        .filter_map(|(term, &tf_a)| b.get(term).map(|&tf_b| tf_a as f32 * tf_b as f32))
        .sum();
    let mag_a = (a.values().map(|&v| (v * v) as f32).sum::<f32>()).sqrt();
    let mag_b = (b.values().map(|&v| (v * v) as f32).sum::<f32>()).sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
    }
}

/// Score `query` against every indexed document using token-mode cosine
/// similarity over bag-of-words frequency vectors.
pub fn token_scores(index: &InvertedIndex, query: &str) -> Vec<TokenScore> {
    let mut query_bow: HashMap<String, u32> = HashMap::new();
    for tok in tokenize(query) {
        *query_bow.entry(tok).or_default() += 1;
    }
    if query_bow.is_empty() {
        return Vec::new();
    }

    let mut results: Vec<TokenScore> = index
        .ids()
        .map(|id| {
            let doc_bow = index.bow(id);
            (id.clone(), bow_cosine(&query_bow, &doc_bow))
        })
        .collect();
    results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bm25_orders_by_term_frequency_and_length() {
        let mut idx = InvertedIndex::new();
        idx.add("v1", "cat cat dog");
        idx.add("v2", "cat");
        idx.add("v3", "dog mouse");

        let results = idx.bm25("cat");
        let ids: Vec<&str> = results.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[test]
    fn bm25_scores_are_normalized_to_unit_range() {
        let mut idx = InvertedIndex::new();
        idx.add("v1", "cat cat dog");
        idx.add("v2", "cat");
        let results = idx.bm25("cat");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        for (_, s) in &results {
            assert!(*s >= 0.0 && *s <= 1.0);
        }
    }

    #[test]
    fn remove_drops_document_from_postings() {
        let mut idx = InvertedIndex::new();
        idx.add("v1", "cat dog");
        idx.remove("v1");
        assert!(idx.bm25("cat").is_empty());
    }

    #[test]
    fn token_mode_scores_via_bow_cosine() {
        let mut idx = InvertedIndex::new();
        idx.add("v1", "rust programming language");
        idx.add("v2", "rust programming");
        idx.add("v3", "cooking recipes");

        let scores = token_scores(&idx, "rust programming");
        assert_eq!(scores[0].0, "v2");
        assert!(scores.iter().find(|(id, _)| id == "v3").unwrap().1 < 0.3);
    }
}
