//! Text Search (C6) — six matching modes, each producing a `[0, 1]` score.

use regex::Regex;

use crate::index::inverted::{bow_cosine, token_scores, InvertedIndex};
use crate::index::tokenize;

/// Which matching mode a text search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMode {
    Exact,
    Substring,
    Regex,
    Fuzzy,
    Token,
    Bm25,
}

impl TextMode {
    /// Whether `similarityThreshold` applies to this mode (spec §4.6).
    pub fn threshold_applies(self) -> bool {
        matches!(self, TextMode::Fuzzy | TextMode::Token | TextMode::Bm25)
    }
}

/// `exact`: case-sensitive equality. Score is 1 on match, otherwise no
/// match (never a partial score).
pub fn exact_match(query: &str, text: &str) -> Option<f32> {
    (query == text).then_some(1.0)
}

/// `substring`: case-insensitive contains.
pub fn substring_match(query: &str, text: &str) -> Option<f32> {
    text.to_lowercase()
        .contains(&query.to_lowercase())
        .then_some(1.0)
}

/// `regex`: match against a compiled pattern, rejecting patterns longer
/// than `max_pattern_length`. Never throws — rejection and match failure
/// both yield `None`, with rejection additionally logged by the caller.
pub fn regex_match(query: &str, text: &str, max_pattern_length: usize) -> Option<f32> {
    if query.len() > max_pattern_length {
        tracing::warn!(pattern_len = query.len(), max_pattern_length, "regex pattern rejected: too long");
        return None;
    }
    match Regex::new(query) {
        Ok(re) => re.is_match(text).then_some(1.0),
        Err(e) => {
            tracing::warn!(error = %e, "regex pattern rejected: failed to compile");
            None
        }
    }
}

/// `fuzzy`: Levenshtein-derived similarity in `[0, 1]`, via
/// `1 - distance / max(len_a, len_b)`.
pub fn fuzzy_score(query: &str, text: &str) -> f32 {
    let a: Vec<char> = query.chars().collect();
    let b: Vec<char> = text.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    let dist = levenshtein(&a, &b);
    1.0 - (dist as f32 / max_len as f32)
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let (n, m) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=m).collect();
    let mut curr = vec![0usize; m + 1];
    for i in 1..=n {
        curr[0] = i;
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[m]
}

/// `token`: cosine over bag-of-words frequency vectors between the raw
/// query and raw text (used when the caller wants token scoring without an
/// already-built [`InvertedIndex`], e.g. single-document comparisons).
pub fn token_score(query: &str, text: &str) -> f32 {
    let mut qbow = std::collections::HashMap::new();
    for tok in tokenize(query) {
        *qbow.entry(tok).or_insert(0u32) += 1;
    }
    let mut tbow = std::collections::HashMap::new();
    for tok in tokenize(text) {
        *tbow.entry(tok).or_insert(0u32) += 1;
    }
    bow_cosine(&qbow, &tbow)
}

/// `bm25`: score every indexed document against `query`, already
/// renormalized to `[0, 1]` by [`InvertedIndex::bm25`].
pub fn bm25_scores(index: &InvertedIndex, query: &str) -> Vec<(String, f32)> {
    index.bm25(query)
}

/// `token`, batch form: score every indexed document against `query`.
pub fn token_scores_batch(index: &InvertedIndex, query: &str) -> Vec<(String, f32)> {
    token_scores(index, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_is_case_sensitive() {
        assert_eq!(exact_match("Cat", "Cat"), Some(1.0));
        assert_eq!(exact_match("Cat", "cat"), None);
    }

    #[test]
    fn substring_is_case_insensitive() {
        assert_eq!(substring_match("CAT", "a cat sat"), Some(1.0));
        assert_eq!(substring_match("dog", "a cat sat"), None);
    }

    #[test]
    fn regex_rejects_overlong_pattern() {
        let pattern = "a".repeat(300);
        assert_eq!(regex_match(&pattern, "aaa", 256), None);
    }

    #[test]
    fn regex_matches_when_within_length() {
        assert_eq!(regex_match(r"^cat\d+$", "cat42", 256), Some(1.0));
        assert_eq!(regex_match(r"^cat\d+$", "dog42", 256), None);
    }

    #[test]
    fn fuzzy_score_identical_strings_is_one() {
        assert_eq!(fuzzy_score("hello", "hello"), 1.0);
    }

    #[test]
    fn fuzzy_score_is_between_zero_and_one() {
        let score = fuzzy_score("hello", "hallo");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn token_score_perfect_overlap() {
        assert_eq!(token_score("rust lang", "rust lang"), 1.0);
    }
}
