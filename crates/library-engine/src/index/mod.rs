//! Inverted & Metadata Indexes (C4), Topic Catalog (C5)

pub mod inverted;
pub mod metadata;
pub mod topic;

pub use inverted::{InvertedIndex, TokenScore};
pub use metadata::{FilterMode, MetadataFilter, MetadataIndex};
pub use topic::TopicCatalog;

/// Tokenize text the way every term-based mode (token/BM25) expects:
/// lowercase, split on non-word boundaries, drop empty tokens. No stemming,
/// no stopwords (spec §4.4).
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_splits_on_non_word() {
        assert_eq!(
            tokenize("Cat, Dog! mouse_trap"),
            vec!["cat", "dog", "mouse_trap"]
        );
    }

    #[test]
    fn tokenize_drops_empty_tokens() {
        assert_eq!(tokenize("  a   b  "), vec!["a", "b"]);
    }
}
