//! Metadata index (C4) — `(key, value) -> ids`, plus the filter predicate
//! language used by `advancedSearch`/`filterByMetadata`.

use std::collections::{HashMap, HashSet};

/// How a single metadata filter compares against a volume's value for
/// `key`. `gt/gte/lt/lte/between` parse the stored string as `f64` and skip
/// (never match) on parse failure, per spec §4.4.
#[derive(Debug, Clone)]
pub enum FilterMode {
    Eq(String),
    Neq(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(regex::Regex),
    Exists,
    NotExists,
    Gt(f64),
    Gte(f64),
    Lt(f64),
    Lte(f64),
    In(Vec<String>),
    NotIn(Vec<String>),
    Between(f64, f64),
}

/// A single metadata filter: `metadata[key]` compared via `mode`.
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    pub key: String,
    pub mode: FilterMode,
}

impl MetadataFilter {
    pub fn new(key: impl Into<String>, mode: FilterMode) -> Self {
        Self {
            key: key.into(),
            mode,
        }
    }

    /// Whether `metadata` satisfies this single filter.
    pub fn matches(&self, metadata: &HashMap<String, String>) -> bool {
        let value = metadata.get(&self.key);
        match &self.mode {
            FilterMode::Exists => value.is_some(),
            FilterMode::NotExists => value.is_none(),
            FilterMode::Eq(expected) => value.is_some_and(|v| v == expected),
            FilterMode::Neq(expected) => value.is_none_or(|v| v != expected),
            FilterMode::Contains(needle) => value.is_some_and(|v| v.contains(needle.as_str())),
            FilterMode::StartsWith(prefix) => value.is_some_and(|v| v.starts_with(prefix.as_str())),
            FilterMode::EndsWith(suffix) => value.is_some_and(|v| v.ends_with(suffix.as_str())),
            FilterMode::Regex(re) => value.is_some_and(|v| re.is_match(v)),
            FilterMode::In(set) => value.is_some_and(|v| set.iter().any(|s| s == v)),
            FilterMode::NotIn(set) => value.is_none_or(|v| !set.iter().any(|s| s == v)),
            FilterMode::Gt(n) => parse(value).is_some_and(|v| v > *n),
            FilterMode::Gte(n) => parse(value).is_some_and(|v| v >= *n),
            FilterMode::Lt(n) => parse(value).is_some_and(|v| v < *n),
            FilterMode::Lte(n) => parse(value).is_some_and(|v| v <= *n),
            FilterMode::Between(lo, hi) => parse(value).is_some_and(|v| v >= *lo && v <= *hi),
        }
    }
}

fn parse(value: Option<&String>) -> Option<f64> {
    value.and_then(|v| v.parse::<f64>().ok())
}

/// Apply a set of filters as an AND across all of them (spec §4.4).
pub fn matches_all(filters: &[MetadataFilter], metadata: &HashMap<String, String>) -> bool {
    filters.iter().all(|f| f.matches(metadata))
}

/// `(key, value) -> ids` index, maintained incrementally and rebuilt on
/// load. Primarily an acceleration structure for equality filters; the full
/// filter language in [`FilterMode`] still needs the underlying metadata
/// map for non-equality modes, so `advancedSearch` combines this index with
/// direct predicate evaluation rather than relying on it exclusively.
#[derive(Debug, Default)]
pub struct MetadataIndex {
    index: HashMap<String, HashMap<String, HashSet<String>>>,
}

impl MetadataIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: &str, metadata: &HashMap<String, String>) {
        for (k, v) in metadata {
            self.index
                .entry(k.clone())
                .or_default()
                .entry(v.clone())
                .or_default()
                .insert(id.to_string());
        }
    }

    pub fn remove(&mut self, id: &str, metadata: &HashMap<String, String>) {
        for (k, v) in metadata {
            if let Some(values) = self.index.get_mut(k) {
                if let Some(ids) = values.get_mut(v) {
                    ids.remove(id);
                    if ids.is_empty() {
                        values.remove(v);
                    }
                }
                if values.is_empty() {
                    self.index.remove(k);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// ids with `metadata[key] == value`, for accelerated equality lookups.
    pub fn lookup(&self, key: &str, value: &str) -> Option<&HashSet<String>> {
        self.index.get(key).and_then(|values| values.get(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn eq_filter_matches_exact_value() {
        let f = MetadataFilter::new("lang", FilterMode::Eq("rust".into()));
        assert!(f.matches(&meta(&[("lang", "rust")])));
        assert!(!f.matches(&meta(&[("lang", "go")])));
    }

    #[test]
    fn numeric_filters_skip_on_parse_failure() {
        let f = MetadataFilter::new("score", FilterMode::Gt(5.0));
        assert!(!f.matches(&meta(&[("score", "not-a-number")])));
        assert!(f.matches(&meta(&[("score", "10")])));
    }

    #[test]
    fn filters_combine_as_and() {
        let filters = vec![
            MetadataFilter::new("lang", FilterMode::Eq("rust".into())),
            MetadataFilter::new("level", FilterMode::Eq("advanced".into())),
        ];
        assert!(matches_all(&filters, &meta(&[("lang", "rust"), ("level", "advanced")])));
        assert!(!matches_all(&filters, &meta(&[("lang", "rust"), ("level", "beginner")])));
    }

    #[test]
    fn metadata_index_lookup_and_remove() {
        let mut idx = MetadataIndex::new();
        let m = meta(&[("lang", "rust")]);
        idx.add("v1", &m);
        assert!(idx.lookup("lang", "rust").unwrap().contains("v1"));
        idx.remove("v1", &m);
        assert!(idx.lookup("lang", "rust").is_none());
    }
}
