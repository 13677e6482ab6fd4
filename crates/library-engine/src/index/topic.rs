//! Topic Catalog (C5) — hierarchical `topic -> ids` index with glob-based
//! matching for `filterByTopic`.

use std::collections::{HashMap, HashSet};

use crate::glob::{matches_any, GlobPattern};

/// `topic -> set of ids`. Topics are `/`-separated hierarchical paths; a
/// query for topic `T` only matches ids registered at `T` exactly (children
/// are not implicitly matched, spec §3).
#[derive(Debug, Default)]
pub struct TopicCatalog {
    topics: HashMap<String, HashSet<String>>,
}

impl TopicCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, topic: &str, id: &str) {
        self.topics
            .entry(topic.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn remove(&mut self, topic: &str, id: &str) {
        if let Some(ids) = self.topics.get_mut(topic) {
            ids.remove(id);
            if ids.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    /// Remove `id` from every topic it might be registered under.
    pub fn remove_from_all(&mut self, id: &str) {
        self.topics.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }

    /// All known topic paths.
    pub fn topics(&self) -> impl Iterator<Item = &String> {
        self.topics.keys()
    }

    /// Exact-match ids registered under `topic`.
    pub fn exact(&self, topic: &str) -> HashSet<String> {
        self.topics.get(topic).cloned().unwrap_or_default()
    }

    /// Union of ids whose topic matches any of `patterns` (glob-capable,
    /// spec §4.5). Callers passing plain literal topics get exact matching
    /// for free since a literal pattern only matches itself.
    pub fn filter_by_topic(&self, patterns: &[&str]) -> HashSet<String> {
        let compiled: Vec<GlobPattern> = patterns.iter().map(|p| GlobPattern::compile(p)).collect();
        let mut out = HashSet::new();
        for (topic, ids) in &self.topics {
            if matches_any(&compiled, topic) {
                out.extend(ids.iter().cloned());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_topic_does_not_match_children() {
        let mut cat = TopicCatalog::new();
        cat.add("rust", "v1");
        cat.add("rust/async", "v2");
        assert_eq!(cat.exact("rust"), HashSet::from(["v1".to_string()]));
    }

    #[test]
    fn filter_by_topic_unions_glob_matches() {
        let mut cat = TopicCatalog::new();
        cat.add("rust/async", "v1");
        cat.add("rust/sync", "v2");
        cat.add("cooking", "v3");

        let ids = cat.filter_by_topic(&["rust/*"]);
        assert_eq!(ids, HashSet::from(["v1".to_string(), "v2".to_string()]));
    }

    #[test]
    fn remove_from_all_drops_empty_topics() {
        let mut cat = TopicCatalog::new();
        cat.add("rust", "v1");
        cat.remove_from_all("v1");
        assert!(cat.exact("rust").is_empty());
        assert_eq!(cat.topics().count(), 0);
    }
}
