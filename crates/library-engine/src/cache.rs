//! Text Cache (C11) — bounded LRU over volume text, with two independent
//! bounds: entry count and total byte size.

use std::num::NonZeroUsize;

use lru::LruCache;

/// LRU cache of `id -> text`, bounded by both entry count and total bytes.
pub struct TextCache {
    inner: LruCache<String, String>,
    max_bytes: usize,
    bytes: usize,
}

impl TextCache {
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).unwrap();
        Self {
            inner: LruCache::new(cap),
            max_bytes,
            bytes: 0,
        }
    }

    /// Insert or replace, promoting to MRU, then evict LRU entries until
    /// both the entry-count and byte bounds hold.
    pub fn put(&mut self, id: String, text: String) {
        if let Some(old) = self.inner.put(id, text.clone()) {
            self.bytes -= old.len();
        }
        self.bytes += text.len();
        self.evict_to_bounds();
    }

    /// Promote-on-hit lookup.
    pub fn get(&mut self, id: &str) -> Option<&String> {
        self.inner.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<String> {
        let removed = self.inner.pop(id);
        if let Some(ref text) = removed {
            self.bytes -= text.len();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.inner.clear();
        self.bytes = 0;
    }

    /// Entry count.
    pub fn size(&self) -> usize {
        self.inner.len()
    }

    /// Sum of byte lengths of all cached text.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn evict_to_bounds(&mut self) {
        while self.bytes > self.max_bytes && self.inner.len() > 0 {
            if let Some((_, text)) = self.inner.pop_lru() {
                self.bytes -= text.len();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trips() {
        let mut cache = TextCache::new(10, 1024);
        cache.put("a".to_string(), "hello".to_string());
        assert_eq!(cache.get("a"), Some(&"hello".to_string()));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.bytes(), 5);
    }

    #[test]
    fn entry_count_bound_evicts_lru() {
        let mut cache = TextCache::new(2, 1024);
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        cache.put("c".to_string(), "3".to_string());
        assert_eq!(cache.size(), 2);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn byte_bound_evicts_even_under_entry_cap() {
        let mut cache = TextCache::new(100, 10);
        cache.put("a".to_string(), "12345".to_string());
        cache.put("b".to_string(), "12345".to_string());
        cache.put("c".to_string(), "12345".to_string());
        assert!(cache.bytes() <= 10);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn get_promotes_to_mru() {
        let mut cache = TextCache::new(2, 1024);
        cache.put("a".to_string(), "1".to_string());
        cache.put("b".to_string(), "2".to_string());
        cache.get("a");
        cache.put("c".to_string(), "3".to_string());
        // "a" was just promoted, so "b" should be evicted instead.
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
    }

    #[test]
    fn remove_updates_byte_total() {
        let mut cache = TextCache::new(10, 1024);
        cache.put("a".to_string(), "hello".to_string());
        cache.remove("a");
        assert_eq!(cache.bytes(), 0);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn clear_resets_everything() {
        let mut cache = TextCache::new(10, 1024);
        cache.put("a".to_string(), "hello".to_string());
        cache.clear();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.bytes(), 0);
    }
}
