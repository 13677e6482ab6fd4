//! Volume — the atomic unit of the library
//!
//! A [`Volume`] bundles source text, a dense embedding, string metadata, and
//! an insert timestamp. Once inserted, `id`/`text`/`embedding`/`timestamp`
//! are immutable; only `metadata` may be replaced, and only atomically.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored record of text + embedding + metadata + timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// The source text. Never empty for a volume that made it past `add`.
    pub text: String,
    /// Dense embedding. Length is fixed per volume, not required across
    /// volumes. Never empty for a volume that made it past `add`.
    pub embedding: Vec<f32>,
    /// String-keyed, string-valued metadata. Keys are unique.
    pub metadata: HashMap<String, String>,
    /// Insert time.
    pub timestamp: DateTime<Utc>,
}

impl Volume {
    /// Build a new volume with a fresh id and the current timestamp.
    pub fn new(text: String, embedding: Vec<f32>, metadata: HashMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            embedding,
            metadata,
            timestamp: Utc::now(),
        }
    }

    /// Insert timestamp as epoch-milliseconds, the external-facing unit.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// The `metadata.topic` value, if any.
    pub fn topic(&self) -> Option<&str> {
        self.metadata.get("topic").map(|s| s.as_str())
    }
}

/// Access statistics tracked per volume id.
///
/// Incremented by `search`, `advancedSearch`, and `getById`. Never
/// incremented by `recommend` (§3, §4.9 — avoids a positive feedback loop).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccessStats {
    pub access_count: u64,
    pub last_accessed: i64,
}

impl AccessStats {
    pub fn record_access(&mut self, now_ms: i64) {
        self.access_count += 1;
        self.last_accessed = now_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_volume_gets_unique_id_and_fresh_timestamp() {
        let before = Utc::now();
        let v1 = Volume::new("hello".into(), vec![1.0, 0.0], HashMap::new());
        let v2 = Volume::new("world".into(), vec![0.0, 1.0], HashMap::new());
        assert_ne!(v1.id, v2.id);
        assert!(v1.timestamp >= before);
    }

    #[test]
    fn topic_reads_metadata_key() {
        let mut meta = HashMap::new();
        meta.insert("topic".to_string(), "rust/async".to_string());
        let v = Volume::new("x".into(), vec![1.0], meta);
        assert_eq!(v.topic(), Some("rust/async"));
    }

    #[test]
    fn access_stats_increment() {
        let mut stats = AccessStats::default();
        stats.record_access(100);
        stats.record_access(200);
        assert_eq!(stats.access_count, 2);
        assert_eq!(stats.last_accessed, 200);
    }
}
