//! Stacks configuration
//!
//! Every knob enumerated in the spec lives on [`StacksConfig`], following the
//! teacher's `*Config` struct pattern (`VectorIndexConfig`,
//! `HybridSearchConfig`): one struct, a `Default` impl carrying the
//! documented defaults, no environment/CLI parsing here (that belongs to the
//! embedding host).

use serde::{Deserialize, Serialize};

/// What to do when `add` detects a near-duplicate above `duplicateThreshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateBehavior {
    /// Drop the insert, return the existing id.
    Skip,
    /// Log a warning and insert anyway.
    #[default]
    Warn,
    /// Fail the call with `LibraryError::Duplicate`.
    Error,
}

/// Recency-decay configuration (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecencyConfig {
    /// Half-life for the exponential recency decay, in milliseconds.
    pub half_life_ms: i64,
}

impl Default for RecencyConfig {
    fn default() -> Self {
        Self {
            half_life_ms: 7 * 24 * 60 * 60 * 1000,
        }
    }
}

/// Adaptive learning engine configuration (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningConfig {
    /// Whether the learning engine observes searches/adapts weights at all.
    pub enabled: bool,
    /// Bound on the query-history ring buffer.
    pub max_query_history: usize,
    /// Decay constant input for the interest embedding, in milliseconds.
    pub query_decay_ms: i64,
    /// How much a single query nudges `adaptedWeights`.
    pub weight_adaptation_rate: f32,
    /// Weight given to interest-embedding alignment in `computeBoost`.
    pub interest_boost_weight: f32,
    /// Whether explicit feedback / learning state round-trips through save.
    pub feedback_persistence: bool,
    /// Per-topic learning state (spec open question: default off).
    pub topic_learning_enabled: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_query_history: 50,
            query_decay_ms: 7 * 24 * 60 * 60 * 1000,
            weight_adaptation_rate: 0.05,
            interest_boost_weight: 0.15,
            feedback_persistence: true,
            topic_learning_enabled: cfg!(feature = "topic-learning"),
        }
    }
}

/// Text cache bounds (C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextCacheConfig {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for TextCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Implementation-defined sizing hints for the topic index (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicIndexConfig {
    /// Pre-reserved capacity hint for the topic -> ids map.
    pub expected_topics: usize,
}

impl Default for TopicIndexConfig {
    fn default() -> Self {
        Self { expected_topics: 64 }
    }
}

/// Top-level configuration for a [`crate::stacks::Stacks`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StacksConfig {
    /// Save after every mutation instead of relying on the background flush.
    pub auto_save: bool,
    /// Period of the background flush task, in milliseconds.
    pub flush_interval_ms: u64,
    /// Regex patterns longer than this are rejected (never throws).
    pub max_regex_pattern_length: usize,
    /// 0 disables duplicate detection on insert; >0 enables it.
    pub duplicate_threshold: f32,
    /// What `add` does when a duplicate is found above the threshold.
    pub duplicate_behavior: DuplicateBehavior,
    pub topic_index: TopicIndexConfig,
    pub recency: RecencyConfig,
    pub learning: LearningConfig,
    pub text_cache: TextCacheConfig,
}

impl Default for StacksConfig {
    fn default() -> Self {
        Self {
            auto_save: false,
            flush_interval_ms: 5000,
            max_regex_pattern_length: 256,
            duplicate_threshold: 0.0,
            duplicate_behavior: DuplicateBehavior::default(),
            topic_index: TopicIndexConfig::default(),
            recency: RecencyConfig::default(),
            learning: LearningConfig::default(),
            text_cache: TextCacheConfig::default(),
        }
    }
}
