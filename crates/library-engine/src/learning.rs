//! Adaptive Learning Engine (C10)
//!
//! Observes searches (`recordQuery`) and explicit relevance feedback
//! (`recordFeedback`), adapting the weighted-search combination weights and
//! an interest embedding over time. Everything here is query-diversity
//! gated: a burst of near-identical queries only counts once toward
//! `queryCount`, following spec §4.10 step 3.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recommend::RecommendWeights;
use crate::similarity::cosine;

const DIVERSITY_THRESHOLD: f32 = 0.9;
const MAX_SAMPLES: usize = 20;
const MIN_WEIGHT: f32 = 0.05;
const MAX_WEIGHT: f32 = 0.9;
const MIN_TOPIC_QUERIES_FOR_OWN_STATE: u32 = 10;

/// Per-id observation state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub query_count: u32,
    pub total_retrievals: u64,
    pub last_query_timestamp: i64,
    pub sampled_query_embeddings: Vec<Vec<f32>>,
}

/// Explicit relevant/not-relevant tally for an id.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitFeedback {
    pub positive: u32,
    pub negative: u32,
}

/// One entry in the bounded query history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryRecord {
    embedding: Vec<f32>,
    timestamp: DateTime<Utc>,
    result_count: usize,
}

/// Per-scope (global or per-topic) adaptive state: history, weights, and the
/// derived interest embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scope {
    query_history: Vec<QueryRecord>,
    adapted_weights: RecommendWeights,
    interest_embedding: Option<Vec<f32>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            query_history: Vec::new(),
            adapted_weights: RecommendWeights::default(),
            interest_embedding: None,
        }
    }
}

/// Configuration the engine needs at call time (mirrors
/// [`crate::config::LearningConfig`] without depending on the whole
/// `StacksConfig`).
#[derive(Debug, Clone, Copy)]
pub struct LearningParams {
    pub max_query_history: usize,
    pub query_decay_ms: i64,
    pub weight_adaptation_rate: f32,
    pub interest_boost_weight: f32,
    pub topic_learning_enabled: bool,
}

/// The adaptive learning engine's full persisted state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LearningEngine {
    feedback: HashMap<String, Feedback>,
    explicit_feedback: HashMap<String, ExplicitFeedback>,
    global: Scope,
    #[serde(default)]
    topic_states: HashMap<String, Scope>,
    #[serde(default)]
    topic_query_counts: HashMap<String, u32>,
}

impl LearningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a search: `query_embedding` against the ids it returned.
    /// Ignored when `query_embedding` or `result_ids` is empty.
    pub fn record_query(
        &mut self,
        query_embedding: &[f32],
        result_ids: &[String],
        topic: Option<&str>,
        params: &LearningParams,
        now: DateTime<Utc>,
    ) {
        if query_embedding.is_empty() || result_ids.is_empty() {
            return;
        }

        // 3. Per-id retrieval counters, gated diversity for queryCount. Runs
        // once per query against the shared feedback map — spec §4.10 step 6
        // mirrors only steps 2, 4, 5 into a topic's scope, not step 3.
        Self::record_feedback_counters(&mut self.feedback, query_embedding, result_ids, now);

        Self::record_query_scope(&mut self.global, &self.feedback, query_embedding, result_ids, params, now);

        if let Some(topic) = topic {
            if params.topic_learning_enabled {
                let count = self.topic_query_counts.entry(topic.to_string()).or_insert(0);
                *count += 1;
                let scope = self.topic_states.entry(topic.to_string()).or_default();
                Self::record_query_scope(scope, &self.feedback, query_embedding, result_ids, params, now);
            }
        }
    }

    /// Step 3: per-id retrieval counters, gated diversity for `queryCount`.
    /// Updates the shared feedback map; must run exactly once per query
    /// regardless of how many scopes (global, topic) observe it.
    fn record_feedback_counters(
        feedback: &mut HashMap<String, Feedback>,
        query_embedding: &[f32],
        result_ids: &[String],
        now: DateTime<Utc>,
    ) {
        for id in result_ids {
            let entry = feedback.entry(id.clone()).or_default();
            entry.total_retrievals += 1;
            entry.last_query_timestamp = now.timestamp_millis();

            let is_diverse = entry
                .sampled_query_embeddings
                .iter()
                .all(|sample| cosine(sample, query_embedding).is_none_or(|sim| sim < DIVERSITY_THRESHOLD));
            if is_diverse {
                entry.query_count += 1;
                entry.sampled_query_embeddings.push(query_embedding.to_vec());
                if entry.sampled_query_embeddings.len() > MAX_SAMPLES {
                    entry.sampled_query_embeddings.remove(0);
                }
            }
        }
    }

    /// Steps 2, 4, 5: history ring, adapted weights, interest embedding.
    /// Reads the feedback map (already updated by
    /// [`Self::record_feedback_counters`]) but never writes it, so this can
    /// run once per scope (global, and optionally the query's topic) without
    /// double-counting anything.
    fn record_query_scope(
        scope: &mut Scope,
        feedback: &HashMap<String, Feedback>,
        query_embedding: &[f32],
        result_ids: &[String],
        params: &LearningParams,
        now: DateTime<Utc>,
    ) {
        // 2. Append to the bounded history ring.
        scope.query_history.push(QueryRecord {
            embedding: query_embedding.to_vec(),
            timestamp: now,
            result_count: result_ids.len(),
        });
        if scope.query_history.len() > params.max_query_history {
            let overflow = scope.query_history.len() - params.max_query_history;
            scope.query_history.drain(0..overflow);
        }

        // 4. Adapt weights.
        let above_threshold = result_ids
            .iter()
            .filter(|id| feedback.get(*id).is_some_and(|f| f.total_retrievals > 3))
            .count();
        let ratio = above_threshold as f32 / result_ids.len() as f32;

        let mut w = scope.adapted_weights;
        if ratio > 0.5 {
            w.frequency += params.weight_adaptation_rate * 0.5;
        } else {
            w.vector += params.weight_adaptation_rate * 0.5;
        }
        w.vector = w.vector.clamp(MIN_WEIGHT, MAX_WEIGHT);
        w.recency = w.recency.clamp(MIN_WEIGHT, MAX_WEIGHT);
        w.frequency = w.frequency.clamp(MIN_WEIGHT, MAX_WEIGHT);
        let sum = w.vector + w.recency + w.frequency;
        if sum > 0.0 {
            w.vector /= sum;
            w.recency /= sum;
            w.frequency /= sum;
        }
        scope.adapted_weights = w;

        // 5. Recompute the interest embedding: decay-weighted mean, unit norm.
        let decay_rate = std::f64::consts::LN_2 / params.query_decay_ms.max(1) as f64;
        let dim = scope.query_history.last().map(|q| q.embedding.len()).unwrap_or(0);
        let mut acc = vec![0.0f64; dim];
        let mut weight_sum = 0.0f64;
        for record in &scope.query_history {
            if record.embedding.len() != dim {
                continue;
            }
            let age_ms = (now - record.timestamp).num_milliseconds().max(0) as f64;
            let w = (-decay_rate * age_ms).exp();
            weight_sum += w;
            for (a, &v) in acc.iter_mut().zip(record.embedding.iter()) {
                *a += w * v as f64;
            }
        }
        scope.interest_embedding = if weight_sum > 0.0 {
            let mean: Vec<f32> = acc.iter().map(|&v| (v / weight_sum) as f32).collect();
            let mag = crate::similarity::magnitude(&mean);
            if mag > 0.0 {
                Some(mean.iter().map(|&v| v / mag).collect())
            } else {
                None
            }
        } else {
            None
        };
    }

    /// `recordFeedback(id, relevant)`.
    pub fn record_feedback(&mut self, id: &str, relevant: bool) {
        let entry = self.explicit_feedback.entry(id.to_string()).or_default();
        if relevant {
            entry.positive += 1;
        } else {
            entry.negative += 1;
        }
    }

    fn relevance_score(&self, id: &str, max_query_history: usize) -> f32 {
        let query_count = self.feedback.get(id).map(|f| f.query_count).unwrap_or(0) as f32;
        let explicit = self.explicit_feedback.get(id).copied().unwrap_or_default();
        let raw = (query_count + 5.0 * explicit.positive as f32 - 3.0 * explicit.negative as f32)
            / max_query_history.max(1) as f32;
        raw.clamp(0.0, 1.0)
    }

    /// `computeBoost(id, embedding, topic?)`, clamped to `[0.8, 1.2]`.
    pub fn compute_boost(&self, id: &str, embedding: &[f32], topic: Option<&str>, max_query_history: usize, interest_boost_weight: f32) -> f32 {
        let mut boost = 1.0f32;
        boost += 0.1 * self.relevance_score(id, max_query_history);

        let effective_interest = topic
            .and_then(|t| self.topic_states.get(t))
            .and_then(|s| s.interest_embedding.as_ref())
            .or(self.global.interest_embedding.as_ref());

        if let Some(interest) = effective_interest {
            if let Some(sim) = cosine(embedding, interest) {
                boost += interest_boost_weight * sim.max(0.0);
            }
        }

        boost.clamp(0.8, 1.2)
    }

    /// `getAdaptedWeights(topic?)`: the topic scope's weights iff that topic
    /// has seen at least [`MIN_TOPIC_QUERIES_FOR_OWN_STATE`] queries,
    /// otherwise the global weights.
    pub fn adapted_weights(&self, topic: Option<&str>) -> RecommendWeights {
        if let Some(topic) = topic {
            if self.topic_query_counts.get(topic).copied().unwrap_or(0) >= MIN_TOPIC_QUERIES_FOR_OWN_STATE {
                if let Some(scope) = self.topic_states.get(topic) {
                    return scope.adapted_weights;
                }
            }
        }
        self.global.adapted_weights
    }

    pub fn global_interest_embedding(&self) -> Option<&[f32]> {
        self.global.interest_embedding.as_deref()
    }

    /// A boost closure suitable for [`crate::recommend::recommend`].
    pub fn boost_fn<'a>(&'a self, topic: Option<&'a str>, max_query_history: usize, interest_boost_weight: f32) -> impl FnMut(&str, &[f32]) -> f32 + 'a {
        move |id, embedding| self.compute_boost(id, embedding, topic, max_query_history, interest_boost_weight)
    }
}
