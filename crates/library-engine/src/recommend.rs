//! Recommendation (C9) — weighted vector/recency/frequency scoring with an
//! optional learning boost. `recommend` never touches access stats (spec
//! §4.9, §8 invariant 5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::similarity::{fast_cosine, MagnitudeCache};
use crate::volume::{AccessStats, Volume};

/// Weights for the vector/recency/frequency combination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendWeights {
    pub vector: f32,
    pub recency: f32,
    pub frequency: f32,
}

impl Default for RecommendWeights {
    fn default() -> Self {
        Self {
            vector: 0.6,
            recency: 0.2,
            frequency: 0.2,
        }
    }
}

/// Options for [`recommend`].
pub struct RecommendOptions<'a> {
    pub query_embedding: Option<&'a [f32]>,
    pub weights: RecommendWeights,
    pub half_life_ms: i64,
    pub min_score: f32,
    pub max_results: usize,
}

impl<'a> Default for RecommendOptions<'a> {
    fn default() -> Self {
        Self {
            query_embedding: None,
            weights: RecommendWeights::default(),
            half_life_ms: 7 * 24 * 60 * 60 * 1000,
            min_score: 0.0,
            max_results: 10,
        }
    }
}

/// A recommended volume with its final score.
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub id: String,
    pub score: f32,
}

fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>, half_life_ms: i64) -> f32 {
    if half_life_ms <= 0 {
        return 0.0;
    }
    let age_ms = (now - timestamp).num_milliseconds().max(0) as f64;
    let decay = (-std::f64::consts::LN_2 * age_ms / half_life_ms as f64).exp();
    decay.clamp(0.0, 1.0) as f32
}

/// Rank `volumes` by weighted vector/recency/frequency score, scaled by
/// `learning_boost(id, embedding)` (in `[0.8, 1.2]`, identity 1.0 if the
/// learning engine is disabled).
pub fn recommend(
    volumes: &[&Volume],
    access_stats: &std::collections::HashMap<String, AccessStats>,
    options: &RecommendOptions,
    magnitudes: &mut MagnitudeCache,
    now: DateTime<Utc>,
    mut learning_boost: impl FnMut(&str, &[f32]) -> f32,
) -> Vec<Recommendation> {
    let max_access_count = access_stats
        .values()
        .map(|s| s.access_count)
        .max()
        .unwrap_or(0);

    let query_magnitude = options.query_embedding.map(crate::similarity::magnitude);

    let mut scored: Vec<Recommendation> = volumes
        .iter()
        .filter_map(|v| {
            let vector_score = match (options.query_embedding, query_magnitude) {
                (Some(q), Some(qm)) => fast_cosine(q, qm, &v.id, &v.embedding, magnitudes),
                _ => None,
            };
            let recency = recency_score(v.timestamp, now, options.half_life_ms);
            let frequency = if max_access_count == 0 {
                0.0
            } else {
                access_stats
                    .get(&v.id)
                    .map(|s| s.access_count as f32 / max_access_count as f32)
                    .unwrap_or(0.0)
            };

            let w = &options.weights;
            let base = vector_score.unwrap_or(0.0) * w.vector + recency * w.recency + frequency * w.frequency;
            let boost = learning_boost(&v.id, &v.embedding).clamp(0.8, 1.2);
            let score = base * boost;

            (score >= options.min_score).then_some(Recommendation {
                id: v.id.clone(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(options.max_results);
    scored
}
