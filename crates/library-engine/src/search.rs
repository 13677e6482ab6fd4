//! Search & Rank (C7) — combined vector/text/metadata/date search.
//!
//! `advancedSearch` is the composition described in spec §4.7: candidate
//! set -> metadata filter -> date filter -> vector score -> text score ->
//! topic boost flag -> combine (per `rankBy`) -> field boosts -> sort ->
//! truncate.

use chrono::{DateTime, Utc};

use crate::index::metadata::{matches_all, MetadataFilter};
use crate::similarity::{fast_cosine, MagnitudeCache};
use crate::textsearch::TextMode;
use crate::volume::Volume;

/// How vector/text/metadata/recency components combine into a final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Vector,
    Text,
    Average,
    Multiply,
    Weighted,
}

/// Weights for the `weighted` combine strategy (spec §4.7 step 7).
#[derive(Debug, Clone, Copy)]
pub struct RankWeights {
    pub vector: f32,
    pub text: f32,
    pub metadata: f32,
    pub recency: f32,
}

impl Default for RankWeights {
    fn default() -> Self {
        Self {
            vector: 0.5,
            text: 0.3,
            metadata: 0.1,
            recency: 0.1,
        }
    }
}

/// Multiplicative/additive field boosts (spec §4.7 step 8).
#[derive(Debug, Clone, Copy)]
pub struct FieldBoosts {
    /// Multiplies the text score.
    pub text: f32,
    /// Added when all metadata filters pass.
    pub metadata: f32,
    /// Added when the topic-boost flag is set.
    pub topic: f32,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            text: 1.0,
            metadata: 0.0,
            topic: 0.0,
        }
    }
}

/// Text-matching options within `advancedSearch`.
#[derive(Debug, Clone)]
pub struct TextOptions<'a> {
    pub query: &'a str,
    pub mode: TextMode,
    pub threshold: f32,
}

/// Full option set for `advancedSearch`.
pub struct SearchOptions<'a> {
    pub query_embedding: Option<&'a [f32]>,
    pub similarity_threshold: f32,
    pub text: Option<TextOptions<'a>>,
    pub metadata_filters: &'a [MetadataFilter],
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub topic_filter: &'a [String],
    pub rank_by: RankBy,
    pub rank_weights: RankWeights,
    pub field_boosts: FieldBoosts,
    pub max_results: usize,
    pub half_life_ms: i64,
}

impl<'a> Default for SearchOptions<'a> {
    fn default() -> Self {
        Self {
            query_embedding: None,
            similarity_threshold: 0.0,
            text: None,
            metadata_filters: &[],
            date_range: None,
            topic_filter: &[],
            rank_by: RankBy::Vector,
            rank_weights: RankWeights::default(),
            field_boosts: FieldBoosts::default(),
            max_results: 10,
            half_life_ms: 7 * 24 * 60 * 60 * 1000,
        }
    }
}

/// One scored volume, carrying the component scores that produced the
/// final rank (useful for callers that want to explain a result, and for
/// the learning engine's post-search observation).
#[derive(Debug, Clone)]
pub struct RankedResult {
    pub id: String,
    pub score: f32,
    pub vector_score: Option<f32>,
    pub text_score: Option<f32>,
    pub topic_boosted: bool,
}

fn recency_score(timestamp: DateTime<Utc>, now: DateTime<Utc>, half_life_ms: i64) -> f32 {
    if half_life_ms <= 0 {
        return 0.0;
    }
    let age_ms = (now - timestamp).num_milliseconds().max(0) as f64;
    let decay = (-std::f64::consts::LN_2 * age_ms / half_life_ms as f64).exp();
    decay.clamp(0.0, 1.0) as f32
}

/// Run `advancedSearch` over `volumes`, consulting `magnitudes` for cached
/// vector magnitudes. Returns results sorted descending, truncated to
/// `options.max_results`. Topic matching uses simple membership against
/// `options.topic_filter` (exact, following spec §3's "exact" topic
/// semantics for the boost check, distinct from the glob-capable
/// `filterByTopic`).
pub fn advanced_search(
    volumes: &[&Volume],
    options: &SearchOptions,
    magnitudes: &mut MagnitudeCache,
    now: DateTime<Utc>,
) -> Vec<RankedResult> {
    let query_magnitude = options.query_embedding.map(crate::similarity::magnitude);

    let mut results = Vec::new();

    for volume in volumes {
        // 2. Metadata filter.
        if !matches_all(options.metadata_filters, &volume.metadata) {
            continue;
        }

        // 3. Date-range filter (inclusive bounds).
        if let Some((from, to)) = options.date_range {
            if volume.timestamp < from || volume.timestamp > to {
                continue;
            }
        }

        // 4. Vector scoring.
        let vector_score = match (options.query_embedding, query_magnitude) {
            (Some(q), Some(qm)) => {
                let score = fast_cosine(q, qm, &volume.id, &volume.embedding, magnitudes);
                match score {
                    Some(s) if s >= options.similarity_threshold => Some(s),
                    Some(_) => None,
                    None => None,
                }
            }
            _ => None,
        };
        // Under `vector`/`text` ranking, a requested-but-failing vector
        // score excludes the volume outright (vector acts as a filter even
        // when it isn't the scored component, per spec §4.7 step 7).
        let vector_requested = options.query_embedding.is_some();
        if vector_requested
            && vector_score.is_none()
            && matches!(options.rank_by, RankBy::Vector | RankBy::Text)
        {
            continue;
        }

        // 5. Text scoring. Field boosts (step 8) multiply the text score
        // before it enters the combine step, per spec §4.7.
        let raw_text_score = options.text.as_ref().map(|t| score_text(t, &volume.text));
        let text_requested = options.text.is_some();
        if let Some(t) = &options.text {
            if t.mode.threshold_applies() {
                match raw_text_score {
                    Some(score) if score >= t.threshold => {}
                    _ => continue,
                }
            } else if raw_text_score.is_none() {
                continue;
            }
        }
        let text_score = raw_text_score.map(|t| t * options.field_boosts.text);

        // 6. Topic boost check.
        let topic_boosted = !options.topic_filter.is_empty()
            && volume
                .topic()
                .is_some_and(|t| options.topic_filter.iter().any(|f| f == t));

        // 7. Combine.
        let combined = match options.rank_by {
            RankBy::Vector => match vector_score {
                Some(v) => v,
                None => continue,
            },
            RankBy::Text => match text_score {
                Some(t) => t,
                None => continue,
            },
            RankBy::Average => {
                let mut parts = Vec::new();
                if let Some(v) = vector_score {
                    parts.push(v);
                }
                if let Some(t) = text_score {
                    parts.push(t);
                }
                if parts.is_empty() {
                    continue;
                }
                parts.iter().sum::<f32>() / parts.len() as f32
            }
            RankBy::Multiply => match (vector_score, text_score) {
                (Some(v), Some(t)) => v * t,
                (Some(v), None) if !text_requested => v,
                (None, Some(t)) if !vector_requested => t,
                _ => continue,
            },
            RankBy::Weighted => {
                let w = &options.rank_weights;
                let metadata_boost = if options.metadata_filters.is_empty() {
                    0.0
                } else {
                    1.0
                };
                let recency = recency_score(volume.timestamp, now, options.half_life_ms);
                vector_score.unwrap_or(0.0) * w.vector
                    + text_score.unwrap_or(0.0) * w.text
                    + metadata_boost * w.metadata
                    + recency * w.recency
            }
        };

        // 8. Remaining field boosts: additive metadata/topic.
        let mut score = combined;
        if !options.metadata_filters.is_empty() {
            score += options.field_boosts.metadata;
        }
        if topic_boosted {
            score += options.field_boosts.topic;
        }

        results.push(RankedResult {
            id: volume.id.clone(),
            score,
            vector_score,
            text_score,
            topic_boosted,
        });
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(options.max_results);
    results
}

fn score_text(opts: &TextOptions, text: &str) -> f32 {
    use crate::textsearch::*;
    match opts.mode {
        TextMode::Exact => exact_match(opts.query, text).unwrap_or(0.0),
        TextMode::Substring => substring_match(opts.query, text).unwrap_or(0.0),
        TextMode::Regex => regex_match(opts.query, text, 256).unwrap_or(0.0),
        TextMode::Fuzzy => fuzzy_score(opts.query, text),
        TextMode::Token => token_score(opts.query, text),
        // BM25 needs the whole corpus; single-document scoring falls back
        // to token-mode cosine as the nearest per-document approximation.
        // `Stacks::text_search`/`advanced_search_in_stacks` use
        // `InvertedIndex::bm25` directly instead of this path when scoring
        // the full corpus.
        TextMode::Bm25 => token_score(opts.query, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn volume(id: &str, embedding: Vec<f32>, text: &str) -> Volume {
        Volume {
            id: id.to_string(),
            text: text.to_string(),
            embedding,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn vector_rank_sorts_by_cosine_descending() {
        let v1 = volume("v1", vec![1.0, 0.0, 0.0], "a");
        let v2 = volume("v2", vec![0.0, 1.0, 0.0], "b");
        let v3 = volume("v3", vec![0.9, 0.1, 0.0], "c");
        let volumes = vec![&v1, &v2, &v3];

        let mut opts = SearchOptions::default();
        let q = vec![1.0, 0.0, 0.0];
        opts.query_embedding = Some(&q);
        opts.similarity_threshold = 0.5;
        opts.max_results = 2;

        let mut cache = MagnitudeCache::new();
        let results = advanced_search(&volumes, &opts, &mut cache, Utc::now());

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "v1");
        assert_eq!(results[1].id, "v3");
        assert!((results[0].score - 1.0).abs() < 1e-4);
        assert!((results[1].score - 0.9939).abs() < 1e-3);
    }

    #[test]
    fn results_below_threshold_are_excluded() {
        let v1 = volume("v1", vec![1.0, 0.0], "a");
        let v2 = volume("v2", vec![-1.0, 0.0], "b");
        let volumes = vec![&v1, &v2];

        let mut opts = SearchOptions::default();
        let q = vec![1.0, 0.0];
        opts.query_embedding = Some(&q);
        opts.similarity_threshold = 0.5;

        let mut cache = MagnitudeCache::new();
        let results = advanced_search(&volumes, &opts, &mut cache, Utc::now());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "v1");
    }

    #[test]
    fn date_range_is_inclusive() {
        let mut v1 = volume("v1", vec![1.0], "a");
        v1.timestamp = Utc.timestamp_opt(1000, 0).unwrap();
        let volumes = vec![&v1];

        let mut opts = SearchOptions::default();
        opts.date_range = Some((
            Utc.timestamp_opt(1000, 0).unwrap(),
            Utc.timestamp_opt(2000, 0).unwrap(),
        ));
        opts.rank_by = RankBy::Average;
        let mut cache = MagnitudeCache::new();
        // With no vector/text requested, Average with nothing present
        // returns no results (handled by `parts.is_empty()` continue) --
        // attach a text query so there's something to rank by.
        let topts = TextOptions {
            query: "a",
            mode: TextMode::Exact,
            threshold: 0.0,
        };
        opts.text = Some(topts);
        let results = advanced_search(&volumes, &opts, &mut cache, Utc::now());
        assert_eq!(results.len(), 1);
    }
}
