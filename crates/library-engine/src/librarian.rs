//! Librarian (C13) — contract only.
//!
//! Wraps an external text generator behind four strictly-shaped JSON
//! operations. The core never interprets volume content; this module is a
//! façade that turns LLM prose into the serde shapes the rest of the crate
//! can act on, and is defensive about the one thing an LLM can't be trusted
//! to do reliably: emit valid JSON. A parse failure or missing field never
//! propagates as an error — each operation degrades to its documented empty
//! result instead.

use serde::{Deserialize, Serialize};

use crate::volume::Volume;

/// The kind of thing `extract` pulled out of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Fact,
    Decision,
    Observation,
}

/// One candidate memory surfaced by `extract`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedMemory {
    pub text: String,
    pub topic: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub entry_type: EntryType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResult {
    pub memories: Vec<ExtractedMemory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResult {
    pub text: String,
    pub source_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResult {
    pub topic: String,
    pub confidence: f32,
}

impl ClassifyResult {
    fn uncategorized() -> Self {
        Self {
            topic: "uncategorized".to_string(),
            confidence: 0.0,
        }
    }
}

/// A single volume's topic reassignment proposed by `reorganize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMove {
    pub id: String,
    pub from_topic: String,
    pub to_topic: String,
}

/// A proposed merge of several volumes into one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMerge {
    pub ids: Vec<String>,
    pub into_topic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorganizeResult {
    #[serde(default)]
    pub moves: Vec<TopicMove>,
    #[serde(default)]
    pub new_subtopics: Vec<String>,
    #[serde(default)]
    pub merges: Vec<TopicMerge>,
}

/// The external text generator the librarian drives. Hosts supply their own
/// implementation (an LLM API client); this crate only depends on the
/// prompt-in, text-out contract.
pub trait LlmBackend: Send + Sync {
    /// Send `prompt` to the model and return its raw completion text.
    /// Errors here are treated as "the librarian step produced nothing" by
    /// every caller in this module — they never propagate as a
    /// [`crate::error::LibraryError`].
    fn complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, String>> + Send;
}

/// The four librarian operations, each a thin prompt-and-parse wrapper
/// around a [`LlmBackend`].
pub struct Librarian<B: LlmBackend> {
    backend: B,
}

impl<B: LlmBackend> Librarian<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Pull candidate memories out of a conversation turn. Returns an empty
    /// result on any backend failure, non-JSON response, or response
    /// missing required fields — extraction is best-effort by design.
    pub async fn extract(&self, turn: &str) -> ExtractResult {
        let prompt = format!(
            "Extract durable facts, decisions, and observations from this \
             conversation turn as JSON matching \
             {{\"memories\":[{{\"text\":string,\"topic\":string,\"tags\":[string],\
             \"entryType\":\"fact\"|\"decision\"|\"observation\"}}]}}.\n\nTurn:\n{turn}"
        );
        match self.backend.complete(&prompt).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => ExtractResult::default(),
        }
    }

    /// Summarize a set of volumes under a topic. Returns an empty summary
    /// with no source ids on failure.
    pub async fn summarize(&self, volumes: &[Volume], topic: &str) -> SummarizeResult {
        let source_ids: Vec<String> = volumes.iter().map(|v| v.id.clone()).collect();
        let body = volumes
            .iter()
            .map(|v| format!("- {}", v.text))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Summarize these volumes under topic \"{topic}\" as JSON matching \
             {{\"text\":string,\"sourceIds\":[string]}}. The sourceIds must be \
             exactly {source_ids:?}.\n\n{body}"
        );
        match self.backend.complete(&prompt).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or(SummarizeResult {
                text: String::new(),
                source_ids: Vec::new(),
            }),
            Err(_) => SummarizeResult {
                text: String::new(),
                source_ids: Vec::new(),
            },
        }
    }

    /// Classify free text against a set of existing topics. Falls back to
    /// `{"uncategorized", 0}` on any failure, per the documented contract.
    pub async fn classify_topic(&self, text: &str, existing_topics: &[String]) -> ClassifyResult {
        let prompt = format!(
            "Classify this text into one of the existing topics, or propose a \
             new one, as JSON matching {{\"topic\":string,\"confidence\":number \
             in [0,1]}}. Existing topics: {existing_topics:?}.\n\nText:\n{text}"
        );
        match self.backend.complete(&prompt).await {
            Ok(raw) => serde_json::from_str::<ClassifyResult>(&raw)
                .map(|mut r| {
                    r.confidence = r.confidence.clamp(0.0, 1.0);
                    r
                })
                .unwrap_or_else(|_| ClassifyResult::uncategorized()),
            Err(_) => ClassifyResult::uncategorized(),
        }
    }

    /// Propose a reorganization of the volumes filed under `topic`. Returns
    /// an empty plan (no moves, no subtopics, no merges) on failure.
    pub async fn reorganize(&self, topic: &str, volumes: &[Volume]) -> ReorganizeResult {
        let ids: Vec<&str> = volumes.iter().map(|v| v.id.as_str()).collect();
        let prompt = format!(
            "Propose a reorganization of topic \"{topic}\" as JSON matching \
             {{\"moves\":[{{\"id\":string,\"fromTopic\":string,\"toTopic\":string}}],\
             \"newSubtopics\":[string],\
             \"merges\":[{{\"ids\":[string],\"intoTopic\":string}}]}}. \
             Candidate ids: {ids:?}."
        );
        match self.backend.complete(&prompt).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => ReorganizeResult::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        response: String,
    }

    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, String> {
            Ok(self.response.clone())
        }
    }

    struct FailingBackend;

    impl LlmBackend for FailingBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, String> {
            Err("backend unavailable".to_string())
        }
    }

    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl LlmBackend for CountingBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("not json".to_string())
        }
    }

    #[tokio::test]
    async fn extract_parses_well_formed_response() {
        let librarian = Librarian::new(ScriptedBackend {
            response: r#"{"memories":[{"text":"uses postgres","topic":"infra","tags":["db"],"entryType":"fact"}]}"#.to_string(),
        });
        let result = librarian.extract("we use postgres for storage").await;
        assert_eq!(result.memories.len(), 1);
        assert_eq!(result.memories[0].topic, "infra");
        assert_eq!(result.memories[0].entry_type, EntryType::Fact);
    }

    #[tokio::test]
    async fn extract_returns_empty_on_malformed_json() {
        let librarian = Librarian::new(ScriptedBackend {
            response: "not json at all".to_string(),
        });
        let result = librarian.extract("anything").await;
        assert!(result.memories.is_empty());
    }

    #[tokio::test]
    async fn extract_returns_empty_on_backend_failure() {
        let librarian = Librarian::new(FailingBackend);
        let result = librarian.extract("anything").await;
        assert!(result.memories.is_empty());
    }

    #[tokio::test]
    async fn classify_topic_falls_back_to_uncategorized() {
        let librarian = Librarian::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let result = librarian.classify_topic("some text", &[]).await;
        assert_eq!(result.topic, "uncategorized");
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn classify_topic_clamps_confidence() {
        let librarian = Librarian::new(ScriptedBackend {
            response: r#"{"topic":"rust","confidence":1.7}"#.to_string(),
        });
        let result = librarian.classify_topic("fn main", &["rust".to_string()]).await;
        assert_eq!(result.topic, "rust");
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn summarize_returns_empty_on_failure() {
        let librarian = Librarian::new(FailingBackend);
        let volumes = vec![Volume::new("a".into(), vec![1.0], HashMap::new())];
        let result = librarian.summarize(&volumes, "topic").await;
        assert!(result.text.is_empty());
        assert!(result.source_ids.is_empty());
    }

    #[tokio::test]
    async fn reorganize_parses_well_formed_response() {
        let librarian = Librarian::new(ScriptedBackend {
            response: r#"{"moves":[{"id":"a","fromTopic":"x","toTopic":"x/y"}],"newSubtopics":["x/y"],"merges":[]}"#.to_string(),
        });
        let volumes = vec![Volume::new("a".into(), vec![1.0], HashMap::new())];
        let result = librarian.reorganize("x", &volumes).await;
        assert_eq!(result.moves.len(), 1);
        assert_eq!(result.new_subtopics, vec!["x/y".to_string()]);
        assert!(result.merges.is_empty());
    }

    #[tokio::test]
    async fn reorganize_returns_empty_plan_on_malformed_json() {
        let librarian = Librarian::new(CountingBackend {
            calls: AtomicUsize::new(0),
        });
        let volumes: Vec<Volume> = Vec::new();
        let result = librarian.reorganize("x", &volumes).await;
        assert!(result.moves.is_empty());
        assert!(result.new_subtopics.is_empty());
        assert!(result.merges.is_empty());
    }
}
