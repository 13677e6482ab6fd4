//! # Library Engine
//!
//! An embeddable vector + text search and knowledge-store subsystem for
//! hosts that already own their own embedding model and LLM access. The
//! crate never calls out to the network itself: callers supply embeddings
//! on `add`/`search`, and the librarian (C13) is driven through a
//! host-supplied [`librarian::LlmBackend`].
//!
//! ## Architecture
//!
//! - [`storage`] (C1): durable key -> bytes backend (file or in-memory).
//! - [`codec`] (C2): embedding quantization and snapshot encode/decode.
//! - [`volume`]: the atomic `Volume`/`AccessStats` data model (C3 data, C6 stats).
//! - [`index`] (C4, C5): inverted index, metadata index, topic catalog.
//! - [`textsearch`] (C7): exact/substring/regex/fuzzy/token/BM25 text modes.
//! - [`search`] (C8): weighted vector + text ranking.
//! - [`similarity`]: cosine similarity and the magnitude cache.
//! - [`dedup`] (C9): near-duplicate detection on insert and on demand.
//! - [`recommend`]: vector/recency/frequency recommendation scoring.
//! - [`learning`] (C10): adaptive weight/interest learning from query history.
//! - [`cache`] (C11): bounded LRU text cache.
//! - [`stacks`] (C12): the coordinating store every public operation goes through.
//! - [`librarian`] (C13): contract-only extract/summarize/classify/reorganize façade.
//! - [`circulation`] (C14): the background queue that batches librarian work.
//! - [`glob`]: shared glob matching used by topic filtering.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::collections::HashMap;
//! use library_engine::config::StacksConfig;
//! use library_engine::storage::InMemoryBackend;
//! use library_engine::stacks::Stacks;
//!
//! # async fn run() -> library_engine::error::Result<()> {
//! let stacks = Stacks::new(Arc::new(InMemoryBackend::new()), StacksConfig::default());
//! stacks.load().await?;
//!
//! let id = stacks.add("hello world".to_string(), vec![1.0, 0.0], HashMap::new()).await?;
//! let results = stacks.search(&[1.0, 0.0], 5, 0.0).await?;
//! assert_eq!(results[0].id, id);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod cache;
pub mod circulation;
pub mod codec;
pub mod config;
pub mod dedup;
pub mod error;
pub mod glob;
pub mod index;
pub mod librarian;
pub mod recommend;
pub mod search;
pub mod similarity;
pub mod stacks;
pub mod storage;
pub mod textsearch;
pub mod volume;

#[cfg(feature = "learning")]
#[cfg_attr(docsrs, doc(cfg(feature = "learning")))]
pub mod learning;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use error::{ErrorCode, LibraryError, Result};

pub use volume::{AccessStats, Volume};

pub use config::{
    DuplicateBehavior, LearningConfig, RecencyConfig, StacksConfig, TextCacheConfig,
    TopicIndexConfig,
};

pub use stacks::Stacks;

pub use search::{FieldBoosts, RankBy, RankWeights, RankedResult, SearchOptions, TextOptions};

pub use textsearch::TextMode;

pub use dedup::{DuplicateCheck, DuplicateGroup};

pub use recommend::{Recommendation, RecommendOptions, RecommendWeights};

pub use storage::{FileBackend, InMemoryBackend, StorageBackend};

pub use index::{FilterMode, InvertedIndex, MetadataFilter, MetadataIndex, TopicCatalog};

pub use librarian::{
    ClassifyResult, EntryType, ExtractResult, ExtractedMemory, Librarian, LlmBackend,
    ReorganizeResult, SummarizeResult, TopicMerge, TopicMove,
};

pub use circulation::{Circulation, Job, JobHandler};

#[cfg(feature = "learning")]
pub use learning::{ExplicitFeedback, Feedback, LearningEngine, LearningParams};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// PRELUDE
// ============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::{
        DuplicateBehavior, ErrorCode, LibraryError, RankBy, RankedResult, Recommendation,
        RecommendOptions, Result, SearchOptions, Stacks, StacksConfig, TextMode, Volume,
    };

    pub use crate::storage::{FileBackend, InMemoryBackend, StorageBackend};

    pub use crate::librarian::{Librarian, LlmBackend};
    pub use crate::circulation::{Circulation, Job, JobHandler};

    #[cfg(feature = "learning")]
    pub use crate::learning::LearningEngine;
}
