//! Storage Backend (C1)
//!
//! A durable key -> bytes map with atomic `save`, `load`, `close`,
//! polymorphic over the capability set `{write, read, close}` per the
//! design notes (spec §9). The trait itself is synchronous — following the
//! teacher's own `Storage` (all methods take `&self`, no internal async),
//! which lets the async coordinator (`stacks::Stacks`) own the only
//! suspension points by running backend calls through
//! `tokio::task::spawn_blocking`, exactly where the spec says I/O may
//! suspend.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;

use std::collections::HashMap;

/// Storage backend error type.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// A durable mapping from opaque string keys to opaque byte blobs.
///
/// Implementations must make `save` crash-safe: on any failure the prior
/// persisted state (if any) must remain intact, never a partial write.
pub trait StorageBackend: Send + Sync {
    /// Load the full persisted map. An empty map is returned if nothing has
    /// ever been saved.
    fn load(&self) -> Result<HashMap<String, Vec<u8>>>;

    /// Persist the full map, replacing whatever was there before.
    fn save(&self, map: &HashMap<String, Vec<u8>>) -> Result<()>;

    /// Release any resources (file handles, temp files) held by the backend.
    fn close(&self) -> Result<()>;
}
