//! Crate-wide error taxonomy
//!
//! One `thiserror` enum per the kinds enumerated in the spec: input-invalid,
//! duplicate, not-loaded, storage I/O, corruption, and the retry helper's
//! exhaustion case. Submodules with their own narrower error type convert
//! into this one via `#[from]` at the Stacks boundary.

use std::fmt;

/// Stable error codes surfaced to callers, matching the documented contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    StacksNotLoaded,
    StacksEmptyText,
    StacksEmptyEmbedding,
    StacksDuplicate,
    StacksCorrupt,
    StacksIo,
    LibraryError,
    EmbeddingError,
    RetryExhausted,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::StacksNotLoaded => "STACKS_NOT_LOADED",
            ErrorCode::StacksEmptyText => "STACKS_EMPTY_TEXT",
            ErrorCode::StacksEmptyEmbedding => "STACKS_EMPTY_EMBEDDING",
            ErrorCode::StacksDuplicate => "STACKS_DUPLICATE",
            ErrorCode::StacksCorrupt => "STACKS_CORRUPT",
            ErrorCode::StacksIo => "STACKS_IO",
            ErrorCode::LibraryError => "LIBRARY_ERROR",
            ErrorCode::EmbeddingError => "EMBEDDING_ERROR",
            ErrorCode::RetryExhausted => "RETRY_EXHAUSTED",
        };
        write!(f, "{s}")
    }
}

/// The crate's single error type.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// A public operation was called before `load` completed.
    #[error("stacks not loaded")]
    NotLoaded,

    /// `add`/`addBatch` was given empty text.
    #[error("volume text must not be empty")]
    EmptyText,

    /// `add`/`addBatch` was given an empty embedding.
    #[error("volume embedding must not be empty")]
    EmptyEmbedding,

    /// Insert rejected by `duplicateBehavior: error`.
    #[error("duplicate of existing volume {existing_id}")]
    Duplicate { existing_id: String },

    /// No volume exists with the given id.
    #[error("no volume with id {0}")]
    NotFound(String),

    /// The persisted snapshot could not be parsed at all (catastrophic).
    #[error("stacks snapshot is corrupt: {0}")]
    Corrupt(String),

    /// Storage backend I/O failure (after retry, where applicable).
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Regex pattern rejected (too long, or fails to compile).
    #[error("invalid regex pattern: {0}")]
    InvalidRegex(String),

    /// The retry helper exhausted its attempts.
    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// Escape hatch for errors that don't fit another variant.
    #[error("{0}")]
    Other(String),
}

impl LibraryError {
    /// The stable code callers can match on.
    pub fn code(&self) -> ErrorCode {
        match self {
            LibraryError::NotLoaded => ErrorCode::StacksNotLoaded,
            LibraryError::EmptyText => ErrorCode::StacksEmptyText,
            LibraryError::EmptyEmbedding => ErrorCode::StacksEmptyEmbedding,
            LibraryError::Duplicate { .. } => ErrorCode::StacksDuplicate,
            LibraryError::NotFound(_) => ErrorCode::LibraryError,
            LibraryError::Corrupt(_) => ErrorCode::StacksCorrupt,
            LibraryError::Io(_) => ErrorCode::StacksIo,
            LibraryError::InvalidRegex(_) => ErrorCode::LibraryError,
            LibraryError::RetryExhausted { .. } => ErrorCode::RetryExhausted,
            LibraryError::Other(_) => ErrorCode::LibraryError,
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LibraryError>;
