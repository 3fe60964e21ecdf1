//! Index catalog errors

use thiserror::Error;

use crate::storage::RecordId;

/// Errors raised by an [`IndexCatalog`](super::IndexCatalog)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("index '{0}' not found")]
    NotFound(String),

    #[error("index '{0}' already exists")]
    Exists(String),

    #[error("duplicate key {key} in unique index '{index}' (already held by {existing})")]
    DuplicateKey {
        index: String,
        key: String,
        existing: RecordId,
    },

    #[error("index '{0}' does not support range iteration")]
    RangeNotSupported(String),

    #[error("hash index '{index}' requires all {expected} key fields, got {actual}")]
    PartialHashKey {
        index: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot build key for index '{index}': {reason}")]
    KeyConversion { index: String, reason: String },

    #[error("index lock poisoned")]
    LockPoisoned,
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;
