//! Storage adapter errors

use thiserror::Error;

use super::record::RecordId;

/// Errors raised by a [`RecordStore`](super::RecordStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    #[error("cluster {0} not found")]
    ClusterNotFound(String),

    #[error("cluster '{0}' already exists")]
    ClusterExists(String),

    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
