//! Database facade errors

use thiserror::Error;

use crate::index::IndexError;
use crate::schema::SchemaError;
use crate::storage::{RecordId, StorageError};

use super::metadata::MetadataError;

/// Errors raised by [`DatabaseSession`](super::DatabaseSession) operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("transaction is not active")]
    TransactionInactive,

    #[error("class '{0}' is abstract and cannot hold records")]
    AbstractClass(String),

    #[error("cluster {cluster} does not belong to class '{class}'")]
    ClusterMismatch { cluster: u32, class: String },

    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    #[error("invalid fixture: {0}")]
    Fixture(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
