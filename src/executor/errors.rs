//! Executor error types
//!
//! Error codes:
//! - VQL_COMMAND_EXECUTION (ERROR)
//! - VQL_TIMEOUT (ERROR)
//! - VQL_RESOURCE_LIMIT (ERROR)
//! - VQL_TYPE_CONVERSION (ERROR)
//! - VQL_NO_SUCH_ELEMENT (ERROR)
//! - VQL_STORAGE_FAILURE (FATAL)

use std::fmt;

use crate::database::{DatabaseError, MetadataError};
use crate::index::IndexError;
use crate::schema::SchemaError;
use crate::storage::StorageError;
use crate::value::ValueError;

/// Severity levels for executor errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The statement failed; the database is healthy
    Error,
    /// An adapter reported a failure the statement cannot recover from
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Executor-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorErrorCode {
    /// A command could not be carried out (missing target, bad state)
    VqlCommandExecution,
    /// The statement or transaction deadline passed
    VqlTimeout,
    /// An in-memory operation exceeded its element cap
    VqlResourceLimit,
    /// A value could not be converted to the required type
    VqlTypeConversion,
    /// `next()` called on an exhausted stream
    VqlNoSuchElement,
    /// Storage adapter failure
    VqlStorageFailure,
}

impl ExecutorErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutorErrorCode::VqlCommandExecution => "VQL_COMMAND_EXECUTION",
            ExecutorErrorCode::VqlTimeout => "VQL_TIMEOUT",
            ExecutorErrorCode::VqlResourceLimit => "VQL_RESOURCE_LIMIT",
            ExecutorErrorCode::VqlTypeConversion => "VQL_TYPE_CONVERSION",
            ExecutorErrorCode::VqlNoSuchElement => "VQL_NO_SUCH_ELEMENT",
            ExecutorErrorCode::VqlStorageFailure => "VQL_STORAGE_FAILURE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ExecutorErrorCode::VqlStorageFailure => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ExecutorErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Executor error with its code and message
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorError {
    code: ExecutorErrorCode,
    message: String,
}

impl ExecutorError {
    pub fn new(code: ExecutorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn command(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::VqlCommandExecution, reason)
    }

    pub fn timeout(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::VqlTimeout, reason)
    }

    pub fn resource_limit(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::VqlResourceLimit, reason)
    }

    pub fn type_conversion(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::VqlTypeConversion, reason)
    }

    pub fn no_such_element() -> Self {
        Self::new(
            ExecutorErrorCode::VqlNoSuchElement,
            "next() called on an exhausted stream",
        )
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        Self::new(ExecutorErrorCode::VqlStorageFailure, reason)
    }

    pub fn code(&self) -> ExecutorErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for ExecutorError {}

impl From<ValueError> for ExecutorError {
    fn from(err: ValueError) -> Self {
        match err {
            ValueError::Conversion { .. } => Self::type_conversion(err.to_string()),
            other => Self::command(other.to_string()),
        }
    }
}

impl From<StorageError> for ExecutorError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::RecordNotFound(_)
            | StorageError::ClusterNotFound(_)
            | StorageError::ClusterExists(_) => Self::command(err.to_string()),
            other => Self::storage(other.to_string()),
        }
    }
}

impl From<IndexError> for ExecutorError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::KeyConversion { .. } => Self::type_conversion(err.to_string()),
            IndexError::LockPoisoned => Self::storage(err.to_string()),
            other => Self::command(other.to_string()),
        }
    }
}

impl From<SchemaError> for ExecutorError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation { .. } => Self::type_conversion(err.to_string()),
            SchemaError::LockPoisoned => Self::storage(err.to_string()),
            other => Self::command(other.to_string()),
        }
    }
}

impl From<MetadataError> for ExecutorError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::LockPoisoned => Self::storage(err.to_string()),
            other => Self::command(other.to_string()),
        }
    }
}

impl From<DatabaseError> for ExecutorError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Storage(e) => e.into(),
            DatabaseError::Schema(e) => e.into(),
            DatabaseError::Index(e) => e.into(),
            DatabaseError::Metadata(e) => e.into(),
            other => Self::command(other.to_string()),
        }
    }
}

/// Result type for executor operations
pub type ExecResult<T> = Result<T, ExecutorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RecordId;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ExecutorErrorCode::VqlCommandExecution.code(),
            "VQL_COMMAND_EXECUTION"
        );
        assert_eq!(ExecutorErrorCode::VqlTimeout.code(), "VQL_TIMEOUT");
        assert_eq!(
            ExecutorErrorCode::VqlResourceLimit.code(),
            "VQL_RESOURCE_LIMIT"
        );
    }

    #[test]
    fn test_storage_failure_is_fatal() {
        let err = ExecutorError::from(StorageError::LockPoisoned);
        assert!(err.is_fatal());
        assert!(!ExecutorError::timeout("late").is_fatal());
    }

    #[test]
    fn test_conversions_keep_kind() {
        let err: ExecutorError = DatabaseError::Index(IndexError::KeyConversion {
            index: "T.a".into(),
            reason: "bad".into(),
        })
        .into();
        assert_eq!(err.code(), ExecutorErrorCode::VqlTypeConversion);

        let err: ExecutorError = DatabaseError::RecordNotFound(RecordId::new(3, 1)).into();
        assert_eq!(err.code(), ExecutorErrorCode::VqlCommandExecution);
    }

    #[test]
    fn test_error_display() {
        let err = ExecutorError::resource_limit("too many rows");
        assert_eq!(
            err.to_string(),
            "[ERROR] VQL_RESOURCE_LIMIT: too many rows"
        );
    }
}
