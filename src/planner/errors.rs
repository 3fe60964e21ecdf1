//! Planner error types
//!
//! Error codes:
//! - VQL_QUERY_INVALID (REJECT)
//! - VQL_UNKNOWN_CLASS (REJECT)
//! - VQL_UNKNOWN_INDEX (REJECT)
//! - VQL_UNKNOWN_CLUSTER (REJECT)
//! - VQL_TARGET_NOT_ALLOWED (REJECT)
//! - VQL_CLASS_TYPE_MISMATCH (REJECT)
//! - VQL_INVALID_AGGREGATE (REJECT)
//! - VQL_CATALOG_FAILURE (FATAL)

use std::fmt;

use crate::database::DatabaseError;
use crate::executor::{ExecutorError, ExecutorErrorCode};
use crate::index::IndexError;
use crate::schema::SchemaError;
use crate::storage::StorageError;

/// Severity levels for planner errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Statement rejected, nothing was executed
    Reject,
    /// The catalog could not be read
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerErrorCode {
    /// Malformed or contradictory statement
    VqlQueryInvalid,
    VqlUnknownClass,
    VqlUnknownIndex,
    VqlUnknownCluster,
    /// `FROM index:` while manual index targets are disabled
    VqlTargetNotAllowed,
    /// Target is not of the class the statement requires (`DELETE VERTEX`
    /// on a non-vertex, plain `DELETE` on vertices or edges)
    VqlClassTypeMismatch,
    /// Aggregate used where it cannot be evaluated
    VqlInvalidAggregate,
    VqlCatalogFailure,
}

impl PlannerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            PlannerErrorCode::VqlQueryInvalid => "VQL_QUERY_INVALID",
            PlannerErrorCode::VqlUnknownClass => "VQL_UNKNOWN_CLASS",
            PlannerErrorCode::VqlUnknownIndex => "VQL_UNKNOWN_INDEX",
            PlannerErrorCode::VqlUnknownCluster => "VQL_UNKNOWN_CLUSTER",
            PlannerErrorCode::VqlTargetNotAllowed => "VQL_TARGET_NOT_ALLOWED",
            PlannerErrorCode::VqlClassTypeMismatch => "VQL_CLASS_TYPE_MISMATCH",
            PlannerErrorCode::VqlInvalidAggregate => "VQL_INVALID_AGGREGATE",
            PlannerErrorCode::VqlCatalogFailure => "VQL_CATALOG_FAILURE",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            PlannerErrorCode::VqlCatalogFailure => Severity::Fatal,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for PlannerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Planner error type with full context
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerError {
    code: PlannerErrorCode,
    message: String,
}

impl PlannerError {
    pub fn new(code: PlannerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn query_invalid(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::VqlQueryInvalid, reason)
    }

    pub fn unknown_class(class: &str) -> Self {
        Self::new(
            PlannerErrorCode::VqlUnknownClass,
            format!("class '{}' not found", class),
        )
    }

    pub fn unknown_index(index: &str) -> Self {
        Self::new(
            PlannerErrorCode::VqlUnknownIndex,
            format!("index '{}' not found", index),
        )
    }

    pub fn unknown_cluster(cluster: impl fmt::Display) -> Self {
        Self::new(
            PlannerErrorCode::VqlUnknownCluster,
            format!("cluster '{}' not found", cluster),
        )
    }

    pub fn target_not_allowed(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::VqlTargetNotAllowed, reason)
    }

    pub fn class_type_mismatch(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::VqlClassTypeMismatch, reason)
    }

    pub fn invalid_aggregate(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::VqlInvalidAggregate, reason)
    }

    pub fn catalog(reason: impl Into<String>) -> Self {
        Self::new(PlannerErrorCode::VqlCatalogFailure, reason)
    }

    pub fn code(&self) -> PlannerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PlannerError {
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

impl std::error::Error for PlannerError {}

impl From<SchemaError> for PlannerError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::ClassNotFound(class) => Self::unknown_class(&class),
            SchemaError::LockPoisoned => Self::catalog(err.to_string()),
            other => Self::query_invalid(other.to_string()),
        }
    }
}

impl From<IndexError> for PlannerError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotFound(name) => Self::unknown_index(&name),
            IndexError::LockPoisoned => Self::catalog(err.to_string()),
            other => Self::query_invalid(other.to_string()),
        }
    }
}

impl From<StorageError> for PlannerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ClusterNotFound(cluster) => Self::unknown_cluster(cluster),
            other => Self::catalog(other.to_string()),
        }
    }
}

impl From<DatabaseError> for PlannerError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Schema(e) => e.into(),
            DatabaseError::Index(e) => e.into(),
            DatabaseError::Storage(e) => e.into(),
            other => Self::query_invalid(other.to_string()),
        }
    }
}

/// Planning failures surfacing while a plan runs (subqueries) keep their
/// fatal/non-fatal split
impl From<PlannerError> for ExecutorError {
    fn from(err: PlannerError) -> Self {
        let code = match err.severity() {
            Severity::Fatal => ExecutorErrorCode::VqlStorageFailure,
            Severity::Reject => ExecutorErrorCode::VqlCommandExecution,
        };
        ExecutorError::new(code, err.to_string())
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PlannerErrorCode::VqlQueryInvalid.code(), "VQL_QUERY_INVALID");
        assert_eq!(PlannerErrorCode::VqlUnknownIndex.code(), "VQL_UNKNOWN_INDEX");
        assert_eq!(
            PlannerErrorCode::VqlClassTypeMismatch.code(),
            "VQL_CLASS_TYPE_MISMATCH"
        );
        assert_eq!(PlannerErrorCode::VqlCatalogFailure.severity(), Severity::Fatal);
    }

    #[test]
    fn test_error_display() {
        let err = PlannerError::unknown_class("Person");
        assert_eq!(
            err.to_string(),
            "[REJECT] VQL_UNKNOWN_CLASS: class 'Person' not found"
        );
    }

    #[test]
    fn test_schema_error_conversion() {
        let err: PlannerError = SchemaError::ClassNotFound("Foo".into()).into();
        assert_eq!(err.code(), PlannerErrorCode::VqlUnknownClass);
    }

    #[test]
    fn test_into_executor_error() {
        let err: ExecutorError = PlannerError::unknown_index("x").into();
        assert_eq!(err.code(), ExecutorErrorCode::VqlCommandExecution);
        assert!(err.message().contains("VQL_UNKNOWN_INDEX"));
    }
}
