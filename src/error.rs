//! Crate-level error
//!
//! Wraps the subsystem errors. [`Error::kind`] reports the category a
//! caller can act on; it always follows the subsystem code of the error
//! that was raised.

use thiserror::Error;

use crate::database::DatabaseError;
use crate::executor::{ExecutorError, ExecutorErrorCode};
use crate::planner::{PlannerError, PlannerErrorCode};

/// What went wrong, independent of the subsystem that noticed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid statement, missing target or a command that cannot run
    CommandExecution,
    Timeout,
    /// An in-memory operation exceeded `max_heap_elements_per_operation`
    ResourceLimit,
    TypeConversion,
    NoSuchElement,
    Storage,
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::CommandExecution => "command_execution",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ResourceLimit => "resource_limit",
            ErrorKind::TypeConversion => "type_conversion",
            ErrorKind::NoSuchElement => "no_such_element",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Planner(#[from] PlannerError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Planner(err) => match err.code() {
                PlannerErrorCode::VqlCatalogFailure => ErrorKind::Storage,
                _ => ErrorKind::CommandExecution,
            },
            Error::Executor(err) => executor_kind(err.code()),
            Error::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Stable code of the underlying error, e.g. `VQL_TIMEOUT`
    pub fn code(&self) -> &'static str {
        match self {
            Error::Planner(err) => err.code().code(),
            Error::Executor(err) => err.code().code(),
            Error::Configuration(_) => "VQL_CONFIGURATION",
        }
    }
}

fn executor_kind(code: ExecutorErrorCode) -> ErrorKind {
    match code {
        ExecutorErrorCode::VqlCommandExecution => ErrorKind::CommandExecution,
        ExecutorErrorCode::VqlTimeout => ErrorKind::Timeout,
        ExecutorErrorCode::VqlResourceLimit => ErrorKind::ResourceLimit,
        ExecutorErrorCode::VqlTypeConversion => ErrorKind::TypeConversion,
        ExecutorErrorCode::VqlNoSuchElement => ErrorKind::NoSuchElement,
        ExecutorErrorCode::VqlStorageFailure => ErrorKind::Storage,
    }
}

/// Catalog and storage failures keep the kind the executor assigns them
impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Executor(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_kind_preserved() {
        let err: Error = ExecutorError::timeout("too slow").into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.code(), "VQL_TIMEOUT");

        let err: Error = ExecutorError::resource_limit("too many rows").into();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
    }

    #[test]
    fn test_planner_errors_are_command_errors() {
        let err: Error = PlannerError::unknown_class("Nope").into();
        assert_eq!(err.kind(), ErrorKind::CommandExecution);
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn test_configuration_kind() {
        let err: Error = DatabaseError::TransactionInactive.into();
        assert_eq!(err.kind(), ErrorKind::CommandExecution);

        let err = Error::configuration("bad value");
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "configuration error: bad value");
    }
}
