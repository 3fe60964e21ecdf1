//! Schema catalog errors

use thiserror::Error;

/// Errors raised by a [`SchemaCatalog`](super::SchemaCatalog)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("class '{0}' not found")]
    ClassNotFound(String),

    #[error("class '{0}' already exists")]
    ClassExists(String),

    #[error("property '{class}.{property}' not found")]
    PropertyNotFound { class: String, property: String },

    #[error("property '{class}.{property}' already exists")]
    PropertyExists { class: String, property: String },

    #[error("class '{class}' has subclasses: {subclasses}")]
    HasSubclasses { class: String, subclasses: String },

    #[error("validation failed for '{class}.{property}': {reason}")]
    Validation {
        class: String,
        property: String,
        reason: String,
    },

    #[error("schema lock poisoned")]
    LockPoisoned,
}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
