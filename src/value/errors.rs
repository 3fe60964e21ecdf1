//! Value conversion and arithmetic errors

use thiserror::Error;

/// Errors raised while converting or combining values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// A value could not be converted to the requested type
    #[error("cannot convert {value} to {target}")]
    Conversion { value: String, target: String },

    /// An arithmetic operator was applied to unsupported operands
    #[error("operator {op} not applicable to {left} and {right}")]
    Operator {
        op: String,
        left: String,
        right: String,
    },

    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,
}

impl ValueError {
    pub(crate) fn conversion(value: &super::Value, target: impl Into<String>) -> Self {
        ValueError::Conversion {
            value: value.to_string(),
            target: target.into(),
        }
    }
}

/// Result type for value operations
pub type ValueResult<T> = Result<T, ValueError>;
