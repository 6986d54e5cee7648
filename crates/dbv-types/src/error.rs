use thiserror::Error;

/// Errors produced while constructing or parsing foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid semantic version: {0:?}")]
    InvalidVersion(String),

    #[error("unknown object type: {0:?}")]
    UnknownObjectType(String),

    #[error("unknown {field} value: {value:?}")]
    UnknownVariant { field: &'static str, value: String },

    #[error("invalid identifier for {field}: {reason}")]
    InvalidIdentifier { field: &'static str, reason: String },
}
