//! Error types for branch operations.

use dbv_types::ContentHash;
use thiserror::Error;

use crate::branch::BranchStatus;

/// Errors that can occur during branch operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RefError {
    #[error("branch not found: {name}")]
    NotFound { name: String },

    #[error("branch already exists: {name}")]
    AlreadyExists { name: String },

    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// The branch head moved since the caller read it.
    #[error("head of {name} moved: expected {expected:?}, found {actual:?}")]
    HeadMoved {
        name: String,
        expected: Option<ContentHash>,
        actual: Option<ContentHash>,
    },

    #[error("invalid status transition for {name}: {from} -> {to}")]
    InvalidTransition {
        name: String,
        from: BranchStatus,
        to: BranchStatus,
    },

    /// Commits can only be added to active branches.
    #[error("branch {name} is {status} and cannot be written")]
    NotWritable { name: String, status: BranchStatus },
}

/// Convenience alias for branch results.
pub type RefResult<T> = Result<T, RefError>;
