//! Error types for the commit graph.

use dbv_types::ContentHash;

/// Errors that can occur during commit graph operations.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced commit was not found in the graph.
    #[error("commit not found: {0}")]
    CommitNotFound(ContentHash),

    /// A parent reference points to a commit that does not exist.
    #[error("dangling parent reference: commit {commit} references missing parent {parent}")]
    DanglingParent {
        commit: ContentHash,
        parent: ContentHash,
    },

    /// A commit's stored hash does not match its content.
    #[error("hash mismatch for commit {expected}: computed {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },

    /// A commit is timestamped before one of its parents.
    #[error("temporal ordering violation: commit {child} is before parent {parent}")]
    TemporalViolation {
        child: ContentHash,
        parent: ContentHash,
    },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for commit graph results.
pub type DagResult<T> = Result<T, DagError>;
