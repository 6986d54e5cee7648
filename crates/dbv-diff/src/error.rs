//! Error types for the diff crate.

use dbv_types::ContentHash;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A tree referenced during the diff was not found in the store.
    #[error("tree not found: {0}")]
    TreeNotFound(ContentHash),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] dbv_store::StoreError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
