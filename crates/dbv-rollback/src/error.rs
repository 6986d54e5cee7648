/// Errors produced by rollback validation and planning.
///
/// Expected problems with a rollback (missing branch, already reverted,
/// dependents affected) are reported as check rows, not as errors.
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    /// The request itself is malformed.
    #[error("invalid rollback request: {0}")]
    InvalidRequest(String),

    /// Validation produced failures, or warnings that were not allowed.
    #[error("rollback blocked: {failures} failure(s), {warnings} warning(s)")]
    Blocked { failures: usize, warnings: usize },

    #[error("store error: {0}")]
    Store(#[from] dbv_store::StoreError),

    #[error("commit graph error: {0}")]
    Dag(#[from] dbv_dag::DagError),
}

/// Convenience alias for rollback results.
pub type RollbackResult<T> = Result<T, RollbackError>;
