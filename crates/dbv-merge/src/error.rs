use crate::operation::MergeStatus;

/// Errors produced by the merge engine.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("invalid merge transition: {from} -> {to}")]
    InvalidTransition { from: MergeStatus, to: MergeStatus },

    /// Completion was attempted while conflicts remain.
    #[error("{unresolved} conflict(s) still unresolved")]
    UnresolvedConflicts { unresolved: usize },

    #[error("no conflict at {0}")]
    ConflictNotFound(String),

    #[error("conflict at {0} is already resolved")]
    AlreadyResolved(String),

    /// The merge is finished and cannot be changed.
    #[error("merge is {0}")]
    Closed(MergeStatus),

    #[error("store error: {0}")]
    Store(#[from] dbv_store::StoreError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
