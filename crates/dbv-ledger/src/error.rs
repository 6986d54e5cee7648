use dbv_types::{ObjectId, ObjectKey};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("object {key} not found on branch {branch}")]
    KeyNotFound { branch: String, key: ObjectKey },

    #[error("object {key} already exists on branch {branch}")]
    AlreadyExists { branch: String, key: ObjectKey },

    /// A parent reference must name an object on the same branch.
    #[error("parent {parent} of {key} is not on branch {branch}")]
    InvalidParent {
        branch: String,
        key: ObjectKey,
        parent: ObjectId,
    },

    /// The caller's view of the object is out of date.
    #[error("stale change count for {object}: expected {expected}, found {actual}")]
    StaleChangeCount {
        object: ObjectId,
        expected: u64,
        actual: u64,
    },

    #[error("{object} has already been created")]
    AlreadyCreated { object: ObjectId },

    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },
}

/// Convenience alias for ledger results.
pub type LedgerResult<T> = Result<T, LedgerError>;
