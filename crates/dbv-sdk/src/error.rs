use std::fmt;

use dbv_dag::DagError;
use dbv_deps::DepsError;
use dbv_diff::DiffError;
use dbv_ledger::LedgerError;
use dbv_merge::MergeError;
use dbv_refs::{BranchStatus, RefError};
use dbv_rollback::RollbackError;
use dbv_store::StoreError;
use dbv_types::TypeError;
use thiserror::Error;

/// Errors returned by the repository API.
///
/// Every lower-level error maps onto one of five kinds; see
/// [`SdkError::kind`].
#[derive(Debug, Error)]
pub enum SdkError {
    /// Malformed input: empty identifiers, bad names, illegal operations.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A merge cannot complete while conflicts are unresolved.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A structural invariant would break: dependency cycle, hash mismatch.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Lost a compare-and-swap race; re-read and retry.
    #[error("concurrency error: {0}")]
    Concurrency(String),
}

/// The closed set of error categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Integrity,
    Concurrency,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Integrity => "integrity",
            Self::Concurrency => "concurrency",
        })
    }
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Concurrency(_) => ErrorKind::Concurrency,
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<TypeError> for SdkError {
    fn from(e: TypeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<StoreError> for SdkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound(e.to_string()),
            StoreError::DuplicatePath(_) => Self::Validation(e.to_string()),
            _ => Self::Integrity(e.to_string()),
        }
    }
}

impl From<DiffError> for SdkError {
    fn from(e: DiffError) -> Self {
        match e {
            DiffError::TreeNotFound(_) => Self::NotFound(e.to_string()),
            DiffError::Store(inner) => inner.into(),
        }
    }
}

impl From<DagError> for SdkError {
    fn from(e: DagError) -> Self {
        match e {
            DagError::CommitNotFound(_) => Self::NotFound(e.to_string()),
            _ => Self::Integrity(e.to_string()),
        }
    }
}

impl From<RefError> for SdkError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::NotFound { .. } => Self::NotFound(e.to_string()),
            RefError::HeadMoved { .. } => Self::Concurrency(e.to_string()),
            RefError::NotWritable {
                status: BranchStatus::Conflicted,
                ..
            } => Self::Conflict(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<LedgerError> for SdkError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ObjectNotFound(_) | LedgerError::KeyNotFound { .. } => {
                Self::NotFound(e.to_string())
            }
            LedgerError::StaleChangeCount { .. } => Self::Concurrency(e.to_string()),
            LedgerError::IntegrityViolation { .. } => Self::Integrity(e.to_string()),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<DepsError> for SdkError {
    fn from(e: DepsError) -> Self {
        Self::Integrity(e.to_string())
    }
}

impl From<MergeError> for SdkError {
    fn from(e: MergeError) -> Self {
        match e {
            MergeError::UnresolvedConflicts { .. } => Self::Conflict(e.to_string()),
            MergeError::ConflictNotFound(_) => Self::NotFound(e.to_string()),
            MergeError::Store(inner) => inner.into(),
            _ => Self::Validation(e.to_string()),
        }
    }
}

impl From<RollbackError> for SdkError {
    fn from(e: RollbackError) -> Self {
        match e {
            RollbackError::InvalidRequest(_) | RollbackError::Blocked { .. } => {
                Self::Validation(e.to_string())
            }
            RollbackError::Store(inner) => inner.into(),
            RollbackError::Dag(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbv_types::{ContentHash, ObjectId};

    #[test]
    fn lower_errors_map_to_kinds() {
        let moved: SdkError = RefError::HeadMoved {
            name: "main".into(),
            expected: None,
            actual: Some(ContentHash::from_bytes(b"x")),
        }
        .into();
        assert_eq!(moved.kind(), ErrorKind::Concurrency);

        let cycle: SdkError = DepsError::Cycle {
            remaining: vec![ObjectId::new(1)],
        }
        .into();
        assert_eq!(cycle.kind(), ErrorKind::Integrity);

        let missing: SdkError = DagError::CommitNotFound(ContentHash::from_bytes(b"c")).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let open: SdkError = MergeError::UnresolvedConflicts { unresolved: 2 }.into();
        assert_eq!(open.kind(), ErrorKind::Conflict);

        let blocked: SdkError = RefError::NotWritable {
            name: "main".into(),
            status: BranchStatus::Conflicted,
        }
        .into();
        assert_eq!(blocked.kind(), ErrorKind::Conflict);

        let name: SdkError = RefError::InvalidBranchName {
            name: "a..b".into(),
            reason: "contains '..'".into(),
        }
        .into();
        assert_eq!(name.kind(), ErrorKind::Validation);
    }
}
