//! Rollback modes and the audit log of executed rollbacks.

use dbv_types::{ContentHash, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::{RollbackKind, RollbackRequest};

/// Whether a rollback only reports or actually commits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackMode {
    DryRun,
    Executed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackStatus {
    Success,
    Failed,
}

/// Rollback settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RollbackConfig {
    /// Proceed when validation only produced warnings.
    pub allow_warnings: bool,
}

/// Audit row for one rollback attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOperation {
    pub id: Uuid,
    pub branch: String,
    pub kind: RollbackKind,
    pub source_commit: ContentHash,
    pub target_commit: Option<ContentHash>,
    pub mode: RollbackMode,
    pub status: RollbackStatus,
    pub objects_affected: usize,
    /// The new commit, for a successful executed rollback.
    pub rollback_commit: Option<ContentHash>,
    pub error: Option<String>,
    pub timestamp: Timestamp,
}

impl RollbackOperation {
    fn from_request(
        request: &RollbackRequest,
        mode: RollbackMode,
        status: RollbackStatus,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            branch: request.branch.clone(),
            kind: request.kind,
            source_commit: request.source_commit,
            target_commit: request.target_commit,
            mode,
            status,
            objects_affected: 0,
            rollback_commit: None,
            error: None,
            timestamp,
        }
    }

    /// Result of a dry run: nothing written.
    pub fn dry_run(request: &RollbackRequest, objects_affected: usize, timestamp: Timestamp) -> Self {
        Self {
            objects_affected,
            ..Self::from_request(request, RollbackMode::DryRun, RollbackStatus::Success, timestamp)
        }
    }

    pub fn succeeded(
        request: &RollbackRequest,
        objects_affected: usize,
        commit: ContentHash,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            objects_affected,
            rollback_commit: Some(commit),
            ..Self::from_request(request, RollbackMode::Executed, RollbackStatus::Success, timestamp)
        }
    }

    pub fn failed(request: &RollbackRequest, error: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::from_request(request, RollbackMode::Executed, RollbackStatus::Failed, timestamp)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RollbackStatus::Success
    }

    /// `true` if this successful, executed rollback reverted `commit`.
    pub fn reverted(&self, commit: &ContentHash) -> bool {
        self.mode == RollbackMode::Executed
            && self.is_success()
            && (self.source_commit == *commit || self.target_commit.as_ref() == Some(commit))
    }
}

/// Append-only log of rollback attempts.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RollbackLog {
    operations: Vec<RollbackOperation>,
}

impl RollbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, operation: RollbackOperation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&RollbackOperation> {
        self.operations.iter().find(|op| op.id == *id)
    }

    pub fn all(&self) -> &[RollbackOperation] {
        &self.operations
    }

    pub fn for_branch<'a, 'b>(
        &'a self,
        branch: &'b str,
    ) -> impl Iterator<Item = &'a RollbackOperation> + 'b
    where
        'a: 'b,
    {
        self.operations.iter().filter(move |op| op.branch == branch)
    }

    /// A successful executed rollback of `commit` on `branch`, if any.
    pub fn find_reverted(&self, branch: &str, commit: &ContentHash) -> Option<&RollbackOperation> {
        self.for_branch(branch).find(|op| op.reverted(commit))
    }
}
