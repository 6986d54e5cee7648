//! The merge operation state machine.
//!
//! ```text
//! in_progress ──► completed            (nothing unresolved)
//!      │ ├──────► failed | aborted
//!      ▼
//! awaiting_resolution ──► completed | failed | aborted
//! ```

use std::fmt;

use dbv_crypto::compute_hash;
use dbv_store::{ObjectStore, Tree, TreeEntry};
use dbv_types::{ContentHash, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::classify::{three_way_diff, ObjectClassification, ObjectMerge};
use crate::conflict::{
    classify_severity, suggest_resolution, Conflict, ConflictChange, ConflictDefinitions,
    ConflictResolution, ConflictType, Resolution, ResolutionChoice,
};
use crate::error::{MergeError, MergeResult};
use crate::rename::{detect_renames, RenameHint};

/// How conflicts are handled when a merge starts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Apply only non-conflicting changes; every conflict waits for a caller.
    #[default]
    Manual,
    /// Also apply each conflict's suggested resolution, when it has one.
    Auto,
    /// Resolve every conflict in favour of the target branch.
    Ours,
    /// Resolve every conflict in favour of the source branch.
    Theirs,
}

/// Lifecycle of a merge operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    InProgress,
    AwaitingResolution,
    Completed,
    Failed,
    Aborted,
}

impl MergeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::AwaitingResolution => "awaiting_resolution",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    pub fn can_transition_to(&self, to: MergeStatus) -> bool {
        use MergeStatus::*;
        matches!(
            (self, to),
            (InProgress, AwaitingResolution | Completed | Failed | Aborted)
                | (AwaitingResolution, Completed | Failed | Aborted)
        )
    }
}

impl fmt::Display for MergeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge engine settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Largest name edit distance reported as a likely rename.
    pub rename_threshold: usize,
    /// Strategy used when a merge request does not name one.
    pub default_strategy: MergeStrategy,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            rename_threshold: 3,
            default_strategy: MergeStrategy::Manual,
        }
    }
}

/// Everything needed to plan a merge of `source_branch` into
/// `target_branch`.
#[derive(Clone, Debug)]
pub struct MergeRequest {
    pub source_branch: String,
    pub target_branch: String,
    pub source_tip: ContentHash,
    pub target_tip: ContentHash,
    /// Merge base commit, if the branches share history.
    pub base_commit: Option<ContentHash>,
    pub strategy: MergeStrategy,
    pub started_at: Timestamp,
}

/// A merge of one branch into another, from planning to completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MergeOperation {
    pub id: Uuid,
    pub source_branch: String,
    pub target_branch: String,
    pub source_tip: ContentHash,
    pub target_tip: ContentHash,
    pub base_commit: Option<ContentHash>,
    pub strategy: MergeStrategy,
    status: MergeStatus,
    /// Three-way state of every path touched by either side.
    pub entries: Vec<ObjectMerge>,
    pub conflicts: Vec<Conflict>,
    pub rename_hints: Vec<RenameHint>,
    pub merge_commit: Option<ContentHash>,
    pub failure: Option<String>,
    pub started_at: Timestamp,
}

impl MergeOperation {
    /// Classify the three snapshots, score every conflict and apply the
    /// request's strategy.
    ///
    /// The result is `in_progress` when nothing is left to resolve and
    /// `awaiting_resolution` otherwise.
    pub fn plan(
        request: MergeRequest,
        base: &Tree,
        source: &Tree,
        target: &Tree,
        store: &dyn ObjectStore,
        config: &MergeConfig,
    ) -> MergeResult<Self> {
        let id = Uuid::now_v7();
        let diff = three_way_diff(base, source, target);

        let mut conflicts = Vec::new();
        for entry in diff.conflicts() {
            let change = match (entry.base, entry.source, entry.target) {
                (None, _, _) => ConflictChange::Added,
                (_, None, _) | (_, _, None) => ConflictChange::Removed,
                _ => ConflictChange::Modified,
            };
            let conflict_type = ConflictType::new(entry.object_type, change);
            let definitions =
                ConflictDefinitions::load(store, entry.base, entry.source, entry.target)?;
            let severity = classify_severity(conflict_type, &definitions);
            conflicts.push(Conflict {
                merge_id: id,
                path: entry.path.clone(),
                object_type: entry.object_type,
                conflict_type,
                severity,
                base: entry.base,
                source: entry.source,
                target: entry.target,
                suggestion: suggest_resolution(conflict_type, severity, &definitions),
                resolution: None,
            });
        }

        let mut op = Self {
            id,
            source_branch: request.source_branch,
            target_branch: request.target_branch,
            source_tip: request.source_tip,
            target_tip: request.target_tip,
            base_commit: request.base_commit,
            strategy: request.strategy,
            status: MergeStatus::InProgress,
            entries: diff.entries,
            conflicts,
            rename_hints: detect_renames(source, target, config.rename_threshold),
            merge_commit: None,
            failure: None,
            started_at: request.started_at,
        };
        op.apply_strategy();

        info!(
            merge = %op.id,
            source = %op.source_branch,
            target = %op.target_branch,
            conflicts = op.conflict_count(),
            unresolved = op.unresolved_count(),
            "planned merge"
        );
        if op.unresolved_count() > 0 {
            op.transition(MergeStatus::AwaitingResolution)?;
        }
        Ok(op)
    }

    fn apply_strategy(&mut self) {
        let strategy = self.strategy;
        for conflict in &mut self.conflicts {
            let side = match strategy {
                MergeStrategy::Manual => None,
                MergeStrategy::Auto => conflict.suggestion,
                MergeStrategy::Ours => Some(Resolution::Ours),
                MergeStrategy::Theirs => Some(Resolution::Theirs),
            };
            if let Some(side) = side {
                conflict.resolution = Some(ConflictResolution {
                    choice: side.into(),
                    value: conflict.side(side),
                    automatic: true,
                });
            }
        }
    }

    // ---------------------------------------------------------------
    // State
    // ---------------------------------------------------------------

    pub fn status(&self) -> MergeStatus {
        self.status
    }

    fn transition(&mut self, to: MergeStatus) -> MergeResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(MergeError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        debug!(merge = %self.id, from = %self.status, to = %to, "merge status changed");
        self.status = to;
        Ok(())
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    pub fn resolved_count(&self) -> usize {
        self.conflicts.iter().filter(|c| c.is_resolved()).count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.conflict_count() - self.resolved_count()
    }

    /// Non-conflicting paths that the merge changes on the target.
    pub fn auto_merged_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.classification.is_conflict())
            .filter(|e| e.classification != ObjectClassification::Unchanged)
            .filter(|e| e.auto_value() != e.target)
            .count()
    }

    pub fn conflict(&self, path: &str) -> Option<&Conflict> {
        self.conflicts.iter().find(|c| c.path == path)
    }

    /// `true` once every conflict is resolved and the merge is still open.
    pub fn is_ready(&self) -> bool {
        !self.status.is_terminal() && self.unresolved_count() == 0
    }

    // ---------------------------------------------------------------
    // Resolution
    // ---------------------------------------------------------------

    /// Record a caller's resolution of the conflict at `path`.
    ///
    /// A custom definition is hashed here; the caller stores its blob.
    pub fn resolve_conflict(
        &mut self,
        path: &str,
        choice: ResolutionChoice,
    ) -> MergeResult<&ConflictResolution> {
        if self.status.is_terminal() {
            return Err(MergeError::Closed(self.status));
        }
        let merge_id = self.id;
        let conflict = self
            .conflicts
            .iter_mut()
            .find(|c| c.path == path)
            .ok_or_else(|| MergeError::ConflictNotFound(path.to_string()))?;
        if conflict.is_resolved() {
            return Err(MergeError::AlreadyResolved(path.to_string()));
        }

        let value = match &choice {
            ResolutionChoice::Ours => conflict.side(Resolution::Ours),
            ResolutionChoice::Theirs => conflict.side(Resolution::Theirs),
            ResolutionChoice::Custom(definition) => Some(compute_hash(definition)),
        };
        debug!(merge = %merge_id, path = %path, "resolved conflict");
        Ok(conflict.resolution.insert(ConflictResolution {
            choice,
            value,
            automatic: false,
        }))
    }

    /// The merged snapshot: auto-merged values plus every resolution.
    pub fn compose_tree(&self) -> MergeResult<Tree> {
        let unresolved = self.unresolved_count();
        if unresolved > 0 {
            return Err(MergeError::UnresolvedConflicts { unresolved });
        }
        let mut entries = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let value = if entry.classification.is_conflict() {
                self.conflict(&entry.path)
                    .and_then(|c| c.resolution.as_ref())
                    .and_then(|r| r.value)
            } else {
                entry.auto_value()
            };
            if let Some(blob) = value {
                entries.push(TreeEntry::new(entry.path.clone(), entry.object_type, blob));
            }
        }
        Ok(Tree::new(entries)?)
    }

    /// Parents of the merge commit: target tip first, then source tip.
    pub fn commit_parents(&self) -> Vec<ContentHash> {
        vec![self.target_tip, self.source_tip]
    }

    // ---------------------------------------------------------------
    // Completion
    // ---------------------------------------------------------------

    /// Mark the merge completed by `commit`.
    pub fn complete(&mut self, commit: ContentHash) -> MergeResult<()> {
        let unresolved = self.unresolved_count();
        if unresolved > 0 {
            return Err(MergeError::UnresolvedConflicts { unresolved });
        }
        self.transition(MergeStatus::Completed)?;
        self.merge_commit = Some(commit);
        info!(merge = %self.id, commit = %commit.short_hex(), "merge completed");
        Ok(())
    }

    pub fn abort(&mut self) -> MergeResult<()> {
        self.transition(MergeStatus::Aborted)?;
        info!(merge = %self.id, "merge aborted");
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> MergeResult<()> {
        self.transition(MergeStatus::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }
}
