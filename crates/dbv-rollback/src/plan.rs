//! Inverse-change planning.
//!
//! A rollback never rewrites history. The plan is the branch head's tree
//! with every path touched by the reverted commits put back to its value
//! from just before them; executing it appends one new commit.

use dbv_store::{Tree, TreeEntry};
use dbv_types::{ContentHash, ObjectType};
use serde::{Deserialize, Serialize};

use crate::check::RollbackContext;
use crate::error::{RollbackError, RollbackResult};

/// Single commit or an inclusive range of commits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackKind {
    Commit,
    Range,
}

/// What to revert, and where.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    pub branch: String,
    /// The (oldest) commit to revert.
    pub source_commit: ContentHash,
    /// Newest commit of a range, inclusive.
    pub target_commit: Option<ContentHash>,
    pub kind: RollbackKind,
}

impl RollbackRequest {
    pub fn commit(branch: impl Into<String>, commit: ContentHash) -> Self {
        Self {
            branch: branch.into(),
            source_commit: commit,
            target_commit: None,
            kind: RollbackKind::Commit,
        }
    }

    pub fn range(branch: impl Into<String>, from: ContentHash, to: ContentHash) -> Self {
        Self {
            branch: branch.into(),
            source_commit: from,
            target_commit: Some(to),
            kind: RollbackKind::Range,
        }
    }

    /// Reject malformed parameters. Everything else is left to the checks.
    pub fn validate(&self) -> RollbackResult<()> {
        if self.branch.trim().is_empty() {
            return Err(RollbackError::InvalidRequest("branch name is empty".into()));
        }
        match (self.kind, self.target_commit) {
            (RollbackKind::Range, None) => Err(RollbackError::InvalidRequest(
                "range rollback needs a target commit".into(),
            )),
            (RollbackKind::Commit, Some(_)) => Err(RollbackError::InvalidRequest(
                "single-commit rollback takes no target commit".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// One object put back by a rollback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackChange {
    pub path: String,
    pub object_type: ObjectType,
    /// Value on the branch head now (`None` = absent).
    pub current: Option<ContentHash>,
    /// Value after the rollback (`None` = the object is dropped).
    pub restored: Option<ContentHash>,
}

impl RollbackChange {
    /// `true` when the head already holds the restored value.
    pub fn is_noop(&self) -> bool {
        self.current == self.restored
    }
}

/// The new tree for a rollback and the objects it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub request: RollbackRequest,
    /// Branch head the plan was computed against.
    pub head: ContentHash,
    /// One entry per object changed by the reverted commits, by path.
    pub changes: Vec<RollbackChange>,
    pub tree: Tree,
}

impl RollbackPlan {
    pub fn objects_affected(&self) -> usize {
        self.changes.len()
    }
}

/// Compute the inverse of the reverted commits against the branch head.
pub fn plan_rollback(ctx: &RollbackContext<'_>) -> RollbackResult<RollbackPlan> {
    ctx.request.validate()?;
    let head = ctx.head().ok_or_else(|| {
        RollbackError::InvalidRequest(format!("branch '{}' has no commits", ctx.request.branch))
    })?;
    let mut tree = ctx.tree_of(&head)?;
    let diff = ctx.span_diff()?;

    let mut changes = Vec::with_capacity(diff.len());
    for change in diff.changes() {
        let path = change.path().to_string();
        let restored = change.old_hash();
        let current = tree.blob_at(&path);
        match restored {
            Some(blob) => tree.upsert(TreeEntry::new(path.clone(), change.object_type(), blob)),
            None => {
                tree.remove(&path);
            }
        }
        changes.push(RollbackChange {
            path,
            object_type: change.object_type(),
            current,
            restored,
        });
    }

    Ok(RollbackPlan {
        request: ctx.request.clone(),
        head,
        changes,
        tree,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_shapes() {
        let h = ContentHash::from_bytes(b"c");
        assert!(RollbackRequest::commit("main", h).validate().is_ok());
        assert!(RollbackRequest::range("main", h, h).validate().is_ok());

        let mut bad = RollbackRequest::commit("main", h);
        bad.kind = RollbackKind::Range;
        assert!(matches!(bad.validate(), Err(RollbackError::InvalidRequest(_))));

        let empty = RollbackRequest::commit("  ", h);
        assert!(matches!(empty.validate(), Err(RollbackError::InvalidRequest(_))));
    }

    #[test]
    fn noop_change() {
        let h = Some(ContentHash::from_bytes(b"x"));
        let change = RollbackChange {
            path: "table/app.t".into(),
            object_type: ObjectType::Table,
            current: h,
            restored: h,
        };
        assert!(change.is_noop());
    }
}
