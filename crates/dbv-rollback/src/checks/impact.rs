//! Advisory checks. These only ever warn.

use std::collections::BTreeSet;

use dbv_diff::TreeChange;
use dbv_types::{ObjectId, ObjectKey};

use crate::check::{CheckResult, CheckSeverity, RollbackCheck, RollbackContext};
use crate::error::RollbackResult;

fn list(items: &[String]) -> String {
    const SHOWN: usize = 5;
    let mut text = items.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if items.len() > SHOWN {
        text.push_str(&format!(" and {} more", items.len() - SHOWN));
    }
    text
}

/// Reverting a revert is legal, so this only warns.
pub struct AlreadyRolledBackCheck;

impl RollbackCheck for AlreadyRolledBackCheck {
    fn name(&self) -> &str {
        "already_rolled_back"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let commit = &ctx.request.source_commit;
        let result = match ctx.log.find_reverted(&ctx.request.branch, commit) {
            Some(previous) => CheckResult::warn(
                self.name(),
                CheckSeverity::Warning,
                format!(
                    "commit {} was already rolled back by {}",
                    commit.short_hex(),
                    previous
                        .rollback_commit
                        .map(|c| c.short_hex())
                        .unwrap_or_default()
                ),
            )
            .with_recommendation("rolling back again re-applies nothing; consider reverting the rollback commit instead"),
            None => CheckResult::pass(self.name(), "commit has not been rolled back"),
        };
        Ok(result)
    }
}

/// Objects outside the change set that structurally depend on a changed
/// object.
pub struct DependencyImpactCheck;

impl RollbackCheck for DependencyImpactCheck {
    fn name(&self) -> &str {
        "dependency_impact"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let diff = ctx.span_diff()?;
        let changed: BTreeSet<ObjectId> = diff
            .changes()
            .into_iter()
            .filter_map(|c| ObjectKey::from_path(c.path()).ok())
            .filter_map(|key| ctx.ledger.find(&ctx.request.branch, &key))
            .collect();

        let affected: BTreeSet<ObjectId> = changed
            .iter()
            .flat_map(|id| ctx.deps.structural_dependents(*id))
            .filter(|id| !changed.contains(id))
            .collect();

        if affected.is_empty() {
            return Ok(CheckResult::pass(self.name(), "no dependent objects affected"));
        }
        let names: Vec<String> = affected
            .iter()
            .filter_map(|id| ctx.ledger.get(*id))
            .map(|o| o.path())
            .collect();
        Ok(CheckResult::warn(
            self.name(),
            CheckSeverity::Warning,
            format!("{} dependent object(s) affected: {}", names.len(), list(&names)),
        )
        .with_recommendation("verify dependents still compile against the restored definitions"))
    }
}

/// Reverting a merge touches work from more than one branch.
pub struct MergeCommitCheck;

impl RollbackCheck for MergeCommitCheck {
    fn name(&self) -> &str {
        "merge_commit"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let merges: Vec<String> = ctx
            .span()
            .into_iter()
            .filter(|c| c.is_merge())
            .map(|c| c.hash.short_hex())
            .collect();
        if merges.is_empty() {
            return Ok(CheckResult::pass(self.name(), "no merge commits reverted"));
        }
        Ok(CheckResult::warn(
            self.name(),
            CheckSeverity::Warning,
            format!("reverting merge commit(s) {}", list(&merges)),
        )
        .with_recommendation("changes merged from other branches will be undone"))
    }
}

/// Container objects created by the reverted commits would be dropped.
pub struct DataLossCheck;

impl RollbackCheck for DataLossCheck {
    fn name(&self) -> &str {
        "data_loss"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let diff = ctx.span_diff()?;
        let dropped: Vec<String> = diff
            .changes()
            .into_iter()
            .filter(|c| matches!(c, TreeChange::Added { .. }))
            .filter(|c| c.object_type().is_container())
            .map(|c| c.path().to_string())
            .collect();
        if dropped.is_empty() {
            return Ok(CheckResult::pass(self.name(), "no data-holding objects dropped"));
        }
        Ok(CheckResult::warn(
            self.name(),
            CheckSeverity::Critical,
            format!("{} data-holding object(s) would be dropped: {}", dropped.len(), list(&dropped)),
        )
        .with_recommendation("back up their data before rolling back"))
    }
}

/// Objects changed again after the reverted commits.
pub struct SubsequentChangesCheck;

impl RollbackCheck for SubsequentChangesCheck {
    fn name(&self) -> &str {
        "subsequent_changes"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let Some(head) = ctx.head() else {
            return Ok(CheckResult::pass(self.name(), "branch has no commits"));
        };
        let head_tree = ctx.tree_of(&head)?;
        let diff = ctx.span_diff()?;
        let changed_since: Vec<String> = diff
            .changes()
            .into_iter()
            .filter(|c| head_tree.blob_at(c.path()) != c.new_hash())
            .map(|c| c.path().to_string())
            .collect();
        if changed_since.is_empty() {
            return Ok(CheckResult::pass(self.name(), "no later changes to reverted objects"));
        }
        Ok(CheckResult::warn(
            self.name(),
            CheckSeverity::Warning,
            format!(
                "{} object(s) changed again later: {}",
                changed_since.len(),
                list(&changed_since)
            ),
        )
        .with_recommendation("later changes to these objects will be overwritten"))
    }
}
