//! Checks that must pass before anything else can be evaluated.

use dbv_refs::BranchStatus;

use crate::check::{CheckResult, RollbackCheck, RollbackContext};
use crate::error::RollbackResult;
use crate::plan::{RollbackKind, RollbackRequest};

/// The branch exists and has not been deleted.
pub struct BranchExistsCheck;

impl RollbackCheck for BranchExistsCheck {
    fn name(&self) -> &str {
        "branch_exists"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let name = &ctx.request.branch;
        let result = match ctx.branches.get(name) {
            None => CheckResult::fail(self.name(), format!("branch '{name}' does not exist"))
                .with_recommendation("check the branch name"),
            Some(b) if b.status == BranchStatus::Deleted => {
                CheckResult::fail(self.name(), format!("branch '{name}' is deleted"))
            }
            Some(_) => CheckResult::pass(self.name(), format!("branch '{name}' exists")),
        };
        Ok(result)
    }
}

/// The source commit exists and is reachable from the branch head.
pub struct CommitOnBranchCheck;

impl RollbackCheck for CommitOnBranchCheck {
    fn name(&self) -> &str {
        "commit_on_branch"
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let commit = &ctx.request.source_commit;
        let branch = &ctx.request.branch;
        let result = if !ctx.commits.contains(commit) {
            CheckResult::fail(self.name(), format!("commit {} does not exist", commit.short_hex()))
        } else if !ctx.on_branch(commit) {
            CheckResult::fail(
                self.name(),
                format!("commit {} is not on branch '{branch}'", commit.short_hex()),
            )
            .with_recommendation("roll back on the branch that contains the commit")
        } else {
            CheckResult::pass(self.name(), format!("commit {} is on '{branch}'", commit.short_hex()))
        };
        Ok(result)
    }
}

/// For a range: the target commit is on the branch and strictly after the
/// source on the same first-parent line.
pub struct TargetCommitCheck;

impl RollbackCheck for TargetCommitCheck {
    fn name(&self) -> &str {
        "target_commit"
    }

    fn applies_to(&self, request: &RollbackRequest) -> bool {
        request.kind == RollbackKind::Range
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult> {
        let Some(target) = ctx.request.target_commit else {
            return Ok(CheckResult::fail(self.name(), "range rollback has no target commit"));
        };
        let source = ctx.request.source_commit;
        let result = if !ctx.commits.contains(&target) {
            CheckResult::fail(self.name(), format!("commit {} does not exist", target.short_hex()))
        } else if !ctx.on_branch(&target) {
            CheckResult::fail(
                self.name(),
                format!("commit {} is not on branch '{}'", target.short_hex(), ctx.request.branch),
            )
        } else if target == source || ctx.span().is_empty() {
            CheckResult::fail(
                self.name(),
                format!(
                    "commit {} is not later than {}",
                    target.short_hex(),
                    source.short_hex()
                ),
            )
            .with_recommendation("pass the older commit first")
        } else {
            CheckResult::pass(
                self.name(),
                format!("range covers {} commit(s)", ctx.span().len()),
            )
        };
        Ok(result)
    }
}
