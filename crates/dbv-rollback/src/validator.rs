use tracing::debug;

use crate::check::{CheckStatus, RollbackCheck, RollbackContext, ValidationReport};
use crate::checks::{
    AlreadyRolledBackCheck, BranchExistsCheck, CommitOnBranchCheck, DataLossCheck,
    DependencyImpactCheck, MergeCommitCheck, SubsequentChangesCheck, TargetCommitCheck,
};
use crate::error::RollbackResult;

/// An ordered pipeline of rollback checks.
///
/// Evaluation stops at the first `FAIL`: later checks assume the branch and
/// commits exist. Warnings never stop the pipeline.
pub struct RollbackValidator {
    checks: Vec<Box<dyn RollbackCheck>>,
}

impl RollbackValidator {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// The standard pipeline:
    /// branch -> commit -> target -> already rolled back -> dependents ->
    /// merge -> data loss -> later changes
    pub fn with_default_checks() -> Self {
        let mut validator = Self::new();
        validator.add_check(Box::new(BranchExistsCheck));
        validator.add_check(Box::new(CommitOnBranchCheck));
        validator.add_check(Box::new(TargetCommitCheck));
        validator.add_check(Box::new(AlreadyRolledBackCheck));
        validator.add_check(Box::new(DependencyImpactCheck));
        validator.add_check(Box::new(MergeCommitCheck));
        validator.add_check(Box::new(DataLossCheck));
        validator.add_check(Box::new(SubsequentChangesCheck));
        validator
    }

    pub fn add_check(&mut self, check: Box<dyn RollbackCheck>) {
        self.checks.push(check);
    }

    /// Run every applicable check against `ctx`.
    ///
    /// Returns `Err` only for a malformed request or an unreadable store.
    pub fn validate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<ValidationReport> {
        ctx.request.validate()?;
        let mut report = ValidationReport::default();
        for check in &self.checks {
            if !check.applies_to(ctx.request) {
                continue;
            }
            let result = check.evaluate(ctx)?;
            debug!(
                check = %result.check,
                status = %result.status,
                branch = %ctx.request.branch,
                "rollback check"
            );
            let failed = result.status == CheckStatus::Fail;
            report.results.push(result);
            if failed {
                break;
            }
        }
        Ok(report)
    }
}

impl Default for RollbackValidator {
    fn default() -> Self {
        Self::with_default_checks()
    }
}

/// Validate a rollback with the standard pipeline.
pub fn validate_rollback(ctx: &RollbackContext<'_>) -> RollbackResult<ValidationReport> {
    RollbackValidator::with_default_checks().validate(ctx)
}
