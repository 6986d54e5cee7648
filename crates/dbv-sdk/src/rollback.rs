//! Validated rollbacks of one commit or a commit range.

use dbv_rollback::{
    plan_rollback, validate_rollback, RollbackChange, RollbackContext, RollbackMode,
    RollbackOperation, RollbackPlan, RollbackRequest, ValidationReport,
};
use dbv_store::ObjectStore;
use dbv_types::{ChangeKind, ContentHash, ObjectKey, Timestamp};
use serde::Serialize;
use tracing::{info, warn};

use crate::context::Context;
use crate::error::{SdkError, SdkResult};
use crate::repository::{Repository, State};

/// What a rollback attempt did, with the check rows that decided it.
#[derive(Clone, Debug, Serialize)]
pub struct RollbackOutcome {
    pub operation: RollbackOperation,
    pub report: ValidationReport,
    /// Objects the rollback restores (or would restore, for a dry run).
    pub changes: Vec<RollbackChange>,
}

impl RollbackOutcome {
    pub fn is_success(&self) -> bool {
        self.operation.is_success()
    }
}

impl State {
    /// Check the pinned head, run the checks and, if none failed, plan.
    fn assess_rollback(
        &self,
        ctx: &Context,
        request: &RollbackRequest,
        store: &dyn ObjectStore,
    ) -> SdkResult<(ValidationReport, Option<RollbackPlan>)> {
        let current = self.head(&ctx.branch)?;
        if let Some(pinned) = ctx.expected_head {
            if current != Some(pinned) {
                return Err(SdkError::Concurrency(format!(
                    "branch {} moved since {}",
                    ctx.branch,
                    pinned.short_hex()
                )));
            }
        }
        let rctx = self.rollback_context(request, store);
        let report = validate_rollback(&rctx)?;
        let plan = if report.passed() {
            Some(plan_rollback(&rctx)?)
        } else {
            None
        };
        Ok((report, plan))
    }

    fn rollback_context<'a>(
        &'a self,
        request: &'a RollbackRequest,
        store: &'a dyn ObjectStore,
    ) -> RollbackContext<'a> {
        RollbackContext {
            request,
            branches: &self.branches,
            commits: &self.commits,
            ledger: &self.ledger,
            deps: &self.deps,
            store,
            log: &self.rollbacks,
        }
    }
}

fn blocked_reason(report: &ValidationReport) -> String {
    let reasons: Vec<String> = report
        .failures()
        .chain(report.warnings())
        .map(|r| format!("{}: {}", r.check, r.message))
        .collect();
    format!("rollback blocked by validation ({})", reasons.join("; "))
}

fn blocked_outcome(
    request: &RollbackRequest,
    mode: RollbackMode,
    report: ValidationReport,
    plan: Option<RollbackPlan>,
    now: Timestamp,
) -> RollbackOutcome {
    let mut operation = RollbackOperation::failed(request, blocked_reason(&report), now);
    operation.mode = mode;
    warn!(
        branch = %request.branch,
        commit = %request.source_commit.short_hex(),
        failures = report.failures().count(),
        warnings = report.warnings().count(),
        "rollback blocked"
    );
    RollbackOutcome {
        operation,
        report,
        changes: plan.map(|p| p.changes).unwrap_or_default(),
    }
}

fn rollback_message(request: &RollbackRequest) -> String {
    match request.target_commit {
        Some(to) => format!(
            "Rollback {}..{} on '{}'",
            request.source_commit.short_hex(),
            to.short_hex(),
            request.branch
        ),
        None => format!(
            "Rollback {} on '{}'",
            request.source_commit.short_hex(),
            request.branch
        ),
    }
}

impl Repository {
    /// Run the check pipeline for `request` without planning or writing
    /// anything.
    pub fn validate_rollback(&self, request: &RollbackRequest) -> SdkResult<ValidationReport> {
        request.validate()?;
        self.read(|state| {
            let ctx = state.rollback_context(request, self.store());
            Ok(validate_rollback(&ctx)?)
        })
    }

    /// Revert one commit on the context's branch.
    pub fn rollback_commit(
        &self,
        ctx: &Context,
        commit: ContentHash,
        mode: RollbackMode,
    ) -> SdkResult<RollbackOutcome> {
        self.rollback(ctx, RollbackRequest::commit(&ctx.branch, commit), mode)
    }

    /// Revert an inclusive range of first-parent commits on the context's
    /// branch, `from` being the oldest.
    pub fn rollback_range(
        &self,
        ctx: &Context,
        from: ContentHash,
        to: ContentHash,
        mode: RollbackMode,
    ) -> SdkResult<RollbackOutcome> {
        self.rollback(ctx, RollbackRequest::range(&ctx.branch, from, to), mode)
    }

    /// Validate, plan and (unless this is a dry run) execute a rollback.
    ///
    /// A rollback blocked by validation is not an error: the outcome
    /// carries a failed operation and the report explaining why. Executing
    /// appends one new commit whose tree restores the reverted objects and
    /// one `ROLLBACK` history entry per restored object; no commit is ever
    /// deleted. Every executed attempt is logged; dry runs record nothing.
    pub fn rollback(
        &self,
        ctx: &Context,
        request: RollbackRequest,
        mode: RollbackMode,
    ) -> SdkResult<RollbackOutcome> {
        if request.branch != ctx.branch {
            return Err(SdkError::Validation(format!(
                "rollback targets {}, context is on {}",
                request.branch, ctx.branch
            )));
        }
        request.validate()?;
        let allow_warnings = self.config.allow_rollback_warnings;
        let author = self.author(ctx);
        let store = self.store();

        if mode == RollbackMode::DryRun {
            return self.read(|state| {
                let (report, plan) = state.assess_rollback(ctx, &request, store)?;
                let now = Timestamp::now();
                let outcome = match plan {
                    Some(plan) if report.permits(allow_warnings) => {
                        info!(
                            branch = %request.branch,
                            objects = plan.objects_affected(),
                            "rollback dry run"
                        );
                        let operation =
                            RollbackOperation::dry_run(&request, plan.objects_affected(), now);
                        RollbackOutcome {
                            operation,
                            report,
                            changes: plan.changes,
                        }
                    }
                    plan => blocked_outcome(&request, mode, report, plan, now),
                };
                Ok(outcome)
            });
        }

        let result = self.transact(|state| {
            let (report, plan) = state.assess_rollback(ctx, &request, store)?;
            let plan = match plan {
                Some(plan) if report.permits(allow_warnings) => plan,
                plan => {
                    let now = state.now();
                    let outcome = blocked_outcome(&request, mode, report, plan, now);
                    state.rollbacks.record(outcome.operation.clone());
                    return Ok(outcome);
                }
            };

            let commit = state.append_commit(
                store,
                &request.branch,
                Some(plan.head),
                vec![plan.head],
                &plan.tree,
                author,
                &rollback_message(&request),
            )?;
            for change in plan.changes.iter().filter(|c| !c.is_noop()) {
                let key = ObjectKey::from_path(&change.path)?;
                let object = state.ledger.ensure_object(&request.branch, key, None)?;
                let revision = State::revision_for(store, change.restored, &commit)?;
                state.apply_revision(object, ChangeKind::Rollback, revision)?;
            }

            let operation =
                RollbackOperation::succeeded(&request, plan.objects_affected(), commit.hash, commit.timestamp);
            info!(
                rollback = %operation.id,
                branch = %request.branch,
                objects = plan.objects_affected(),
                commit = %commit.hash.short_hex(),
                "rolled back"
            );
            state.rollbacks.record(operation.clone());
            Ok(RollbackOutcome {
                operation,
                report,
                changes: plan.changes,
            })
        });

        if let Err(e) = &result {
            let reason = e.to_string();
            self.transact(|state| {
                let now = state.now();
                let mut operation = RollbackOperation::failed(&request, reason, now);
                operation.mode = mode;
                state.rollbacks.record(operation);
                Ok(())
            })?;
        }
        result
    }

    /// Every rollback attempt on `branch`, oldest first.
    pub fn rollback_operations(&self, branch: &str) -> Vec<RollbackOperation> {
        self.read(|state| Ok(state.rollbacks.for_branch(branch).cloned().collect()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::{ChangeKind, ErrorKind, ObjectChange, Repository, RepositoryConfig};
    use dbv_rollback::{CheckStatus, RollbackMode, RollbackStatus};
    use dbv_types::{ObjectKey, ObjectType, SemVer};

    fn users() -> ObjectKey {
        ObjectKey::new(ObjectType::View, "app", "users_v").unwrap()
    }

    /// c1 creates a view, c2 alters it.
    fn repo(config: RepositoryConfig) -> (Repository, dbv_types::ContentHash, dbv_types::ContentHash) {
        let repo = Repository::init(config).unwrap();
        let ctx = repo.context();
        let c1 = repo
            .record_change(&ctx, ObjectChange::create(ObjectType::View, "app", "users_v", "SELECT 1"))
            .unwrap()
            .commit
            .unwrap();
        let c2 = repo
            .record_change(&ctx, ObjectChange::alter(ObjectType::View, "app", "users_v", "SELECT 2"))
            .unwrap()
            .commit
            .unwrap();
        (repo, c1, c2)
    }

    #[test]
    fn dry_run_writes_nothing() {
        let (repo, _, c2) = repo(RepositoryConfig::default());
        let outcome = repo
            .rollback_commit(&repo.context(), c2, RollbackMode::DryRun)
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.operation.mode, RollbackMode::DryRun);
        assert_eq!(outcome.operation.objects_affected, 1);
        assert!(outcome.operation.rollback_commit.is_none());
        assert_eq!(repo.head("main").unwrap(), Some(c2));
        assert_eq!(repo.current_version("main", &users()).unwrap(), SemVer::new(1, 1, 0));
        assert!(repo.rollback_operations("main").is_empty());
    }

    #[test]
    fn executed_rollback_restores_and_records() {
        let (repo, _, c2) = repo(RepositoryConfig::default());
        let outcome = repo
            .rollback_commit(&repo.context(), c2, RollbackMode::Executed)
            .unwrap();
        assert_eq!(outcome.operation.status, RollbackStatus::Success);
        let commit = outcome.operation.rollback_commit.unwrap();
        assert_eq!(repo.head("main").unwrap(), Some(commit));
        assert_eq!(repo.commit(&commit).unwrap().parents, vec![c2]);

        let object = repo.object("main", &users()).unwrap();
        assert_eq!(object.definition.as_deref(), Some("SELECT 1"));
        assert_eq!(object.version, SemVer::new(1, 2, 0));
        let entries = repo.commit_entries(&commit);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ChangeKind::Rollback);
        assert_eq!(repo.log("main", 10).unwrap().len(), 3);
        assert_eq!(repo.rollback_operations("main").len(), 1);
    }

    #[test]
    fn warnings_block_unless_allowed() {
        let (repo, _, c2) = repo(RepositoryConfig::default());
        repo.rollback_commit(&repo.context(), c2, RollbackMode::Executed)
            .unwrap();
        let head = repo.head("main").unwrap();

        let again = repo
            .rollback_commit(&repo.context(), c2, RollbackMode::Executed)
            .unwrap();
        assert_eq!(again.operation.status, RollbackStatus::Failed);
        assert_eq!(
            again.report.get("already_rolled_back").unwrap().status,
            CheckStatus::Warn
        );
        assert_eq!(repo.head("main").unwrap(), head);
        assert_eq!(repo.rollback_operations("main").len(), 2);
    }

    #[test]
    fn range_rollback_drops_created_objects() {
        let config = RepositoryConfig {
            allow_rollback_warnings: true,
            ..Default::default()
        };
        let (repo, c1, c2) = repo(config);
        let outcome = repo
            .rollback_range(&repo.context(), c1, c2, RollbackMode::Executed)
            .unwrap();
        assert!(outcome.is_success());
        assert!(repo.tree("main").unwrap().is_empty());
        let object = repo.object("main", &users()).unwrap();
        assert!(!object.active);
        assert_eq!(object.version, SemVer::new(2, 0, 0));
    }

    #[test]
    fn pinned_head_must_match() {
        let (repo, c1, c2) = repo(RepositoryConfig::default());
        let err = repo
            .rollback_commit(&repo.context().at_head(c1), c2, RollbackMode::Executed)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Concurrency);
        let log = repo.rollback_operations("main");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, RollbackStatus::Failed);
    }

    #[test]
    fn unknown_commit_fails_validation() {
        let (repo, _, _) = repo(RepositoryConfig::default());
        let stray = dbv_types::ContentHash::from_bytes(b"stray");
        let outcome = repo
            .rollback_commit(&repo.context(), stray, RollbackMode::DryRun)
            .unwrap();
        assert!(!outcome.is_success());
        assert_eq!(
            outcome.report.get("commit_on_branch").unwrap().status,
            CheckStatus::Fail
        );
        assert_eq!(outcome.operation.mode, RollbackMode::DryRun);
        assert!(repo.rollback_operations("main").is_empty());
    }
}
