use std::fmt;

use dbv_dag::{Commit, CommitGraph};
use dbv_deps::DependencyGraph;
use dbv_diff::{diff_trees, TreeDiff};
use dbv_ledger::VersionLedger;
use dbv_refs::BranchRegistry;
use dbv_store::{ObjectStore, Tree};
use dbv_types::ContentHash;
use serde::{Deserialize, Serialize};

use crate::error::RollbackResult;
use crate::operation::RollbackLog;
use crate::plan::RollbackRequest;

// ---------------------------------------------------------------------------
// CheckStatus / CheckSeverity
// ---------------------------------------------------------------------------

/// Outcome of a single check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Fail => "FAIL",
        })
    }
}

/// How much a non-passing check matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for CheckSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}

// ---------------------------------------------------------------------------
// CheckResult / ValidationReport
// ---------------------------------------------------------------------------

/// One row of a validation report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check that produced this row.
    pub check: String,
    pub status: CheckStatus,
    pub severity: CheckSeverity,
    pub message: String,
    pub recommendation: Option<String>,
}

impl CheckResult {
    pub fn pass(check: &str, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            status: CheckStatus::Pass,
            severity: CheckSeverity::Info,
            message: message.into(),
            recommendation: None,
        }
    }

    pub fn warn(check: &str, severity: CheckSeverity, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            status: CheckStatus::Warn,
            severity,
            message: message.into(),
            recommendation: None,
        }
    }

    pub fn fail(check: &str, message: impl Into<String>) -> Self {
        Self {
            check: check.to_string(),
            status: CheckStatus::Fail,
            severity: CheckSeverity::Error,
            message: message.into(),
            recommendation: None,
        }
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }
}

/// Ordered check rows for one rollback request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub results: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.status == CheckStatus::Fail)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| r.status == CheckStatus::Warn)
    }

    /// `true` when no check failed.
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    /// Whether execution may proceed. Any failure blocks; warnings block
    /// unless `allow_warnings` is set.
    pub fn permits(&self, allow_warnings: bool) -> bool {
        self.passed() && (allow_warnings || !self.has_warnings())
    }

    pub fn get(&self, check: &str) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.check == check)
    }
}

// ---------------------------------------------------------------------------
// RollbackContext
// ---------------------------------------------------------------------------

/// A consistent read-only view of the repository for one rollback request.
pub struct RollbackContext<'a> {
    pub request: &'a RollbackRequest,
    pub branches: &'a BranchRegistry,
    pub commits: &'a CommitGraph,
    pub ledger: &'a VersionLedger,
    pub deps: &'a DependencyGraph,
    pub store: &'a dyn ObjectStore,
    pub log: &'a RollbackLog,
}

impl RollbackContext<'_> {
    /// Current head of the request's branch.
    pub fn head(&self) -> Option<ContentHash> {
        self.branches
            .get(&self.request.branch)
            .and_then(|b| b.head)
    }

    /// `true` if `commit` is reachable from the branch head.
    pub fn on_branch(&self, commit: &ContentHash) -> bool {
        self.head()
            .is_some_and(|head| self.commits.is_ancestor(commit, &head))
    }

    /// The commits being reverted, newest first.
    ///
    /// Empty when the range does not lie on one first-parent chain.
    pub fn span(&self) -> Vec<&Commit> {
        let source = &self.request.source_commit;
        let newest = self.request.target_commit.as_ref().unwrap_or(source);
        let mut span = Vec::new();
        for commit in self.commits.first_parent_chain(newest) {
            let is_source = commit.hash == *source;
            span.push(commit);
            if is_source {
                return span;
            }
        }
        Vec::new()
    }

    /// Snapshot stored for `commit`.
    pub fn tree_of(&self, commit: &ContentHash) -> RollbackResult<Tree> {
        let tree = self.commits.require(commit)?.tree;
        Ok(self.store.tree(&tree)?)
    }

    /// Snapshot just before the source commit (its first parent's tree,
    /// or empty for a root commit).
    pub fn tree_before(&self) -> RollbackResult<Tree> {
        let source = self.commits.require(&self.request.source_commit)?;
        match source.first_parent() {
            Some(parent) => self.tree_of(parent),
            None => Ok(Tree::empty()),
        }
    }

    /// Snapshot right after the newest reverted commit.
    pub fn tree_after(&self) -> RollbackResult<Tree> {
        let newest = self
            .request
            .target_commit
            .unwrap_or(self.request.source_commit);
        self.tree_of(&newest)
    }

    /// Cumulative changes made by the reverted commits.
    pub fn span_diff(&self) -> RollbackResult<TreeDiff> {
        Ok(diff_trees(&self.tree_before()?, &self.tree_after()?))
    }
}

// ---------------------------------------------------------------------------
// RollbackCheck trait
// ---------------------------------------------------------------------------

/// A single check in the rollback validation pipeline.
///
/// Checks report expected problems as rows and return `Err` only when the
/// repository itself cannot be read.
pub trait RollbackCheck: Send + Sync {
    /// Stable name, used as the `check` field of the row.
    fn name(&self) -> &str;

    /// Whether the check runs for this request.
    fn applies_to(&self, _request: &RollbackRequest) -> bool {
        true
    }

    fn evaluate(&self, ctx: &RollbackContext<'_>) -> RollbackResult<CheckResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: CheckStatus) -> CheckResult {
        CheckResult {
            check: "x".into(),
            status,
            severity: CheckSeverity::Info,
            message: String::new(),
            recommendation: None,
        }
    }

    #[test]
    fn report_gating() {
        let clean = ValidationReport {
            results: vec![row(CheckStatus::Pass)],
        };
        assert!(clean.permits(false));

        let warned = ValidationReport {
            results: vec![row(CheckStatus::Pass), row(CheckStatus::Warn)],
        };
        assert!(warned.passed());
        assert!(!warned.permits(false));
        assert!(warned.permits(true));

        let failed = ValidationReport {
            results: vec![row(CheckStatus::Fail)],
        };
        assert!(!failed.permits(true));
    }

    #[test]
    fn row_wire_format() {
        let r = CheckResult::fail("branch_exists", "branch 'x' does not exist")
            .with_recommendation("create the branch first");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["check"], "branch_exists");
        assert_eq!(json["status"], "FAIL");
        assert_eq!(json["severity"], "ERROR");
        assert_eq!(json["recommendation"], "create the branch first");
    }
}
