//! Rollback validation and planning for dbv.
//!
//! A rollback never deletes or rewrites a commit. It is validated by an
//! ordered pipeline of checks, planned as the inverse of the reverted
//! commits' changes against the current branch head, and executed by the
//! caller as one new commit.
//!
//! # Key Types
//!
//! - [`RollbackRequest`] -- branch, commit or inclusive commit range
//! - [`RollbackValidator`] / [`RollbackCheck`] -- the check pipeline
//! - [`ValidationReport`] / [`CheckResult`] -- graded PASS/WARN/FAIL rows
//! - [`RollbackPlan`] -- the restored tree and the objects it changes
//! - [`RollbackOperation`] / [`RollbackLog`] -- audit rows for attempts
//!
//! Expected problems are reported as rows so the caller can decide; only
//! malformed requests and unreadable stores are errors.

pub mod check;
pub mod checks;
pub mod error;
pub mod operation;
pub mod plan;
pub mod validator;

pub use check::{
    CheckResult, CheckSeverity, CheckStatus, RollbackCheck, RollbackContext, ValidationReport,
};
pub use error::{RollbackError, RollbackResult};
pub use operation::{
    RollbackConfig, RollbackLog, RollbackMode, RollbackOperation, RollbackStatus,
};
pub use plan::{plan_rollback, RollbackChange, RollbackKind, RollbackPlan, RollbackRequest};
pub use validator::{validate_rollback, RollbackValidator};
