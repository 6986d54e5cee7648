//! High-level SDK for dbv.
//!
//! One [`Repository`] ties together the object store, the commit graph,
//! branches, the version ledger, dependencies, merges and rollbacks. This
//! is the entry point for applications embedding dbv.
//!
//! # Key Types
//!
//! - [`Repository`] -- every operation, each one atomic
//! - [`Context`] -- branch and author of a call, optionally pinned to a head
//! - [`ObjectChange`] / [`ChangeOutcome`] -- recording a change
//! - [`ChangeClassifier`] -- plug-in mapping raw statements to objects
//! - [`RepositoryConfig`] -- TOML-loadable settings
//! - [`SdkError`] / [`ErrorKind`] -- the five error categories

pub mod change;
pub mod config;
pub mod context;
pub mod dependencies;
pub mod error;
pub mod merge;
pub mod repository;
pub mod rollback;

pub use change::{
    ChangeClassifier, ChangeOutcome, Classification, ExplicitClassifier, ObjectChange, RawChange,
};
pub use config::RepositoryConfig;
pub use context::Context;
pub use error::{ErrorKind, SdkError, SdkResult};
pub use repository::{BranchSnapshot, Repository, Snapshot};
pub use rollback::RollbackOutcome;

// Re-export key types
pub use dbv_crypto::{compute_hash, normalize_definition};
pub use dbv_dag::Commit;
pub use dbv_deps::DependencyKind;
pub use dbv_diff::{BranchDiff, DefinitionDiff, PathStatus};
pub use dbv_ledger::{HistoryEntry, HistoryPage, SchemaObject};
pub use dbv_merge::{
    ConflictReport, MergeOperation, MergeStatus, MergeStrategy, ObjectClassification,
    ResolutionChoice,
};
pub use dbv_refs::{Branch, BranchStatus};
pub use dbv_rollback::{
    CheckStatus, RollbackMode, RollbackOperation, RollbackRequest, RollbackStatus,
    ValidationReport,
};
pub use dbv_store::{Tree, TreeEntry};
pub use dbv_types::{
    ChangeKind, ContentHash, ObjectId, ObjectKey, ObjectType, SemVer, Severity, Timestamp,
};
