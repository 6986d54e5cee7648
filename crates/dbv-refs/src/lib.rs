//! Branch registry for dbv.
//!
//! A branch is a named, mutable pointer to a commit with its own lineage
//! and lifecycle. Branches are never purged: a merged or deleted branch
//! stays in the registry with a terminal status.
//!
//! # Key Types
//!
//! - [`Branch`] -- name, parent branch, fork point, head and status
//! - [`BranchStatus`] -- `active`, `merged`, `deleted`, `conflicted`
//! - [`BranchRegistry`] -- creation, lookup, status transitions and
//!   compare-and-swap head advancement

pub mod branch;
pub mod error;
pub mod names;
pub mod registry;

pub use branch::{Branch, BranchStatus, CowStats};
pub use error::{RefError, RefResult};
pub use names::validate_branch_name;
pub use registry::BranchRegistry;
