//! Diff engine for dbv.
//!
//! Compares snapshots of a branch's object set and object definitions.
//!
//! # Key Types
//!
//! - [`TreeDiff`] / [`TreeChange`] -- added/removed/modified paths between two trees
//! - [`BranchDiff`] / [`PathStatus`] -- per-path classification of two branches
//!   against their merge base, including CONFLICT
//! - [`DefinitionDiff`] / [`DiffHunk`] / [`DiffLine`] -- line-level definition diff

pub mod branch_diff;
pub mod definition_diff;
pub mod error;
pub mod tree_diff;

pub use branch_diff::{diff_branches, BranchDiff, PathDiff, PathStatus};
pub use definition_diff::{diff_definitions, DefinitionDiff, DiffHunk, DiffLine};
pub use error::{DiffError, DiffResult};
pub use tree_diff::{diff_tree_ids, diff_trees, TreeChange, TreeDiff};
