//! Commit graph for dbv.
//!
//! Every change to a branch is recorded as an immutable [`Commit`] that
//! references a tree snapshot and one or more parent commits. Commits form
//! an append-only DAG; branch heads point into it.
//!
//! # Key Types
//!
//! - [`Commit`] -- immutable commit node with a deterministic hash
//! - [`CommitGraph`] -- the DAG with ancestry, merge-base and log queries
//! - [`DagError`] -- errors from graph operations
//!
//! # Invariants
//!
//! - A commit's hash is a pure function of its tree, parents, author,
//!   timestamp and message.
//! - Every parent reference resolves to a commit already in the graph.
//! - Commits are never removed or rewritten.

pub mod commit;
pub mod error;
pub mod graph;

pub use commit::Commit;
pub use error::{DagError, DagResult};
pub use graph::CommitGraph;
