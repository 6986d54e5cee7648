//! Dependency graph between schema objects.
//!
//! Edges point from a dependent object to the object it depends on
//! (`view -> table`). The graph is an arena: objects are mapped to dense
//! node indices and edges are stored as adjacency lists in both
//! directions, so traversals are iterative and never recurse.
//!
//! # Key Types
//!
//! - [`DependencyGraph`] -- edges, cycle detection, topological ordering
//! - [`DependencyKind`] -- structural, functional or ownership edge
//! - [`DependencyEdge`] -- one `(dependent, depends_on, kind)` triple

pub mod error;
pub mod graph;

pub use error::{DepsError, DepsResult};
pub use graph::{DependencyEdge, DependencyGraph, DependencyKind};
