//! Content-addressed object storage for dbv.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. Object definitions (blobs) and snapshots of a
//! branch's object set (trees) are stored as immutable objects identified by
//! their BLAKE3 hash, domain-separated by object kind.
//!
//! # Object Types
//!
//! - [`Blob`] -- the normalized definition text of one schema object
//! - [`Tree`] -- a mapping from object path to blob hash at a point in time
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Write-then-link: write the object, then publish references to it.
//!    An unreferenced object is unobservable through branches and commits.
//! 3. Concurrent reads are always safe (objects are immutable).
//! 4. Objects are never deleted.

pub mod error;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryObjectStore;
pub use object::{Blob, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
