//! Foundation types for dbv, version control for database schema objects.
//!
//! This crate provides the identity, hashing, versioning, and temporal types
//! shared by every other dbv crate.
//!
//! # Key Types
//!
//! - [`ContentHash`]: Content-addressed digest (BLAKE3, 64 hex characters)
//! - [`ObjectId`]: Arena index of a schema object under version control
//! - [`ObjectType`] / [`ObjectKey`]: What an object is and how it is named
//! - [`SemVer`] / [`Severity`]: Semantic version triple and bump severity
//! - [`ChangeKind`]: What happened to an object in a history entry
//! - [`Timestamp`]: Monotonic wall-clock timestamp for commit ordering

pub mod error;
pub mod hash;
pub mod object;
pub mod temporal;
pub mod version;

pub use error::TypeError;
pub use hash::ContentHash;
pub use object::{ObjectId, ObjectKey, ObjectType};
pub use temporal::Timestamp;
pub use version::{ChangeKind, SemVer, Severity};
