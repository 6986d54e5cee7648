//! Version ledger for dbv.
//!
//! Tracks every schema object on every branch with a semantic version and
//! an opaque change counter, and records each change as an immutable
//! [`HistoryEntry`]. Objects are never removed: dropping one clears its
//! active flag so its history stays continuous.
//!
//! # Key Types
//!
//! - [`SchemaObject`] -- identity `(type, schema, name, branch)` plus current state
//! - [`HistoryEntry`] -- one append-only change record
//! - [`VersionLedger`] -- `ensure_object`, `increment_version`, queries
//! - [`Revision`] -- the content and commit a change produces

pub mod error;
pub mod history;
pub mod ledger;
pub mod object;

pub use error::{LedgerError, LedgerResult};
pub use history::{HistoryEntry, HistoryPage};
pub use ledger::VersionLedger;
pub use object::{Revision, SchemaObject};
