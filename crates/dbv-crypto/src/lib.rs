//! Hashing primitives for dbv.
//!
//! Provides domain-separated BLAKE3 hashing for blobs, trees and commits,
//! and the normalization applied to object definitions before they are
//! hashed, so that cosmetic edits do not produce new versions.
//!
//! All hashing wraps `blake3`; there is no custom cryptography here.

pub mod hasher;
pub mod normalize;

pub use hasher::{ContentHasher, HasherError};
pub use normalize::{compute_hash, normalize_definition};
