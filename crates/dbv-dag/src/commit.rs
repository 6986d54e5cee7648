use dbv_crypto::ContentHasher;
use dbv_types::{ContentHash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{DagError, DagResult};

/// An immutable node in the commit graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: ContentHash,
    /// Parent commits. Empty only for a root commit; two or more only for
    /// merge commits, where the first parent is the branch merged into.
    pub parents: Vec<ContentHash>,
    pub tree: ContentHash,
    pub author: String,
    pub timestamp: Timestamp,
    pub message: String,
}

/// The hashed portion of a commit, in a fixed field order.
#[derive(Serialize)]
struct CommitContent<'a> {
    tree: &'a ContentHash,
    parents: &'a [ContentHash],
    author: &'a str,
    timestamp: &'a Timestamp,
    message: &'a str,
}

impl Commit {
    /// Build a commit and compute its hash.
    pub fn new(
        parents: Vec<ContentHash>,
        tree: ContentHash,
        author: impl Into<String>,
        timestamp: Timestamp,
        message: impl Into<String>,
    ) -> DagResult<Self> {
        let author = author.into();
        let message = message.into();
        let hash = compute_commit_hash(&tree, &parents, &author, &timestamp, &message)?;
        Ok(Self {
            hash,
            parents,
            tree,
            author,
            timestamp,
            message,
        })
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// The first parent, i.e. the previous head of the branch this commit
    /// was made on.
    pub fn first_parent(&self) -> Option<&ContentHash> {
        self.parents.first()
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> DagResult<()> {
        let computed = compute_commit_hash(
            &self.tree,
            &self.parents,
            &self.author,
            &self.timestamp,
            &self.message,
        )?;
        if computed != self.hash {
            return Err(DagError::HashMismatch {
                expected: self.hash,
                computed,
            });
        }
        Ok(())
    }

    /// One-line summary, e.g. `3fa9c1d2 add users table`.
    pub fn summary(&self) -> String {
        let first_line = self.message.lines().next().unwrap_or_default();
        format!("{} {}", self.hash.short_hex(), first_line)
    }
}

fn compute_commit_hash(
    tree: &ContentHash,
    parents: &[ContentHash],
    author: &str,
    timestamp: &Timestamp,
    message: &str,
) -> DagResult<ContentHash> {
    let content = CommitContent {
        tree,
        parents,
        author,
        timestamp,
        message,
    };
    ContentHasher::COMMIT
        .hash_json(&content)
        .map_err(|e| DagError::Serialization(e.to_string()))
}
