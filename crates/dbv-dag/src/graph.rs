//! The append-only commit DAG and its traversal algorithms.
//!
//! [`CommitGraph`] stores commits in a [`HashMap`] and maintains a
//! forward-edge index (`children`) for descendant queries. Root commits are
//! tracked separately.

use std::collections::{HashMap, HashSet, VecDeque};

use dbv_types::ContentHash;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commit::Commit;
use crate::error::{DagError, DagResult};

/// The commit graph shared by every branch in a repository.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommitGraph {
    commits: HashMap<ContentHash, Commit>,
    /// Forward-edge index: parent -> children.
    children: HashMap<ContentHash, Vec<ContentHash>>,
    roots: Vec<ContentHash>,
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Append a commit.
    ///
    /// Every parent must already be in the graph and no parent may be
    /// timestamped after the commit. Appending a commit whose hash is
    /// already present is a no-op, so re-applying the same change is
    /// idempotent.
    pub fn add_commit(&mut self, commit: Commit) -> DagResult<()> {
        commit.verify()?;
        if self.commits.contains_key(&commit.hash) {
            debug!(commit = %commit.hash.short_hex(), "commit already present");
            return Ok(());
        }

        for parent in &commit.parents {
            let Some(p) = self.commits.get(parent) else {
                return Err(DagError::DanglingParent {
                    commit: commit.hash,
                    parent: *parent,
                });
            };
            if commit.timestamp.is_before(&p.timestamp) {
                return Err(DagError::TemporalViolation {
                    child: commit.hash,
                    parent: *parent,
                });
            }
        }

        for parent in &commit.parents {
            self.children.entry(*parent).or_default().push(commit.hash);
        }
        if commit.is_root() {
            self.roots.push(commit.hash);
        }

        debug!(
            commit = %commit.hash.short_hex(),
            parents = commit.parents.len(),
            tree = %commit.tree.short_hex(),
            "appended commit"
        );
        self.commits.insert(commit.hash, commit);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    pub fn get(&self, hash: &ContentHash) -> Option<&Commit> {
        self.commits.get(hash)
    }

    /// Like [`get`](Self::get) but returns `CommitNotFound` when missing.
    pub fn require(&self, hash: &ContentHash) -> DagResult<&Commit> {
        self.commits
            .get(hash)
            .ok_or(DagError::CommitNotFound(*hash))
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.commits.contains_key(hash)
    }

    pub fn roots(&self) -> Vec<&Commit> {
        self.roots
            .iter()
            .filter_map(|h| self.commits.get(h))
            .collect()
    }

    /// Direct children of a commit.
    pub fn children(&self, hash: &ContentHash) -> Vec<&Commit> {
        self.children
            .get(hash)
            .map(|ids| ids.iter().filter_map(|h| self.commits.get(h)).collect())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// Every commit reachable from `hash` through parent edges, including
    /// `hash` itself. Empty if `hash` is unknown.
    pub fn ancestors(&self, hash: &ContentHash) -> HashSet<ContentHash> {
        let mut visited = HashSet::new();
        if !self.commits.contains_key(hash) {
            return visited;
        }
        let mut queue = VecDeque::new();
        visited.insert(*hash);
        queue.push_back(*hash);

        while let Some(current) = queue.pop_front() {
            if let Some(commit) = self.commits.get(&current) {
                for parent in &commit.parents {
                    if visited.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }
        visited
    }

    /// `true` if `ancestor` is reachable from `descendant` (a commit is its
    /// own ancestor).
    pub fn is_ancestor(&self, ancestor: &ContentHash, descendant: &ContentHash) -> bool {
        if ancestor == descendant {
            return self.contains(ancestor);
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([*descendant]);
        while let Some(current) = queue.pop_front() {
            let Some(commit) = self.commits.get(&current) else {
                continue;
            };
            for parent in &commit.parents {
                if parent == ancestor {
                    return true;
                }
                if visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }
        false
    }

    /// The best common ancestor of two commits.
    ///
    /// Candidates are the common ancestors that are not themselves ancestors
    /// of another common ancestor. Among several, the latest timestamp wins
    /// and ties are broken by the larger hash.
    pub fn merge_base(&self, a: &ContentHash, b: &ContentHash) -> Option<&Commit> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        if a == b {
            return self.commits.get(a);
        }

        let ancestors_a = self.ancestors(a);
        let ancestors_b = self.ancestors(b);
        let common: HashSet<ContentHash> =
            ancestors_a.intersection(&ancestors_b).copied().collect();

        let mut dominated = HashSet::new();
        for hash in &common {
            if let Some(commit) = self.commits.get(hash) {
                for parent in &commit.parents {
                    dominated.extend(self.ancestors(parent));
                }
            }
        }

        common
            .iter()
            .filter(|h| !dominated.contains(*h))
            .filter_map(|h| self.commits.get(h))
            .max_by(|x, y| x.timestamp.cmp(&y.timestamp).then(x.hash.cmp(&y.hash)))
    }

    // ---------------------------------------------------------------
    // Logs
    // ---------------------------------------------------------------

    /// Follow first parents from `head`, newest first, up to `limit` commits.
    pub fn log(&self, head: &ContentHash, limit: usize) -> Vec<&Commit> {
        let mut result = Vec::new();
        let mut current = self.commits.get(head);
        while let Some(commit) = current {
            if result.len() >= limit {
                break;
            }
            result.push(commit);
            current = commit.first_parent().and_then(|p| self.commits.get(p));
        }
        result
    }

    /// The full first-parent chain from `head` back to its root.
    pub fn first_parent_chain(&self, head: &ContentHash) -> Vec<&Commit> {
        self.log(head, usize::MAX)
    }

    /// Every commit in topological order (parents before children).
    ///
    /// Kahn's algorithm; ties are broken by timestamp, then hash, so the
    /// order is deterministic.
    pub fn topological_order(&self) -> Vec<&Commit> {
        let mut in_degree: HashMap<ContentHash, usize> = self
            .commits
            .values()
            .map(|c| (c.hash, c.parents.len()))
            .collect();

        let mut ready: Vec<&Commit> = self
            .commits
            .values()
            .filter(|c| c.parents.is_empty())
            .collect();
        let mut result = Vec::with_capacity(self.commits.len());

        while !ready.is_empty() {
            // Pop the earliest ready commit.
            ready.sort_by(|x, y| y.timestamp.cmp(&x.timestamp).then(y.hash.cmp(&x.hash)));
            let Some(commit) = ready.pop() else { break };
            result.push(commit);

            for child in self.children.get(&commit.hash).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        if let Some(c) = self.commits.get(child) {
                            ready.push(c);
                        }
                    }
                }
            }
        }
        result
    }

    // ---------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------

    /// Serialize the graph with bincode for backup tooling.
    pub fn to_bytes(&self) -> DagResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DagError::Serialization(e.to_string()))
    }

    /// Restore a graph produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> DagResult<Self> {
        let graph: Self =
            bincode::deserialize(bytes).map_err(|e| DagError::Serialization(e.to_string()))?;
        for commit in graph.commits.values() {
            commit.verify()?;
        }
        Ok(graph)
    }
}
