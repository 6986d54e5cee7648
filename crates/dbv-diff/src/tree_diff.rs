//! Tree-level diff: set comparison of two snapshots by path.
//!
//! A path present in both trees with a differing blob hash is *modified*,
//! present only in the old tree is *removed*, and present only in the new
//! tree is *added*.

use dbv_store::{ObjectStore, StoreError, Tree};
use dbv_types::{ContentHash, ObjectType};
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// A single change between two trees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum TreeChange {
    Added {
        path: String,
        object_type: ObjectType,
        new: ContentHash,
    },
    Removed {
        path: String,
        object_type: ObjectType,
        old: ContentHash,
    },
    Modified {
        path: String,
        object_type: ObjectType,
        old: ContentHash,
        new: ContentHash,
    },
}

impl TreeChange {
    pub fn path(&self) -> &str {
        match self {
            Self::Added { path, .. } | Self::Removed { path, .. } | Self::Modified { path, .. } => {
                path
            }
        }
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            Self::Added { object_type, .. }
            | Self::Removed { object_type, .. }
            | Self::Modified { object_type, .. } => *object_type,
        }
    }

    /// Blob hash before the change (`None` for additions).
    pub fn old_hash(&self) -> Option<ContentHash> {
        match self {
            Self::Added { .. } => None,
            Self::Removed { old, .. } | Self::Modified { old, .. } => Some(*old),
        }
    }

    /// Blob hash after the change (`None` for removals).
    pub fn new_hash(&self) -> Option<ContentHash> {
        match self {
            Self::Removed { .. } => None,
            Self::Added { new, .. } | Self::Modified { new, .. } => Some(*new),
        }
    }
}

/// The result of comparing two trees, grouped by change kind.
///
/// Each list is sorted by path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    pub added: Vec<TreeChange>,
    pub removed: Vec<TreeChange>,
    pub modified: Vec<TreeChange>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of changed paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// All changes in path order.
    pub fn changes(&self) -> Vec<&TreeChange> {
        let mut all: Vec<&TreeChange> = self
            .added
            .iter()
            .chain(&self.removed)
            .chain(&self.modified)
            .collect();
        all.sort_by(|a, b| a.path().cmp(b.path()));
        all
    }
}

/// Compare two trees given directly (no store needed).
pub fn diff_trees(old: &Tree, new: &Tree) -> TreeDiff {
    let old_map = old.to_map();
    let new_map = new.to_map();
    let mut diff = TreeDiff::default();

    for (path, old_entry) in &old_map {
        match new_map.get(path) {
            Some(new_entry) if new_entry.blob != old_entry.blob => {
                diff.modified.push(TreeChange::Modified {
                    path: path.to_string(),
                    object_type: new_entry.object_type,
                    old: old_entry.blob,
                    new: new_entry.blob,
                });
            }
            Some(_) => {}
            None => diff.removed.push(TreeChange::Removed {
                path: path.to_string(),
                object_type: old_entry.object_type,
                old: old_entry.blob,
            }),
        }
    }

    for (path, new_entry) in &new_map {
        if !old_map.contains_key(path) {
            diff.added.push(TreeChange::Added {
                path: path.to_string(),
                object_type: new_entry.object_type,
                new: new_entry.blob,
            });
        }
    }

    diff
}

/// Compare two trees by hash, loading them from the store.
///
/// `None` for `old` means the empty tree (e.g. a branch's first commit).
pub fn diff_tree_ids(
    store: &dyn ObjectStore,
    old: Option<&ContentHash>,
    new: &ContentHash,
) -> DiffResult<TreeDiff> {
    let old_tree = match old {
        Some(id) => load_tree(store, id)?,
        None => Tree::empty(),
    };
    let new_tree = load_tree(store, new)?;
    Ok(diff_trees(&old_tree, &new_tree))
}

pub(crate) fn load_tree(store: &dyn ObjectStore, id: &ContentHash) -> DiffResult<Tree> {
    store.tree(id).map_err(|e| match e {
        StoreError::NotFound(id) => DiffError::TreeNotFound(id),
        other => DiffError::Store(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbv_store::{InMemoryObjectStore, TreeEntry};

    fn h(b: u8) -> ContentHash {
        ContentHash::from_hash([b; 32])
    }

    fn tree(entries: &[(&str, u8)]) -> Tree {
        Tree::new(
            entries
                .iter()
                .map(|(p, b)| TreeEntry::new(*p, ObjectType::Table, h(*b)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn empty_to_populated_all_additions() {
        let diff = diff_trees(&Tree::empty(), &tree(&[("table/a.x", 1), ("table/a.y", 2)]));
        assert_eq!(diff.added.len(), 2);
        assert!(diff.removed.is_empty() && diff.modified.is_empty());
    }

    #[test]
    fn populated_to_empty_all_removals() {
        let diff = diff_trees(&tree(&[("table/a.x", 1), ("table/a.y", 2)]), &Tree::empty());
        assert_eq!(diff.removed.len(), 2);
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn identical_trees_no_changes() {
        let t = tree(&[("table/a.x", 1)]);
        assert!(diff_trees(&t, &t).is_empty());
    }

    #[test]
    fn mixed_changes() {
        let old = tree(&[("table/a.keep", 1), ("table/a.gone", 2), ("table/a.edit", 3)]);
        let new = tree(&[("table/a.keep", 1), ("table/a.edit", 4), ("table/a.new", 5)]);
        let diff = diff_trees(&old, &new);

        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].path(), "table/a.new");
        assert_eq!(diff.removed.len(), 1);
        assert_eq!(diff.removed[0].old_hash(), Some(h(2)));
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].old_hash(), Some(h(3)));
        assert_eq!(diff.modified[0].new_hash(), Some(h(4)));

        let paths: Vec<&str> = diff.changes().iter().map(|c| c.path()).collect();
        assert_eq!(paths, vec!["table/a.edit", "table/a.gone", "table/a.new"]);
    }

    #[test]
    fn diff_by_id_through_store() {
        let store = InMemoryObjectStore::new();
        let new = tree(&[("table/a.x", 1)]);
        let new_id = store.put_tree(&new).unwrap();
        let diff = diff_tree_ids(&store, None, &new_id).unwrap();
        assert_eq!(diff.added.len(), 1);
    }

    #[test]
    fn missing_tree_is_reported() {
        let store = InMemoryObjectStore::new();
        let err = diff_tree_ids(&store, None, &h(9)).unwrap_err();
        assert!(matches!(err, DiffError::TreeNotFound(id) if id == h(9)));
    }
}
