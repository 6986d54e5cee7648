use std::collections::BTreeMap;

use dbv_crypto::{normalize_definition, ContentHasher};
use dbv_types::{ContentHash, ObjectType};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Normalized definition text of one schema object.
    Blob,
    /// Snapshot mapping object paths to blob hashes.
    Tree,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
        }
    }
}

/// A stored object: kind tag + serialized data.
///
/// The store never interprets the data; it is keyed purely by content hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Compute the content-addressed hash using the kind's hash domain.
    pub fn compute_id(&self) -> ContentHash {
        let hasher = match self.kind {
            ObjectKind::Blob => &ContentHasher::BLOB,
            ObjectKind::Tree => &ContentHasher::TREE,
        };
        hasher.hash(&self.data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// The definition of one schema object at one point in time.
///
/// Definitions are normalized on construction, so a blob's hash equals
/// `dbv_crypto::compute_hash` of the raw definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub definition: String,
}

impl Blob {
    /// Create a blob from raw definition text (normalized here).
    pub fn new(definition: &str) -> Self {
        Self {
            definition: normalize_definition(definition),
        }
    }

    pub fn to_stored_object(&self) -> StoredObject {
        StoredObject::new(ObjectKind::Blob, self.definition.as_bytes().to_vec())
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Blob {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected blob, got {}", obj.kind),
            });
        }
        let definition = String::from_utf8(obj.data.clone()).map_err(|e| {
            StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("blob is not UTF-8: {e}"),
            }
        })?;
        Ok(Self { definition })
    }

    /// The content hash this blob is stored under.
    pub fn hash(&self) -> ContentHash {
        self.to_stored_object().compute_id()
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A single entry in a tree: one live object on a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Object path, `"{type}/{schema}.{name}"`.
    pub path: String,
    pub object_type: ObjectType,
    /// Hash of the object's definition blob.
    pub blob: ContentHash,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, object_type: ObjectType, blob: ContentHash) -> Self {
        Self {
            path: path.into(),
            object_type,
            blob,
        }
    }
}

/// A snapshot of a branch's live object set.
///
/// Entries are kept sorted by path so that equal snapshots serialize (and
/// therefore hash) identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Build a tree, sorting entries by path and rejecting duplicates.
    pub fn new(mut entries: Vec<TreeEntry>) -> StoreResult<Self> {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        if let Some(pair) = entries.windows(2).find(|w| w[0].path == w[1].path) {
            return Err(StoreError::DuplicatePath(pair[0].path.clone()));
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&TreeEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Blob hash at `path`, if present.
    pub fn blob_at(&self, path: &str) -> Option<ContentHash> {
        self.get(path).map(|e| e.blob)
    }

    /// Insert or replace the entry at `entry.path`.
    pub fn upsert(&mut self, entry: TreeEntry) {
        match self
            .entries
            .binary_search_by(|e| e.path.as_str().cmp(&entry.path))
        {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Remove the entry at `path`, returning it if it existed.
    pub fn remove(&mut self, path: &str) -> Option<TreeEntry> {
        self.entries
            .binary_search_by(|e| e.path.as_str().cmp(path))
            .ok()
            .map(|i| self.entries.remove(i))
    }

    /// Path -> entry map, for set comparisons.
    pub fn to_map(&self) -> BTreeMap<&str, &TreeEntry> {
        self.entries.iter().map(|e| (e.path.as_str(), e)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data =
            serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Tree, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Tree {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected tree, got {}", obj.kind),
            });
        }
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// The content hash this tree is stored under.
    pub fn hash(&self) -> StoreResult<ContentHash> {
        Ok(self.to_stored_object()?.compute_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, def: &str) -> TreeEntry {
        TreeEntry::new(path, ObjectType::Table, Blob::new(def).hash())
    }

    #[test]
    fn blob_normalizes_definition() {
        let blob = Blob::new("CREATE TABLE t (id int);\n\n");
        assert_eq!(blob.definition, "CREATE TABLE t (id int)");
        assert_eq!(blob.hash(), dbv_crypto::compute_hash("CREATE TABLE t (id int)"));
    }

    #[test]
    fn blob_kind_mismatch() {
        let stored = StoredObject::new(ObjectKind::Tree, b"not a blob".to_vec());
        let err = Blob::from_stored_object(&stored).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn tree_entries_sorted() {
        let tree = Tree::new(vec![
            entry("table/app.zebra", "z"),
            entry("table/app.alpha", "a"),
            entry("table/app.middle", "m"),
        ])
        .unwrap();
        let paths: Vec<&str> = tree.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["table/app.alpha", "table/app.middle", "table/app.zebra"]);
    }

    #[test]
    fn tree_rejects_duplicate_paths() {
        let err = Tree::new(vec![entry("table/app.a", "1"), entry("table/app.a", "2")]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePath(p) if p == "table/app.a"));
    }

    #[test]
    fn tree_hash_independent_of_insertion_order() {
        let a = Tree::new(vec![entry("table/app.a", "1"), entry("table/app.b", "2")]).unwrap();
        let mut b = Tree::empty();
        b.upsert(entry("table/app.b", "2"));
        b.upsert(entry("table/app.a", "1"));
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn tree_upsert_and_remove() {
        let mut tree = Tree::empty();
        tree.upsert(entry("table/app.a", "1"));
        tree.upsert(entry("table/app.a", "2"));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.blob_at("table/app.a"), Some(Blob::new("2").hash()));
        assert!(tree.remove("table/app.a").is_some());
        assert!(tree.remove("table/app.a").is_none());
        assert!(tree.is_empty());
    }

    #[test]
    fn tree_stored_roundtrip() {
        let tree = Tree::new(vec![entry("view/app.v", "SELECT 1")]).unwrap();
        let stored = tree.to_stored_object().unwrap();
        assert_eq!(Tree::from_stored_object(&stored).unwrap(), tree);
    }

    #[test]
    fn different_kinds_produce_different_ids() {
        let data = b"same data".to_vec();
        let blob = StoredObject::new(ObjectKind::Blob, data.clone());
        let tree = StoredObject::new(ObjectKind::Tree, data);
        assert_ne!(blob.compute_id(), tree.compute_id());
    }
}
