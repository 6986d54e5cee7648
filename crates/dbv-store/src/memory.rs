use std::collections::HashMap;
use std::sync::RwLock;

use dbv_types::ContentHash;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. All objects are held in memory behind a
/// `RwLock` for safe concurrent access. Objects are cloned on read/write.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ContentHash, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(StoredObject::size)
            .sum()
    }

    /// Sorted list of all stored hashes.
    pub fn all_ids(&self) -> Vec<ContentHash> {
        let map = self.objects.read().expect("lock poisoned");
        let mut ids: Vec<ContentHash> = map.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ContentHash) -> StoreResult<Option<StoredObject>> {
        let map = self.objects.read().expect("lock poisoned");
        match map.get(id) {
            Some(obj) => {
                let computed = obj.compute_id();
                if computed != *id {
                    return Err(StoreError::HashMismatch { id: *id, computed });
                }
                Ok(Some(obj.clone()))
            }
            None => Ok(None),
        }
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ContentHash> {
        let id = object.compute_id();
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(id).or_insert_with(|| {
            debug!(id = %id.short_hex(), kind = %object.kind, size = object.size(), "stored object");
            object.clone()
        });
        Ok(id)
    }

    fn exists(&self, id: &ContentHash) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Blob, ObjectKind, Tree, TreeEntry};
    use dbv_types::ObjectType;

    #[test]
    fn put_and_read_definition() {
        let store = InMemoryObjectStore::new();
        let id = store.put_definition("CREATE TABLE app.users (id bigint);").unwrap();
        assert_eq!(
            store.definition(&id).unwrap(),
            "CREATE TABLE app.users (id bigint)"
        );
    }

    #[test]
    fn put_and_read_tree() {
        let store = InMemoryObjectStore::new();
        let blob = store.put_definition("SELECT 1").unwrap();
        let tree = Tree::new(vec![TreeEntry::new("view/app.v", ObjectType::View, blob)]).unwrap();
        let id = store.put_tree(&tree).unwrap();
        assert_eq!(store.tree(&id).unwrap(), tree);
        assert_eq!(id, tree.hash().unwrap());
    }

    #[test]
    fn same_content_is_deduplicated() {
        let store = InMemoryObjectStore::new();
        let a = store.put_definition("SELECT 1").unwrap();
        let b = store.put_definition("SELECT 1;\n").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn different_content_produces_different_ids() {
        let store = InMemoryObjectStore::new();
        let a = store.put_definition("SELECT 1").unwrap();
        let b = store.put_definition("SELECT 2").unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn missing_object() {
        let store = InMemoryObjectStore::new();
        let id = ContentHash::from_bytes(b"missing");
        assert!(store.read(&id).unwrap().is_none());
        assert!(!store.exists(&id).unwrap());
        assert!(matches!(store.definition(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn read_batch_with_missing() {
        let store = InMemoryObjectStore::new();
        let present = store.put_definition("x").unwrap();
        let results = store
            .read_batch(&[present, ContentHash::from_bytes(b"nope")])
            .unwrap();
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }

    #[test]
    fn reading_a_tree_as_definition_is_corrupt() {
        let store = InMemoryObjectStore::new();
        let id = store.put_tree(&Tree::empty()).unwrap();
        assert!(matches!(
            store.definition(&id),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn total_bytes_and_ids() {
        let store = InMemoryObjectStore::new();
        store.write(&Blob::new("12345").to_stored_object()).unwrap();
        store
            .write(&StoredObject::new(ObjectKind::Blob, b"123456789".to_vec()))
            .unwrap();
        assert_eq!(store.total_bytes(), 14);
        let ids = store.all_ids();
        assert!(ids.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryObjectStore::new());
        let id = store.put_definition("shared").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    assert_eq!(store.definition(&id).unwrap(), "shared");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("object_count"));
    }
}
