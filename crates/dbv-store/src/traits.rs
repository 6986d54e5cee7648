use dbv_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, StoredObject, Tree};

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same data always produces the
///   same hash, so writes are idempotent.
/// - Concurrent reads are always safe.
/// - The store never interprets object contents.
pub trait ObjectStore: Send + Sync {
    /// Read an object by hash. Returns `Ok(None)` if it does not exist.
    fn read(&self, id: &ContentHash) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content hash. Idempotent.
    fn write(&self, object: &StoredObject) -> StoreResult<ContentHash>;

    /// Check whether an object exists.
    fn exists(&self, id: &ContentHash) -> StoreResult<bool>;

    /// Read multiple objects in a batch.
    fn read_batch(&self, ids: &[ContentHash]) -> StoreResult<Vec<Option<StoredObject>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Store a definition as a blob and return its hash.
    fn put_definition(&self, definition: &str) -> StoreResult<ContentHash> {
        self.write(&Blob::new(definition).to_stored_object())
    }

    /// Load the definition text stored under `id`.
    fn definition(&self, id: &ContentHash) -> StoreResult<String> {
        let obj = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        Ok(Blob::from_stored_object(&obj)?.definition)
    }

    /// Store a tree and return its hash.
    fn put_tree(&self, tree: &Tree) -> StoreResult<ContentHash> {
        self.write(&tree.to_stored_object()?)
    }

    /// Load the tree stored under `id`.
    fn tree(&self, id: &ContentHash) -> StoreResult<Tree> {
        let obj = self.read(id)?.ok_or(StoreError::NotFound(*id))?;
        Tree::from_stored_object(&obj)
    }
}
