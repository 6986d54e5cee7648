use dbv_types::ContentHash;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ContentHash),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: ContentHash, computed: ContentHash },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The object data is malformed or has the wrong kind.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ContentHash, reason: String },

    /// A tree was built with two entries for the same path.
    #[error("duplicate tree path: {0}")]
    DuplicatePath(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
