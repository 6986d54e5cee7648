use dbv_types::ContentHash;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"dbv-blob-v1"`) that is
/// prepended to every hash computation, so a blob and a tree with identical
/// bytes produce different hashes.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for object definitions.
    pub const BLOB: Self = Self {
        domain: "dbv-blob-v1",
    };
    /// Hasher for tree snapshots.
    pub const TREE: Self = Self {
        domain: "dbv-tree-v1",
    };
    /// Hasher for commits.
    pub const COMMIT: Self = Self {
        domain: "dbv-commit-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<ContentHash, HasherError> {
        let data =
            serde_json::to_vec(value).map_err(|e| HasherError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HasherError {
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"CREATE TABLE app.users (id bigint)";
        assert_eq!(ContentHasher::BLOB.hash(data), ContentHasher::BLOB.hash(data));
    }

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let blob = ContentHasher::BLOB.hash(data);
        let tree = ContentHasher::TREE.hash(data);
        let commit = ContentHasher::COMMIT.hash(data);
        assert_ne!(blob, tree);
        assert_ne!(blob, commit);
        assert_ne!(tree, commit);
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::BLOB.hash(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &id));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_is_stable() {
        let value = serde_json::json!({"tree": "abc", "message": "init"});
        let a = ContentHasher::COMMIT.hash_json(&value).unwrap();
        let b = ContentHasher::COMMIT.hash_json(&value).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("dbv-test-v1");
        assert_eq!(hasher.domain(), "dbv-test-v1");
        assert_ne!(hasher.hash(b"data"), ContentHasher::BLOB.hash(b"data"));
    }
}
