use dbv_types::{ContentHash, ObjectId, ObjectKey, SemVer, Timestamp};
use serde::{Deserialize, Serialize};

/// A schema object tracked on one branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub id: ObjectId,
    pub key: ObjectKey,
    pub branch: String,
    /// Containing object, e.g. the table of a column.
    pub parent: Option<ObjectId>,
    /// Hash of the current (or, when inactive, last) definition.
    pub content_hash: Option<ContentHash>,
    pub definition: Option<String>,
    pub version: SemVer,
    /// Incremented by exactly one on every version change.
    pub change_count: u64,
    /// `false` once dropped. Inactive objects keep their id and history.
    pub active: bool,
    /// The object this one was copied from when its branch was forked.
    pub origin: Option<ObjectId>,
}

impl SchemaObject {
    /// Tree path, `"{type}/{schema}.{name}"`.
    pub fn path(&self) -> String {
        self.key.path()
    }

    /// `true` once content has been recorded for the object.
    pub fn is_materialized(&self) -> bool {
        self.content_hash.is_some()
    }

    /// Live on its branch: active with recorded content.
    pub fn is_live(&self) -> bool {
        self.active && self.content_hash.is_some()
    }
}

/// What a change produces: the new content (or none, for a removal) and
/// the commit that carries it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    /// `None` removes the object from its branch (inactive).
    pub content: Option<(ContentHash, String)>,
    pub commit: ContentHash,
    pub timestamp: Timestamp,
}

impl Revision {
    /// A revision that sets new content.
    pub fn content(
        hash: ContentHash,
        definition: impl Into<String>,
        commit: ContentHash,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            content: Some((hash, definition.into())),
            commit,
            timestamp,
        }
    }

    /// A revision that removes the object.
    pub fn removal(commit: ContentHash, timestamp: Timestamp) -> Self {
        Self {
            content: None,
            commit,
            timestamp,
        }
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        self.content.as_ref().map(|(h, _)| *h)
    }
}
