use dbv_types::{ChangeKind, ContentHash, ObjectId, ObjectKey, SemVer, Severity, Timestamp};
use serde::{Deserialize, Serialize};

/// Immutable record of one change to one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the ledger-wide history, starting at 1.
    pub seq: u64,
    pub object: ObjectId,
    /// The object's key after the change.
    pub key: ObjectKey,
    pub branch: String,
    pub kind: ChangeKind,
    pub severity: Severity,
    /// `None` for the entry that creates the object.
    pub before_version: Option<SemVer>,
    pub after_version: SemVer,
    pub before_hash: Option<ContentHash>,
    pub after_hash: Option<ContentHash>,
    /// The commit that produced this change.
    pub commit: ContentHash,
    pub timestamp: Timestamp,
}

impl HistoryEntry {
    /// `true` if the entry introduced the object (from nothing).
    pub fn introduced(&self) -> bool {
        self.before_hash.is_none() && self.after_hash.is_some()
    }

    /// `true` if the entry removed the object.
    pub fn removed(&self) -> bool {
        self.before_hash.is_some() && self.after_hash.is_none()
    }
}

/// One page of an object's history, newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<HistoryEntry>,
    /// Zero-based page index.
    pub page: usize,
    pub page_size: usize,
    /// Total entries for the object across all pages.
    pub total: usize,
}

impl HistoryPage {
    pub fn has_more(&self) -> bool {
        self.page
            .checked_add(1)
            .and_then(|next| next.checked_mul(self.page_size))
            .is_some_and(|seen| seen < self.total)
    }
}
