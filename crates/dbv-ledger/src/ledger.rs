//! The version ledger: object arena, per-branch identity index and the
//! append-only history.

use std::collections::HashMap;

use dbv_types::{ChangeKind, ContentHash, ObjectId, ObjectKey, SemVer, Severity};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::history::{HistoryEntry, HistoryPage};
use crate::object::{Revision, SchemaObject};

/// Semantic versions and change history for every object on every branch.
///
/// Object ids are arena indices. The identity `(branch, key)` maps to at
/// most one id; history entries are only ever appended.
#[derive(Clone, Debug, Default)]
pub struct VersionLedger {
    objects: Vec<SchemaObject>,
    index: HashMap<String, HashMap<ObjectKey, ObjectId>>,
    history: Vec<HistoryEntry>,
    by_object: HashMap<ObjectId, Vec<usize>>,
    by_commit: HashMap<ContentHash, Vec<usize>>,
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    /// Get or create the object `key` on `branch`.
    ///
    /// A new object starts at version 1.0.0 with a change count of zero
    /// and no content until [`record_creation`](Self::record_creation).
    pub fn ensure_object(
        &mut self,
        branch: &str,
        key: ObjectKey,
        parent: Option<ObjectId>,
    ) -> LedgerResult<ObjectId> {
        if let Some(id) = self.find(branch, &key) {
            return Ok(id);
        }
        if let Some(parent) = parent {
            match self.get(parent) {
                Some(p) if p.branch == branch => {}
                _ => {
                    return Err(LedgerError::InvalidParent {
                        branch: branch.to_string(),
                        key,
                        parent,
                    })
                }
            }
        }
        Ok(self.insert_object(branch, key, parent, None))
    }

    fn insert_object(
        &mut self,
        branch: &str,
        key: ObjectKey,
        parent: Option<ObjectId>,
        origin: Option<&SchemaObject>,
    ) -> ObjectId {
        let id = ObjectId::new(self.objects.len() as u64);
        let object = match origin {
            Some(o) => SchemaObject {
                id,
                key: key.clone(),
                branch: branch.to_string(),
                parent,
                content_hash: o.content_hash,
                definition: o.definition.clone(),
                version: o.version,
                change_count: o.change_count,
                active: o.active,
                origin: Some(o.id),
            },
            None => SchemaObject {
                id,
                key: key.clone(),
                branch: branch.to_string(),
                parent,
                content_hash: None,
                definition: None,
                version: SemVer::initial(),
                change_count: 0,
                active: true,
                origin: None,
            },
        };
        debug!(object = %id, key = %key, branch = %branch, "registered object");
        self.index
            .entry(branch.to_string())
            .or_default()
            .insert(key, id);
        self.objects.push(object);
        id
    }

    pub fn find(&self, branch: &str, key: &ObjectKey) -> Option<ObjectId> {
        self.index.get(branch).and_then(|m| m.get(key)).copied()
    }

    pub fn get(&self, id: ObjectId) -> Option<&SchemaObject> {
        self.objects.get(id.index() as usize)
    }

    /// Like [`get`](Self::get) but returns `ObjectNotFound` when missing.
    pub fn require(&self, id: ObjectId) -> LedgerResult<&SchemaObject> {
        self.get(id).ok_or(LedgerError::ObjectNotFound(id))
    }

    fn require_mut(&mut self, id: ObjectId) -> LedgerResult<&mut SchemaObject> {
        self.objects
            .get_mut(id.index() as usize)
            .ok_or(LedgerError::ObjectNotFound(id))
    }

    pub fn current_version(&self, id: ObjectId) -> LedgerResult<SemVer> {
        Ok(self.require(id)?.version)
    }

    /// Fail unless the object's change count equals `expected`.
    pub fn check_change_count(&self, id: ObjectId, expected: u64) -> LedgerResult<()> {
        let actual = self.require(id)?.change_count;
        if actual != expected {
            return Err(LedgerError::StaleChangeCount {
                object: id,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Live objects on a branch, sorted by path.
    pub fn live_objects(&self, branch: &str) -> Vec<&SchemaObject> {
        let mut live: Vec<&SchemaObject> = self
            .objects_on(branch)
            .into_iter()
            .filter(|o| o.is_live())
            .collect();
        live.sort_by_key(|o| o.path());
        live
    }

    /// Every object ever registered on a branch, in id order.
    pub fn objects_on(&self, branch: &str) -> Vec<&SchemaObject> {
        let mut ids: Vec<ObjectId> = self
            .index
            .get(branch)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids.into_iter().filter_map(|id| self.get(id)).collect()
    }

    /// Objects whose parent is `id`.
    pub fn members_of(&self, id: ObjectId) -> Vec<&SchemaObject> {
        self.objects.iter().filter(|o| o.parent == Some(id)).collect()
    }

    /// Copy every object of `from` onto the new branch `to`.
    ///
    /// Copies keep version, change count, content and active flag, and
    /// point back at their origin. Returns the number of live objects
    /// inherited.
    pub fn fork_branch(&mut self, from: &str, to: &str) -> u64 {
        let sources: Vec<SchemaObject> = self.objects_on(from).into_iter().cloned().collect();
        let mut remap: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut inherited = 0;
        for source in &sources {
            let parent = source.parent.and_then(|p| remap.get(&p).copied());
            let id = self.insert_object(to, source.key.clone(), parent, Some(source));
            remap.insert(source.id, id);
            if source.is_live() {
                inherited += 1;
            }
        }
        debug!(from = %from, to = %to, inherited, "forked ledger branch");
        inherited
    }

    // ---------------------------------------------------------------
    // Changes
    // ---------------------------------------------------------------

    /// Record the first content of an object. Its version stays 1.0.0.
    pub fn record_creation(&mut self, id: ObjectId, revision: Revision) -> LedgerResult<SemVer> {
        let object = self.require(id)?;
        if object.is_materialized() || self.by_object.contains_key(&id) {
            return Err(LedgerError::AlreadyCreated { object: id });
        }
        let version = object.version;
        self.apply(id, ChangeKind::Create, Severity::Major, None, version, revision)?;
        Ok(version)
    }

    /// Bump an object's version and append one history entry.
    ///
    /// MAJOR increments major and resets minor and patch; MINOR increments
    /// minor and resets patch; PATCH increments patch. The change count
    /// increases by one regardless of severity.
    pub fn increment_version(
        &mut self,
        id: ObjectId,
        kind: ChangeKind,
        severity: Severity,
        revision: Revision,
    ) -> LedgerResult<SemVer> {
        let before = self.require(id)?.version;
        let after = before.bump(severity);
        self.apply(id, kind, severity, Some(before), after, revision)?;
        Ok(after)
    }

    /// Rename an object on its branch and bump its version.
    pub fn rename(
        &mut self,
        id: ObjectId,
        new_key: ObjectKey,
        severity: Severity,
        revision: Revision,
    ) -> LedgerResult<SemVer> {
        let object = self.require(id)?;
        let branch = object.branch.clone();
        let old_key = object.key.clone();
        if let Some(existing) = self.find(&branch, &new_key) {
            if existing != id {
                return Err(LedgerError::AlreadyExists {
                    branch,
                    key: new_key,
                });
            }
        }

        if let Some(keys) = self.index.get_mut(&branch) {
            keys.remove(&old_key);
            keys.insert(new_key.clone(), id);
        }
        self.require_mut(id)?.key = new_key;
        self.increment_version(id, ChangeKind::Rename, severity, revision)
    }

    fn apply(
        &mut self,
        id: ObjectId,
        kind: ChangeKind,
        severity: Severity,
        before_version: Option<SemVer>,
        after_version: SemVer,
        revision: Revision,
    ) -> LedgerResult<()> {
        let seq = self.history.len() as u64 + 1;
        let after_hash = revision.content_hash();
        let object = self.require_mut(id)?;
        let before_hash = if object.active {
            object.content_hash
        } else {
            None
        };

        object.version = after_version;
        if before_version.is_some() {
            object.change_count += 1;
        }
        match revision.content {
            Some((hash, definition)) => {
                object.content_hash = Some(hash);
                object.definition = Some(definition);
                object.active = true;
            }
            None => object.active = false,
        }

        let entry = HistoryEntry {
            seq,
            object: id,
            key: object.key.clone(),
            branch: object.branch.clone(),
            kind,
            severity,
            before_version,
            after_version,
            before_hash,
            after_hash,
            commit: revision.commit,
            timestamp: revision.timestamp,
        };
        debug!(
            object = %id,
            kind = %kind.as_str(),
            version = %after_version,
            commit = %revision.commit.short_hex(),
            "recorded change"
        );

        let position = self.history.len();
        self.by_object.entry(id).or_default().push(position);
        self.by_commit
            .entry(revision.commit)
            .or_default()
            .push(position);
        self.history.push(entry);
        Ok(())
    }

    // ---------------------------------------------------------------
    // History queries
    // ---------------------------------------------------------------

    /// One page of an object's history, newest first. A page past the end
    /// (including one whose offset overflows) is empty.
    pub fn history(&self, id: ObjectId, page: usize, page_size: usize) -> LedgerResult<HistoryPage> {
        self.require(id)?;
        let page_size = page_size.max(1);
        let positions = self.by_object.get(&id).map(Vec::as_slice).unwrap_or(&[]);
        let offset = page.checked_mul(page_size).unwrap_or(usize::MAX);
        let entries = positions
            .iter()
            .rev()
            .skip(offset)
            .take(page_size)
            .map(|&i| self.history[i].clone())
            .collect();
        Ok(HistoryPage {
            entries,
            page,
            page_size,
            total: positions.len(),
        })
    }

    /// An object's complete history, oldest first.
    pub fn full_history(&self, id: ObjectId) -> Vec<&HistoryEntry> {
        self.by_object
            .get(&id)
            .map(|ps| ps.iter().map(|&i| &self.history[i]).collect())
            .unwrap_or_default()
    }

    /// The entries produced by one commit, in the order they were recorded.
    pub fn entries_for_commit(&self, commit: &ContentHash) -> Vec<&HistoryEntry> {
        self.by_commit
            .get(commit)
            .map(|ps| ps.iter().map(|&i| &self.history[i]).collect())
            .unwrap_or_default()
    }

    pub fn last_entry(&self, id: ObjectId) -> Option<&HistoryEntry> {
        self.by_object
            .get(&id)
            .and_then(|ps| ps.last())
            .map(|&i| &self.history[i])
    }

    /// Check sequence numbering and that each object's entries chain
    /// version to version.
    pub fn validate_history(&self) -> LedgerResult<()> {
        let mut last_version: HashMap<ObjectId, SemVer> = HashMap::new();
        for (i, entry) in self.history.iter().enumerate() {
            let expected_seq = i as u64 + 1;
            if entry.seq != expected_seq {
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq,
                    reason: format!("expected seq {expected_seq}"),
                });
            }
            let previous = last_version.get(&entry.object).copied();
            let chained = match (previous, entry.before_version) {
                (None, None) => true,
                (Some(prev), Some(before)) => prev == before,
                // Objects copied at fork time continue their origin's chain.
                (None, Some(_)) => self.get(entry.object).is_some_and(|o| o.origin.is_some()),
                (Some(_), None) => false,
            };
            if !chained {
                return Err(LedgerError::IntegrityViolation {
                    seq: entry.seq,
                    reason: format!("version chain broken for {}", entry.object),
                });
            }
            last_version.insert(entry.object, entry.after_version);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbv_types::{ObjectType, Timestamp};
    use proptest::prelude::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new(ObjectType::Table, "app", name).unwrap()
    }

    fn h(b: u8) -> ContentHash {
        ContentHash::from_hash([b; 32])
    }

    fn rev(content: u8, commit: u8) -> Revision {
        Revision::content(h(content), format!("def {content}"), h(commit), Timestamp::zero())
    }

    fn created(ledger: &mut VersionLedger, branch: &str, name: &str) -> ObjectId {
        let id = ledger.ensure_object(branch, key(name), None).unwrap();
        ledger.record_creation(id, rev(1, 100)).unwrap();
        id
    }

    // ---------------------------------------------------------------
    // ensure_object
    // ---------------------------------------------------------------

    #[test]
    fn ensure_object_is_idempotent() {
        let mut ledger = VersionLedger::new();
        let a = ledger.ensure_object("main", key("users"), None).unwrap();
        let b = ledger.ensure_object("main", key("users"), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(ledger.current_version(a).unwrap(), SemVer::new(1, 0, 0));
        assert_eq!(ledger.get(a).unwrap().change_count, 0);
    }

    #[test]
    fn identity_is_per_branch() {
        let mut ledger = VersionLedger::new();
        let a = ledger.ensure_object("main", key("users"), None).unwrap();
        let b = ledger.ensure_object("feature", key("users"), None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn parent_must_be_on_same_branch() {
        let mut ledger = VersionLedger::new();
        let table = ledger.ensure_object("main", key("users"), None).unwrap();
        let column = ObjectKey::new(ObjectType::Column, "app", "users.email").unwrap();
        assert!(ledger.ensure_object("main", column.clone(), Some(table)).is_ok());
        assert!(matches!(
            ledger.ensure_object("feature", column, Some(table)),
            Err(LedgerError::InvalidParent { .. })
        ));
        assert_eq!(ledger.members_of(table).len(), 1);
    }

    // ---------------------------------------------------------------
    // Versioning
    // ---------------------------------------------------------------

    #[test]
    fn creation_then_minor_alter() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        let v = ledger
            .increment_version(id, ChangeKind::Alter, Severity::Minor, rev(2, 101))
            .unwrap();
        assert_eq!(v, SemVer::new(1, 1, 0));

        let history = ledger.full_history(id);
        assert_eq!(history.len(), 2);
        let alter = history[1];
        assert_eq!(alter.before_version, Some(SemVer::new(1, 0, 0)));
        assert_eq!(alter.after_version, SemVer::new(1, 1, 0));
        assert_eq!(alter.before_hash, Some(h(1)));
        assert_eq!(alter.after_hash, Some(h(2)));
        assert_eq!(ledger.get(id).unwrap().change_count, 1);
    }

    #[test]
    fn creation_twice_rejected() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        assert!(matches!(
            ledger.record_creation(id, rev(3, 102)),
            Err(LedgerError::AlreadyCreated { .. })
        ));
    }

    #[test]
    fn drop_is_soft_and_reactivation_bumps_major() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        ledger
            .increment_version(
                id,
                ChangeKind::Drop,
                Severity::Major,
                Revision::removal(h(101), Timestamp::zero()),
            )
            .unwrap();
        let obj = ledger.get(id).unwrap();
        assert!(!obj.active);
        assert_eq!(obj.content_hash, Some(h(1)));
        assert!(ledger.live_objects("main").is_empty());

        let v = ledger
            .increment_version(id, ChangeKind::Create, Severity::Major, rev(4, 102))
            .unwrap();
        assert_eq!(v, SemVer::new(3, 0, 0));
        let last = ledger.last_entry(id).unwrap();
        assert_eq!(last.before_hash, None);
        assert!(last.introduced());
        assert_eq!(ledger.live_objects("main").len(), 1);
    }

    #[test]
    fn stale_change_count_detected() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        ledger.check_change_count(id, 0).unwrap();
        ledger
            .increment_version(id, ChangeKind::Alter, Severity::Patch, rev(2, 101))
            .unwrap();
        assert_eq!(
            ledger.check_change_count(id, 0),
            Err(LedgerError::StaleChangeCount {
                object: id,
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn rename_moves_identity() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        created(&mut ledger, "main", "taken");
        assert!(matches!(
            ledger.rename(id, key("taken"), Severity::Major, rev(5, 103)),
            Err(LedgerError::AlreadyExists { .. })
        ));
        let v = ledger
            .rename(id, key("accounts"), Severity::Major, rev(5, 103))
            .unwrap();
        assert_eq!(v, SemVer::new(2, 0, 0));
        assert_eq!(ledger.find("main", &key("accounts")), Some(id));
        assert_eq!(ledger.find("main", &key("users")), None);
        assert_eq!(ledger.last_entry(id).unwrap().kind, ChangeKind::Rename);
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    #[test]
    fn history_pages_newest_first() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        for i in 0..4 {
            ledger
                .increment_version(id, ChangeKind::Alter, Severity::Patch, rev(10 + i, 110 + i))
                .unwrap();
        }
        let first = ledger.history(id, 0, 2).unwrap();
        assert_eq!(first.total, 5);
        assert!(first.has_more());
        assert_eq!(first.entries[0].after_version, SemVer::new(1, 0, 4));
        let last = ledger.history(id, 2, 2).unwrap();
        assert_eq!(last.entries.len(), 1);
        assert_eq!(last.entries[0].kind, ChangeKind::Create);
        assert!(!last.has_more());
        assert!(ledger.history(ObjectId::new(99), 0, 2).is_err());
    }

    #[test]
    fn history_page_offset_overflow_is_empty() {
        let mut ledger = VersionLedger::new();
        let id = created(&mut ledger, "main", "users");
        let page = ledger.history(id, usize::MAX, 2).unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total, 1);
        assert!(!page.has_more());
        assert!(ledger.history(id, 2, usize::MAX).unwrap().entries.is_empty());
    }

    #[test]
    fn entries_by_commit() {
        let mut ledger = VersionLedger::new();
        let a = created(&mut ledger, "main", "a");
        let b = created(&mut ledger, "main", "b");
        assert_eq!(ledger.entries_for_commit(&h(100)).len(), 2);
        ledger
            .increment_version(a, ChangeKind::Alter, Severity::Minor, rev(2, 200))
            .unwrap();
        ledger
            .increment_version(b, ChangeKind::Alter, Severity::Minor, rev(2, 200))
            .unwrap();
        let entries = ledger.entries_for_commit(&h(200));
        assert_eq!(entries.iter().map(|e| e.object).collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn fork_copies_state_and_remaps_parents() {
        let mut ledger = VersionLedger::new();
        let table = created(&mut ledger, "main", "users");
        let column = ObjectKey::new(ObjectType::Column, "app", "users.email").unwrap();
        let col = ledger.ensure_object("main", column.clone(), Some(table)).unwrap();
        ledger.record_creation(col, rev(7, 101)).unwrap();

        assert_eq!(ledger.fork_branch("main", "feature"), 2);
        let forked_table = ledger.find("feature", &key("users")).unwrap();
        let forked_col = ledger.find("feature", &column).unwrap();
        assert_ne!(forked_table, table);
        assert_eq!(ledger.get(forked_col).unwrap().parent, Some(forked_table));
        assert_eq!(ledger.get(forked_table).unwrap().origin, Some(table));

        ledger
            .increment_version(forked_table, ChangeKind::Alter, Severity::Minor, rev(8, 102))
            .unwrap();
        assert_eq!(ledger.current_version(table).unwrap(), SemVer::new(1, 0, 0));
        ledger.validate_history().unwrap();
    }

    #[test]
    fn live_objects_sorted_by_path() {
        let mut ledger = VersionLedger::new();
        created(&mut ledger, "main", "zeta");
        created(&mut ledger, "main", "alpha");
        ledger.ensure_object("main", key("unmaterialized"), None).unwrap();
        let names: Vec<&str> = ledger
            .live_objects("main")
            .iter()
            .map(|o| o.key.name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    fn severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Patch),
            Just(Severity::Minor),
            Just(Severity::Major)
        ]
    }

    proptest! {
        #[test]
        fn change_count_increments_by_one(severities in prop::collection::vec(severity(), 1..20)) {
            let mut ledger = VersionLedger::new();
            let id = created(&mut ledger, "main", "t");
            for (i, s) in severities.iter().enumerate() {
                let before = ledger.get(id).unwrap().clone();
                let v = ledger
                    .increment_version(id, ChangeKind::Alter, *s, rev(i as u8, i as u8))
                    .unwrap();
                prop_assert_eq!(v, before.version.bump(*s));
                prop_assert_eq!(ledger.get(id).unwrap().change_count, before.change_count + 1);
            }
            prop_assert_eq!(ledger.full_history(id).len(), severities.len() + 1);
            prop_assert!(ledger.validate_history().is_ok());
        }
    }
}
