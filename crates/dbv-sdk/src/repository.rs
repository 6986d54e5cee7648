use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use dbv_crypto::normalize_definition;
use dbv_dag::{Commit, CommitGraph};
use dbv_deps::DependencyGraph;
use dbv_diff::{diff_branches, diff_definitions, BranchDiff, DefinitionDiff};
use dbv_ledger::{HistoryEntry, HistoryPage, Revision, SchemaObject, VersionLedger};
use dbv_merge::MergeOperation;
use dbv_refs::{Branch, BranchRegistry, BranchStatus};
use dbv_rollback::RollbackLog;
use dbv_store::{InMemoryObjectStore, ObjectStore, Tree, TreeEntry};
use dbv_types::{
    ChangeKind, ContentHash, ObjectId, ObjectKey, SemVer, Severity, Timestamp,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::change::{ChangeClassifier, ChangeOutcome, ObjectChange, RawChange};
use crate::config::RepositoryConfig;
use crate::context::Context;
use crate::error::{SdkError, SdkResult};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything mutable about a repository. Blobs and trees live in the
/// object store; this holds what links them together.
#[derive(Clone, Debug, Default)]
pub(crate) struct State {
    pub(crate) ledger: VersionLedger,
    pub(crate) commits: CommitGraph,
    pub(crate) branches: BranchRegistry,
    pub(crate) deps: DependencyGraph,
    pub(crate) merges: BTreeMap<Uuid, MergeOperation>,
    pub(crate) rollbacks: RollbackLog,
    clock: Timestamp,
}

impl State {
    /// A timestamp strictly after every one handed out before.
    pub(crate) fn now(&mut self) -> Timestamp {
        self.clock = self.clock.tick();
        self.clock
    }

    pub(crate) fn head(&self, branch: &str) -> SdkResult<Option<ContentHash>> {
        Ok(self.branches.require(branch)?.head)
    }

    /// The head a write through `ctx` must replace, checked against the
    /// branch's current head and writability.
    pub(crate) fn expected_head(&self, ctx: &Context) -> SdkResult<Option<ContentHash>> {
        let current = self.head(&ctx.branch)?;
        let expected = ctx.expected_head.or(current);
        self.branches.check_advance(&ctx.branch, expected.as_ref())?;
        Ok(expected)
    }

    pub(crate) fn tree_at(
        &self,
        store: &dyn ObjectStore,
        commit: Option<ContentHash>,
    ) -> SdkResult<Tree> {
        match commit {
            Some(hash) => {
                let tree = self.commits.require(&hash)?.tree;
                Ok(store.tree(&tree)?)
            }
            None => Ok(Tree::empty()),
        }
    }

    pub(crate) fn require_object(&self, branch: &str, key: &ObjectKey) -> SdkResult<ObjectId> {
        self.ledger
            .find(branch, key)
            .ok_or_else(|| SdkError::NotFound(format!("{key} on branch {branch}")))
    }

    /// Write `tree`, append a commit on `branch` and move its head from
    /// `expected` to the new commit.
    pub(crate) fn append_commit(
        &mut self,
        store: &dyn ObjectStore,
        branch: &str,
        expected: Option<ContentHash>,
        parents: Vec<ContentHash>,
        tree: &Tree,
        author: &str,
        message: &str,
    ) -> SdkResult<Commit> {
        self.branches.check_advance(branch, expected.as_ref())?;
        let tree_hash = store.put_tree(tree)?;
        let timestamp = self.now();
        let commit = Commit::new(parents, tree_hash, author, timestamp, message)?;
        self.commits.add_commit(commit.clone())?;
        self.branches
            .advance_head(branch, expected.as_ref(), commit.hash)?;
        info!(
            branch = %branch,
            commit = %commit.hash.short_hex(),
            parents = commit.parents.len(),
            "appended commit"
        );
        Ok(commit)
    }

    /// Record a revision produced by the repository itself (merge or
    /// rollback). Appearing or disappearing objects are MAJOR changes;
    /// content changes use the kind's default severity.
    pub(crate) fn apply_revision(
        &mut self,
        id: ObjectId,
        kind: ChangeKind,
        revision: Revision,
    ) -> SdkResult<SemVer> {
        let object = self.ledger.require(id)?;
        if !object.is_materialized() && self.ledger.last_entry(id).is_none() {
            if revision.content.is_none() {
                return Ok(object.version);
            }
            return Ok(self.ledger.record_creation(id, revision)?);
        }
        let severity = if object.is_live() != revision.content.is_some() {
            Severity::Major
        } else {
            kind.default_severity()
        };
        Ok(self.ledger.increment_version(id, kind, severity, revision)?)
    }

    /// Revision for `blob` (or a removal), reading the definition back from
    /// the store.
    pub(crate) fn revision_for(
        store: &dyn ObjectStore,
        blob: Option<ContentHash>,
        commit: &Commit,
    ) -> SdkResult<Revision> {
        Ok(match blob {
            Some(hash) => Revision::content(hash, store.definition(&hash)?, commit.hash, commit.timestamp),
            None => Revision::removal(commit.hash, commit.timestamp),
        })
    }

    /// Give the objects forked onto `branch` the same edges as their
    /// origins.
    fn copy_dependencies(&mut self, branch: &str) {
        let remap: HashMap<ObjectId, ObjectId> = self
            .ledger
            .objects_on(branch)
            .into_iter()
            .filter_map(|o| o.origin.map(|origin| (origin, o.id)))
            .collect();
        for edge in self.deps.edges() {
            if let (Some(d), Some(t)) = (remap.get(&edge.dependent), remap.get(&edge.depends_on)) {
                self.deps.add_dependency(*d, *t, edge.kind);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A branch head as exposed to backup and deployment tooling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    pub name: String,
    pub head: Option<ContentHash>,
    pub status: BranchStatus,
}

/// Stable identifiers for every branch at one moment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub branches: Vec<BranchSnapshot>,
}

impl Snapshot {
    pub fn head(&self, branch: &str) -> Option<ContentHash> {
        self.branches
            .iter()
            .find(|b| b.name == branch)
            .and_then(|b| b.head)
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Version control for schema objects.
///
/// Every mutating call is one atomic unit: it works on a private copy of
/// the repository state and publishes it only if every step succeeds, so a
/// failed call leaves nothing behind. Objects written to the store by a
/// failed call stay unreferenced and therefore invisible.
pub struct Repository {
    pub(crate) config: RepositoryConfig,
    pub(crate) store: Arc<dyn ObjectStore>,
    state: RwLock<State>,
}

impl Repository {
    /// Create an empty in-memory repository with its default branch.
    pub fn init(config: RepositoryConfig) -> SdkResult<Self> {
        Self::with_store(Arc::new(InMemoryObjectStore::new()), config)
    }

    /// Create an empty repository over an existing object store.
    pub fn with_store(store: Arc<dyn ObjectStore>, config: RepositoryConfig) -> SdkResult<Self> {
        config.validate()?;
        let mut state = State::default();
        let now = state.now();
        state
            .branches
            .create(&config.default_branch, None, 0, now)?;
        info!(branch = %config.default_branch, "initialized repository");
        Ok(Self {
            config,
            store,
            state: RwLock::new(state),
        })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Context for the default branch and author.
    pub fn context(&self) -> Context {
        Context::new(&self.config.default_branch, &self.config.default_author)
    }

    /// Context for `branch` with the default author.
    pub fn context_for(&self, branch: &str) -> Context {
        Context::new(branch, &self.config.default_author)
    }

    pub(crate) fn author<'a>(&'a self, ctx: &'a Context) -> &'a str {
        if ctx.author.trim().is_empty() {
            &self.config.default_author
        } else {
            &ctx.author
        }
    }

    /// Run `f` on a copy of the state and publish the copy on success.
    pub(crate) fn transact<T>(&self, f: impl FnOnce(&mut State) -> SdkResult<T>) -> SdkResult<T> {
        let mut guard = self.state.write().expect("lock poisoned");
        let mut draft = guard.clone();
        let value = f(&mut draft)?;
        *guard = draft;
        Ok(value)
    }

    pub(crate) fn read<T>(&self, f: impl FnOnce(&State) -> SdkResult<T>) -> SdkResult<T> {
        let guard = self.state.read().expect("lock poisoned");
        f(&guard)
    }

    // ---------------------------------------------------------------
    // Objects
    // ---------------------------------------------------------------

    /// Get or create the object `key` on the context's branch.
    ///
    /// A new object starts at 1.0.0 with no content; it appears in the
    /// branch tree once a create is recorded for it.
    pub fn ensure_object(
        &self,
        ctx: &Context,
        key: &ObjectKey,
        parent: Option<&ObjectKey>,
    ) -> SdkResult<ObjectId> {
        self.transact(|state| {
            state.branches.require(&ctx.branch)?;
            let parent = parent
                .map(|p| state.require_object(&ctx.branch, p))
                .transpose()?;
            Ok(state.ledger.ensure_object(&ctx.branch, key.clone(), parent)?)
        })
    }

    /// Record one reported change as a new commit on the context's branch.
    ///
    /// The definition is normalized and hashed, the object's version is
    /// bumped by the change's severity (or the configured default, or the
    /// kind's default), one history entry is appended and the branch head
    /// advances, all or nothing. An alter whose normalized definition is
    /// unchanged is a no-op and creates no commit.
    pub fn record_change(&self, ctx: &Context, change: ObjectChange) -> SdkResult<ChangeOutcome> {
        let key = change.key()?;
        let severity = change
            .severity
            .or(self.config.default_severity)
            .unwrap_or_else(|| change.kind.default_severity());
        let author = self.author(ctx);
        let store = self.store.as_ref();

        self.transact(|state| {
            let branch = ctx.branch.as_str();
            let expected = state.expected_head(ctx)?;
            let parent = change
                .parent
                .as_ref()
                .map(|p| state.require_object(branch, p))
                .transpose()?;
            let id = state.ledger.ensure_object(branch, key.clone(), parent)?;
            if let Some(count) = change.expected_change_count {
                state.ledger.check_change_count(id, count)?;
            }
            let object = state.ledger.require(id)?.clone();
            let untouched = object.origin.is_some() && state.ledger.last_entry(id).is_none();
            let mut tree = state.tree_at(store, expected)?;
            let path = key.path();

            let mut final_key = key.clone();
            let content = match change.kind {
                ChangeKind::Create | ChangeKind::Alter => {
                    let creating = change.kind == ChangeKind::Create;
                    if creating && object.is_live() {
                        return Err(SdkError::Validation(format!(
                            "{key} already exists on branch {branch}"
                        )));
                    }
                    if !creating && !object.is_live() {
                        return Err(SdkError::NotFound(format!("{key} on branch {branch}")));
                    }
                    let definition = normalize_definition(change.require_definition()?);
                    let hash = store.put_definition(&definition)?;
                    if !creating && object.content_hash == Some(hash) {
                        debug!(object = %key, "definition unchanged");
                        return Ok(ChangeOutcome {
                            object: id,
                            key,
                            version: object.version,
                            change_count: object.change_count,
                            commit: None,
                        });
                    }
                    tree.upsert(TreeEntry::new(path, key.object_type, hash));
                    Some((hash, definition))
                }
                ChangeKind::Drop => {
                    if !object.is_live() {
                        return Err(SdkError::NotFound(format!("{key} on branch {branch}")));
                    }
                    tree.remove(&path);
                    None
                }
                ChangeKind::Rename => {
                    if !object.is_live() {
                        return Err(SdkError::NotFound(format!("{key} on branch {branch}")));
                    }
                    let new_name = change.new_name.as_deref().ok_or_else(|| {
                        SdkError::Validation(format!("rename of {key} needs a new name"))
                    })?;
                    final_key = ObjectKey::new(key.object_type, &key.schema, new_name)?;
                    let entry = tree.remove(&path).ok_or_else(|| {
                        SdkError::Integrity(format!("{key} is live but missing from the tree"))
                    })?;
                    tree.upsert(TreeEntry::new(final_key.path(), key.object_type, entry.blob));
                    object.content_hash.zip(object.definition.clone())
                }
                other => {
                    return Err(SdkError::Validation(format!(
                        "{other} changes are recorded by the repository itself"
                    )))
                }
            };

            let message = change
                .message
                .clone()
                .unwrap_or_else(|| format!("{} {}", change.kind, key));
            let commit = state.append_commit(
                store,
                branch,
                expected,
                expected.into_iter().collect(),
                &tree,
                author,
                &message,
            )?;
            let revision = Revision {
                content,
                commit: commit.hash,
                timestamp: commit.timestamp,
            };

            let version = match change.kind {
                ChangeKind::Create if !object.is_materialized() => {
                    state.ledger.record_creation(id, revision)?
                }
                ChangeKind::Rename => {
                    state
                        .ledger
                        .rename(id, final_key.clone(), severity, revision)?
                }
                kind => state.ledger.increment_version(id, kind, severity, revision)?,
            };
            if untouched {
                state.branches.record_modified(branch, 1)?;
            }
            info!(
                branch = %branch,
                object = %final_key,
                kind = %change.kind,
                version = %version,
                commit = %commit.hash.short_hex(),
                "recorded change"
            );

            Ok(ChangeOutcome {
                object: id,
                key: final_key,
                version,
                change_count: state.ledger.require(id)?.change_count,
                commit: Some(commit.hash),
            })
        })
    }

    /// Classify a raw statement with `classifier` and record it.
    ///
    /// The statement text becomes the definition, except for drops.
    pub fn record_raw_change(
        &self,
        ctx: &Context,
        classifier: &dyn ChangeClassifier,
        kind: ChangeKind,
        raw: &RawChange,
    ) -> SdkResult<ChangeOutcome> {
        let c = classifier.classify(raw)?;
        let change = match kind {
            ChangeKind::Create => ObjectChange::create(c.object_type, &c.schema, &c.name, &raw.statement),
            ChangeKind::Alter => ObjectChange::alter(c.object_type, &c.schema, &c.name, &raw.statement),
            ChangeKind::Drop => ObjectChange::drop(c.object_type, &c.schema, &c.name),
            other => {
                return Err(SdkError::Validation(format!(
                    "raw {other} changes are not supported"
                )))
            }
        };
        self.record_change(ctx, change)
    }

    // ---------------------------------------------------------------
    // Branches
    // ---------------------------------------------------------------

    /// Fork `name` from `from`'s current head.
    ///
    /// The new branch shares every object with its parent until changed;
    /// dependency edges between shared objects are copied along.
    pub fn create_branch(&self, name: &str, from: &str) -> SdkResult<Branch> {
        self.transact(|state| {
            let inherited = state.ledger.live_objects(from).len() as u64;
            let now = state.now();
            state.branches.create(name, Some(from), inherited, now)?;
            state.ledger.fork_branch(from, name);
            state.copy_dependencies(name);
            info!(branch = %name, from = %from, inherited, "created branch");
            Ok(state.branches.require(name)?.clone())
        })
    }

    /// Mark a branch deleted. Its commits and history remain.
    pub fn delete_branch(&self, name: &str) -> SdkResult<()> {
        if name == self.config.default_branch {
            return Err(SdkError::Validation(format!(
                "cannot delete the default branch {name}"
            )));
        }
        self.transact(|state| {
            state.branches.set_status(name, BranchStatus::Deleted)?;
            for op in state.merges.values_mut() {
                if op.target_branch == name && !op.status().is_terminal() {
                    op.fail(format!("target branch {name} was deleted"))?;
                }
            }
            info!(branch = %name, "deleted branch");
            Ok(())
        })
    }

    pub fn branch(&self, name: &str) -> SdkResult<Branch> {
        self.read(|state| Ok(state.branches.require(name)?.clone()))
    }

    /// All branches, sorted by name.
    pub fn branches(&self) -> Vec<Branch> {
        self.read(|state| Ok(state.branches.list().into_iter().cloned().collect()))
            .unwrap_or_default()
    }

    pub fn head(&self, branch: &str) -> SdkResult<Option<ContentHash>> {
        self.read(|state| state.head(branch))
    }

    /// Every branch head and status, for export and restore tooling.
    pub fn snapshot(&self) -> Snapshot {
        let branches = self.branches()
            .into_iter()
            .map(|b| BranchSnapshot {
                name: b.name,
                head: b.head,
                status: b.status,
            })
            .collect();
        Snapshot { branches }
    }

    // ---------------------------------------------------------------
    // Commits
    // ---------------------------------------------------------------

    pub fn commit(&self, hash: &ContentHash) -> SdkResult<Commit> {
        self.read(|state| Ok(state.commits.require(hash)?.clone()))
    }

    /// First-parent log of `branch`, newest first.
    pub fn log(&self, branch: &str, limit: usize) -> SdkResult<Vec<Commit>> {
        self.read(|state| {
            Ok(match state.head(branch)? {
                Some(head) => state.commits.log(&head, limit).into_iter().cloned().collect(),
                None => Vec::new(),
            })
        })
    }

    /// The snapshot at a branch head (empty before its first commit).
    pub fn tree(&self, branch: &str) -> SdkResult<Tree> {
        self.read(|state| state.tree_at(self.store(), state.head(branch)?))
    }

    pub fn tree_at(&self, commit: &ContentHash) -> SdkResult<Tree> {
        self.read(|state| state.tree_at(self.store(), Some(*commit)))
    }

    /// History entries produced by one commit.
    pub fn commit_entries(&self, commit: &ContentHash) -> Vec<HistoryEntry> {
        self.read(|state| {
            Ok(state
                .ledger
                .entries_for_commit(commit)
                .into_iter()
                .cloned()
                .collect())
        })
        .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn object(&self, branch: &str, key: &ObjectKey) -> SdkResult<SchemaObject> {
        self.read(|state| {
            let id = state.require_object(branch, key)?;
            Ok(state.ledger.require(id)?.clone())
        })
    }

    pub fn current_version(&self, branch: &str, key: &ObjectKey) -> SdkResult<SemVer> {
        Ok(self.object(branch, key)?.version)
    }

    /// One page of an object's history, newest first. `page_size` falls
    /// back to the configured default.
    pub fn history(
        &self,
        branch: &str,
        key: &ObjectKey,
        page: usize,
        page_size: Option<usize>,
    ) -> SdkResult<HistoryPage> {
        let page_size = page_size.unwrap_or(self.config.history_page_size);
        if page_size == 0 {
            return Err(SdkError::Validation("page size must be positive".into()));
        }
        self.read(|state| {
            let id = state.require_object(branch, key)?;
            Ok(state.ledger.history(id, page, page_size)?)
        })
    }

    /// The live objects of a branch, sorted by path.
    pub fn live_objects(&self, branch: &str) -> SdkResult<Vec<SchemaObject>> {
        self.read(|state| {
            state.branches.require(branch)?;
            Ok(state
                .ledger
                .live_objects(branch)
                .into_iter()
                .cloned()
                .collect())
        })
    }

    /// Compare two branch heads path by path, using their merge base to
    /// tell conflicting changes apart.
    pub fn diff_branches(&self, left: &str, right: &str) -> SdkResult<BranchDiff> {
        self.read(|state| {
            let store = self.store();
            let (lh, rh) = (state.head(left)?, state.head(right)?);
            let base = match (lh, rh) {
                (Some(l), Some(r)) => state.commits.merge_base(&l, &r).map(|c| c.hash),
                _ => None,
            };
            let base_tree = base.map(|b| state.tree_at(store, Some(b))).transpose()?;
            Ok(diff_branches(
                &state.tree_at(store, lh)?,
                &state.tree_at(store, rh)?,
                base_tree.as_ref(),
            ))
        })
    }

    /// Line diff of one object's definition between two branches.
    pub fn definition_diff(&self, left: &str, right: &str, key: &ObjectKey) -> SdkResult<DefinitionDiff> {
        let path = key.path();
        let (lt, rt) = (self.tree(left)?, self.tree(right)?);
        let read = |tree: &Tree| -> SdkResult<String> {
            match tree.blob_at(&path) {
                Some(blob) => Ok(self.store.definition(&blob)?),
                None => Ok(String::new()),
            }
        };
        Ok(diff_definitions(&read(&lt)?, &read(&rt)?))
    }

    /// Verify history numbering and version chains, and that the
    /// dependency graph is acyclic.
    pub fn verify(&self) -> SdkResult<()> {
        self.read(|state| {
            state.ledger.validate_history()?;
            if let Some(cycle) = state.deps.find_cycle() {
                return Err(SdkError::Integrity(format!("dependency cycle: {cycle:?}")));
            }
            Ok(())
        })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("default_branch", &self.config.default_branch)
            .finish_non_exhaustive()
    }
}
