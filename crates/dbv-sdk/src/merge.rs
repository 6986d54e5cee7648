//! Merging one branch into another.

use std::collections::HashMap;

use dbv_merge::{
    detect_conflicts, three_way_diff, ConflictReport, MergeOperation, MergeRequest, MergeStatus,
    MergeStrategy, ResolutionChoice, ThreeWayDiff,
};
use dbv_refs::BranchStatus;
use dbv_store::ObjectStore;
use dbv_types::{ChangeKind, ContentHash, ObjectId, ObjectKey};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::Context;
use crate::error::{SdkError, SdkResult};
use crate::repository::{Repository, State};

impl State {
    fn require_merge(&self, id: Uuid) -> SdkResult<&MergeOperation> {
        self.merges
            .get(&id)
            .ok_or_else(|| SdkError::NotFound(format!("merge {id}")))
    }

    /// The target-branch object for `key`, registered if the merge brings
    /// it in. Its parent is the target counterpart of the source parent.
    fn merge_target_object(
        &mut self,
        source: &str,
        target: &str,
        key: &ObjectKey,
    ) -> SdkResult<ObjectId> {
        if let Some(id) = self.ledger.find(target, key) {
            return Ok(id);
        }
        let parent = self
            .ledger
            .find(source, key)
            .and_then(|id| self.ledger.get(id))
            .and_then(|o| o.parent)
            .and_then(|p| self.ledger.get(p))
            .and_then(|p| self.ledger.find(target, &p.key));
        Ok(self.ledger.ensure_object(target, key.clone(), parent)?)
    }

    /// Copy edges between source objects onto their target counterparts.
    fn adopt_dependencies(&mut self, source: &str, target: &str, adopted: &HashMap<ObjectId, ObjectId>) {
        let counterpart = |state: &State, id: ObjectId| -> Option<ObjectId> {
            let key = &state.ledger.get(id)?.key;
            state.ledger.find(target, key)
        };
        let edges: Vec<_> = self
            .deps
            .edges()
            .into_iter()
            .filter(|e| adopted.contains_key(&e.dependent) || adopted.contains_key(&e.depends_on))
            .filter(|e| self.ledger.get(e.dependent).is_some_and(|o| o.branch == source))
            .collect();
        for edge in edges {
            let (Some(d), Some(t)) = (counterpart(self, edge.dependent), counterpart(self, edge.depends_on))
            else {
                continue;
            };
            if let Err(e) = self.deps.add_dependency_acyclic(d, t, edge.kind) {
                warn!(error = %e, "skipped merged dependency");
            }
        }
    }

    /// Write the merge commit on the target and record one history entry
    /// per object whose merged value differs from the target's.
    fn finalize_merge(&mut self, store: &dyn ObjectStore, id: Uuid, author: &str) -> SdkResult<()> {
        let mut op = self.require_merge(id)?.clone();
        let tree = op.compose_tree()?;
        let message = format!(
            "Merge branch '{}' into '{}'",
            op.source_branch, op.target_branch
        );
        if self.branches.require(&op.target_branch)?.status == BranchStatus::Conflicted {
            self.branches.set_status(&op.target_branch, BranchStatus::Active)?;
        }
        let commit = self.append_commit(
            store,
            &op.target_branch,
            Some(op.target_tip),
            op.commit_parents(),
            &tree,
            author,
            &message,
        )?;

        let mut adopted = HashMap::new();
        let mut touched = 0;
        for entry in &op.entries {
            let merged = tree.blob_at(&entry.path);
            if merged == entry.target {
                continue;
            }
            let kind = if entry.classification.is_conflict() {
                ChangeKind::ConflictResolved
            } else {
                ChangeKind::Merge
            };
            let key = ObjectKey::from_path(&entry.path)?;
            let object = self.merge_target_object(&op.source_branch, &op.target_branch, &key)?;
            if self.ledger.require(object)?.origin.is_some() && self.ledger.last_entry(object).is_none() {
                touched += 1;
            }
            if let Some(source_id) = self.ledger.find(&op.source_branch, &key) {
                adopted.insert(source_id, object);
            }
            let revision = State::revision_for(store, merged, &commit)?;
            let version = self.apply_revision(object, kind, revision)?;
            debug!(object = %key, kind = %kind, version = %version, "merged object");
        }
        if touched > 0 {
            self.branches.record_modified(&op.target_branch, touched)?;
        }
        self.adopt_dependencies(&op.source_branch, &op.target_branch, &adopted);

        op.complete(commit.hash)?;
        let source_status = self.branches.require(&op.source_branch)?.status;
        if !source_status.is_terminal() {
            self.branches.set_status(&op.source_branch, BranchStatus::Merged)?;
        }
        info!(
            merge = %op.id,
            source = %op.source_branch,
            target = %op.target_branch,
            commit = %commit.hash.short_hex(),
            "merged branch"
        );
        self.merges.insert(id, op);
        Ok(())
    }
}

impl Repository {
    /// Two-way comparison of `source` against `target`, ignoring history.
    pub fn detect_conflicts(&self, source: &str, target: &str) -> SdkResult<ConflictReport> {
        let (source, target) = (self.tree(source)?, self.tree(target)?);
        Ok(detect_conflicts(&source, &target, self.store())?)
    }

    /// Classify every path of two commits against a base commit.
    pub fn three_way_diff(
        &self,
        source: &ContentHash,
        target: &ContentHash,
        base: Option<&ContentHash>,
    ) -> SdkResult<ThreeWayDiff> {
        self.read(|state| {
            let store = self.store();
            let base = state.tree_at(store, base.copied())?;
            let source = state.tree_at(store, Some(*source))?;
            let target = state.tree_at(store, Some(*target))?;
            Ok(three_way_diff(&base, &source, &target))
        })
    }

    /// Merge `source` into the context's branch.
    ///
    /// With nothing left to resolve (no conflicts, or a strategy that
    /// resolves them all) the merge commit is written immediately and the
    /// operation is returned completed. Otherwise the operation waits in
    /// `awaiting_resolution` and the target branch is marked conflicted.
    pub fn start_merge(
        &self,
        ctx: &Context,
        source: &str,
        strategy: Option<MergeStrategy>,
    ) -> SdkResult<MergeOperation> {
        let target = ctx.branch.as_str();
        if source == target {
            return Err(SdkError::Validation(format!("cannot merge {source} into itself")));
        }
        let strategy = strategy.unwrap_or(self.config.merge_strategy);
        let author = self.author(ctx);
        let store = self.store();

        self.transact(|state| {
            let target_tip = state.expected_head(ctx)?.ok_or_else(|| {
                SdkError::Validation(format!(
                    "{target} has no commits; create it from {source} instead of merging"
                ))
            })?;
            let source_branch = state.branches.require(source)?;
            if source_branch.status == BranchStatus::Deleted {
                return Err(SdkError::Validation(format!("branch {source} is deleted")));
            }
            let source_tip = source_branch
                .head
                .ok_or_else(|| SdkError::Validation(format!("branch {source} has no commits")))?;
            if state.commits.is_ancestor(&source_tip, &target_tip) {
                return Err(SdkError::Validation(format!(
                    "{target} is already up to date with {source}"
                )));
            }
            if let Some(open) = state
                .merges
                .values()
                .find(|m| m.target_branch == target && !m.status().is_terminal())
            {
                return Err(SdkError::Validation(format!(
                    "merge {} into {target} is still open",
                    open.id
                )));
            }

            let base_commit = state
                .commits
                .merge_base(&target_tip, &source_tip)
                .map(|c| c.hash);
            let request = MergeRequest {
                source_branch: source.to_string(),
                target_branch: target.to_string(),
                source_tip,
                target_tip,
                base_commit,
                strategy,
                started_at: state.now(),
            };
            let op = MergeOperation::plan(
                request,
                &state.tree_at(store, base_commit)?,
                &state.tree_at(store, Some(source_tip))?,
                &state.tree_at(store, Some(target_tip))?,
                store,
                &self.config.merge_config(),
            )?;
            let id = op.id;
            let ready = op.is_ready();
            state.merges.insert(id, op);

            if ready {
                state.finalize_merge(store, id, author)?;
            } else {
                state.branches.set_status(target, BranchStatus::Conflicted)?;
                info!(merge = %id, source = %source, target = %target, "merge awaiting resolution");
            }
            Ok(state.require_merge(id)?.clone())
        })
    }

    /// Resolve one conflict of an open merge. Resolving the last one
    /// completes the merge.
    pub fn resolve_conflict(
        &self,
        ctx: &Context,
        merge: Uuid,
        path: &str,
        choice: ResolutionChoice,
    ) -> SdkResult<MergeOperation> {
        if let ResolutionChoice::Custom(definition) = &choice {
            if definition.trim().is_empty() {
                return Err(SdkError::Validation(format!(
                    "custom resolution of {path} needs a definition"
                )));
            }
            self.store.put_definition(definition)?;
        }
        let author = self.author(ctx);
        let store = self.store();

        self.transact(|state| {
            let op = state
                .merges
                .get_mut(&merge)
                .ok_or_else(|| SdkError::NotFound(format!("merge {merge}")))?;
            if op.target_branch != ctx.branch {
                return Err(SdkError::Validation(format!(
                    "merge {merge} targets {}, not {}",
                    op.target_branch, ctx.branch
                )));
            }
            op.resolve_conflict(path, choice)?;
            if op.is_ready() {
                state.finalize_merge(store, merge, author)?;
            }
            Ok(state.require_merge(merge)?.clone())
        })
    }

    /// Abandon an open merge. The target branch is writable again and
    /// nothing is committed.
    pub fn abort_merge(&self, merge: Uuid) -> SdkResult<MergeOperation> {
        self.transact(|state| {
            let op = state
                .merges
                .get_mut(&merge)
                .ok_or_else(|| SdkError::NotFound(format!("merge {merge}")))?;
            op.abort()?;
            let target = op.target_branch.clone();
            let op = op.clone();
            if state.branches.require(&target)?.status == BranchStatus::Conflicted {
                state.branches.set_status(&target, BranchStatus::Active)?;
            }
            Ok(op)
        })
    }

    pub fn merge_operation(&self, merge: Uuid) -> SdkResult<MergeOperation> {
        self.read(|state| Ok(state.require_merge(merge)?.clone()))
    }

    /// Every merge in start order.
    pub fn merge_operations(&self) -> Vec<MergeOperation> {
        let mut ops: Vec<MergeOperation> = self
            .read(|state| Ok(state.merges.values().cloned().collect()))
            .unwrap_or_default();
        ops.sort_by_key(|op| op.started_at);
        ops
    }

    /// Merges into `branch` still waiting for resolution.
    pub fn open_merges(&self, branch: &str) -> Vec<MergeOperation> {
        self.merge_operations()
            .into_iter()
            .filter(|op| op.target_branch == branch && op.status() == MergeStatus::AwaitingResolution)
            .collect()
    }
}
