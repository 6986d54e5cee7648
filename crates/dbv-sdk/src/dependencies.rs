//! Dependency declarations between objects on one branch.

use dbv_deps::DependencyKind;
use dbv_types::{ObjectId, ObjectKey};
use tracing::info;

use crate::context::Context;
use crate::error::SdkResult;
use crate::repository::{Repository, State};

impl State {
    fn keys_of(&self, ids: &[ObjectId]) -> SdkResult<Vec<ObjectKey>> {
        ids.iter()
            .map(|id| Ok(self.ledger.require(*id)?.key.clone()))
            .collect()
    }
}

impl Repository {
    /// Declare that `dependent` depends on `depends_on` on the context's
    /// branch.
    ///
    /// Both objects are registered if needed. An edge that would close a
    /// cycle (including an object depending on itself) is an integrity
    /// error and leaves the graph unchanged. Declaring an existing edge
    /// again updates its kind.
    pub fn declare_dependency(
        &self,
        ctx: &Context,
        dependent: &ObjectKey,
        depends_on: &ObjectKey,
        kind: DependencyKind,
    ) -> SdkResult<()> {
        self.transact(|state| {
            state.branches.require(&ctx.branch)?;
            let from = state
                .ledger
                .ensure_object(&ctx.branch, dependent.clone(), None)?;
            let to = state
                .ledger
                .ensure_object(&ctx.branch, depends_on.clone(), None)?;
            state.deps.add_dependency_acyclic(from, to, kind)?;
            info!(
                branch = %ctx.branch,
                dependent = %dependent,
                depends_on = %depends_on,
                kind = %kind,
                "declared dependency"
            );
            Ok(())
        })
    }

    /// Remove an edge. Returns its kind if it existed.
    pub fn remove_dependency(
        &self,
        ctx: &Context,
        dependent: &ObjectKey,
        depends_on: &ObjectKey,
    ) -> SdkResult<Option<DependencyKind>> {
        self.transact(|state| {
            let from = state.require_object(&ctx.branch, dependent)?;
            let to = state.require_object(&ctx.branch, depends_on)?;
            Ok(state.deps.remove_dependency(from, to))
        })
    }

    /// Order `keys` so every object comes after everything it depends on.
    ///
    /// Objects with no ordering constraint between them keep their input
    /// order.
    pub fn dependency_order(&self, branch: &str, keys: &[ObjectKey]) -> SdkResult<Vec<ObjectKey>> {
        self.read(|state| {
            let ids = keys
                .iter()
                .map(|k| state.require_object(branch, k))
                .collect::<SdkResult<Vec<_>>>()?;
            let order = state.deps.topological_order(&ids)?;
            state.keys_of(&order)
        })
    }

    /// `true` if following dependencies from `key` leads back to it.
    pub fn has_cycle(&self, branch: &str, key: &ObjectKey) -> SdkResult<bool> {
        self.read(|state| {
            let id = state.require_object(branch, key)?;
            Ok(state.deps.has_cycle(id))
        })
    }

    /// Everything that transitively depends on `key`, sorted by id.
    pub fn dependents(&self, branch: &str, key: &ObjectKey) -> SdkResult<Vec<ObjectKey>> {
        self.read(|state| {
            let id = state.require_object(branch, key)?;
            state.keys_of(&state.deps.dependents(id))
        })
    }

    /// The direct dependencies of `key` with their kinds.
    pub fn dependencies(
        &self,
        branch: &str,
        key: &ObjectKey,
    ) -> SdkResult<Vec<(ObjectKey, DependencyKind)>> {
        self.read(|state| {
            let id = state.require_object(branch, key)?;
            state
                .deps
                .dependencies_of(id)
                .into_iter()
                .map(|(dep, kind)| Ok((state.ledger.require(dep)?.key.clone(), kind)))
                .collect()
        })
    }
}
