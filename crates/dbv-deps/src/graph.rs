use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use dbv_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DepsError, DepsResult};

/// How a dependent object relies on the object it depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// The dependent's shape is built on the target (view over table,
    /// foreign key referencing a table). Breaks if the target changes shape.
    Structural,
    /// The dependent calls the target at runtime (function, trigger body).
    Functional,
    /// The dependent is owned by the target (sequence owned by a column).
    Ownership,
}

impl DependencyKind {
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Functional => "functional",
            Self::Ownership => "ownership",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single edge: `dependent` depends on `depends_on`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependent: ObjectId,
    pub depends_on: ObjectId,
    pub kind: DependencyKind,
}

/// Arena-backed directed graph of object dependencies.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// Node index -> object.
    nodes: Vec<ObjectId>,
    /// Object -> node index.
    index: HashMap<ObjectId, usize>,
    /// dependent -> [(depends_on, kind)]
    outgoing: Vec<Vec<(usize, DependencyKind)>>,
    /// depends_on -> [dependent]
    incoming: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(Vec::len).sum()
    }

    fn node(&mut self, id: ObjectId) -> usize {
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(id);
        self.index.insert(id, i);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        i
    }

    // ---------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------

    /// Insert the edge, or overwrite its kind if it already exists.
    ///
    /// Returns the previous kind when the edge was already present. No
    /// cycle check is made; see [`add_dependency_acyclic`].
    ///
    /// [`add_dependency_acyclic`]: Self::add_dependency_acyclic
    pub fn add_dependency(
        &mut self,
        dependent: ObjectId,
        depends_on: ObjectId,
        kind: DependencyKind,
    ) -> Option<DependencyKind> {
        let from = self.node(dependent);
        let to = self.node(depends_on);
        if let Some(edge) = self.outgoing[from].iter_mut().find(|(t, _)| *t == to) {
            let previous = edge.1;
            edge.1 = kind;
            return Some(previous);
        }
        self.outgoing[from].push((to, kind));
        self.incoming[to].push(from);
        debug!(dependent = %dependent, depends_on = %depends_on, kind = %kind, "added dependency");
        None
    }

    /// Insert the edge only if the graph stays acyclic.
    ///
    /// On rejection the graph is left exactly as it was.
    pub fn add_dependency_acyclic(
        &mut self,
        dependent: ObjectId,
        depends_on: ObjectId,
        kind: DependencyKind,
    ) -> DepsResult<()> {
        if dependent == depends_on {
            return Err(DepsError::SelfDependency(dependent));
        }
        let previous = self.add_dependency(dependent, depends_on, kind);
        if self.has_cycle(dependent) {
            match previous {
                Some(old) => {
                    self.add_dependency(dependent, depends_on, old);
                }
                None => {
                    self.remove_dependency(dependent, depends_on);
                }
            }
            warn!(dependent = %dependent, depends_on = %depends_on, "rejected cyclic dependency");
            return Err(DepsError::WouldCycle {
                dependent,
                depends_on,
            });
        }
        Ok(())
    }

    /// Remove an edge, returning its kind if it existed.
    pub fn remove_dependency(
        &mut self,
        dependent: ObjectId,
        depends_on: ObjectId,
    ) -> Option<DependencyKind> {
        let from = *self.index.get(&dependent)?;
        let to = *self.index.get(&depends_on)?;
        let pos = self.outgoing[from].iter().position(|(t, _)| *t == to)?;
        let (_, kind) = self.outgoing[from].remove(pos);
        self.incoming[to].retain(|&d| d != from);
        Some(kind)
    }

    pub fn edge(&self, dependent: ObjectId, depends_on: ObjectId) -> Option<DependencyKind> {
        let from = *self.index.get(&dependent)?;
        let to = *self.index.get(&depends_on)?;
        self.outgoing[from]
            .iter()
            .find(|(t, _)| *t == to)
            .map(|(_, k)| *k)
    }

    /// Every edge, in insertion order per dependent.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.outgoing
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| {
                targets.iter().map(move |(to, kind)| DependencyEdge {
                    dependent: self.nodes[from],
                    depends_on: self.nodes[*to],
                    kind: *kind,
                })
            })
            .collect()
    }

    /// Direct dependencies of `id`.
    pub fn dependencies_of(&self, id: ObjectId) -> Vec<(ObjectId, DependencyKind)> {
        self.index
            .get(&id)
            .map(|&i| {
                self.outgoing[i]
                    .iter()
                    .map(|(t, k)| (self.nodes[*t], *k))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct dependents of `id`.
    pub fn dependents_of(&self, id: ObjectId) -> Vec<ObjectId> {
        self.index
            .get(&id)
            .map(|&i| self.incoming[i].iter().map(|d| self.nodes[*d]).collect())
            .unwrap_or_default()
    }

    // ---------------------------------------------------------------
    // Cycles
    // ---------------------------------------------------------------

    /// `true` iff `start` can reach itself through `depends_on` edges.
    ///
    /// Iterative depth-first search with an explicit stack and visited set.
    pub fn has_cycle(&self, start: ObjectId) -> bool {
        let Some(&s) = self.index.get(&start) else {
            return false;
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![s];
        while let Some(current) = stack.pop() {
            for &(next, _) in &self.outgoing[current] {
                if next == s {
                    return true;
                }
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Find any cycle in the whole graph, returned as the objects along it.
    ///
    /// Iterative three-colour DFS: a node revisited while still on the
    /// current path closes a cycle.
    pub fn find_cycle(&self) -> Option<Vec<ObjectId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            OnPath,
            Done,
        }
        let mut mark = vec![Mark::New; self.nodes.len()];

        for root in 0..self.nodes.len() {
            if mark[root] != Mark::New {
                continue;
            }
            // (node, index of next outgoing edge to explore)
            let mut path: Vec<(usize, usize)> = vec![(root, 0)];
            mark[root] = Mark::OnPath;

            while let Some(&(node, next)) = path.last() {
                if let Some(&(target, _)) = self.outgoing[node].get(next) {
                    if let Some(top) = path.last_mut() {
                        top.1 += 1;
                    }
                    match mark[target] {
                        Mark::OnPath => {
                            let from = path.iter().position(|(n, _)| *n == target).unwrap_or(0);
                            return Some(path[from..].iter().map(|(n, _)| self.nodes[*n]).collect());
                        }
                        Mark::New => {
                            mark[target] = Mark::OnPath;
                            path.push((target, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    mark[node] = Mark::Done;
                    path.pop();
                }
            }
        }
        None
    }

    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }

    // ---------------------------------------------------------------
    // Ordering
    // ---------------------------------------------------------------

    /// Order `ids` so every object comes after the objects it depends on.
    ///
    /// A member depends on another member if it reaches it through any
    /// chain of edges, including chains that pass through objects outside
    /// `ids`. At each step the first eligible object in input order is
    /// placed, so the result is stable. If a full pass places nothing, the remaining objects contain
    /// a cycle and an error is returned instead of a partial order.
    pub fn topological_order(&self, ids: &[ObjectId]) -> DepsResult<Vec<ObjectId>> {
        let mut seen = HashSet::new();
        let mut remaining: Vec<ObjectId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        let members: HashSet<ObjectId> = remaining.iter().copied().collect();
        let requires: HashMap<ObjectId, Vec<ObjectId>> = remaining
            .iter()
            .map(|id| (*id, self.member_dependencies(*id, &members)))
            .collect();
        let mut placed: HashSet<ObjectId> = HashSet::new();
        let mut order = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let eligible = remaining.iter().position(|id| {
                requires
                    .get(id)
                    .map_or(true, |deps| deps.iter().all(|dep| placed.contains(dep)))
            });
            match eligible {
                Some(pos) => {
                    let id = remaining.remove(pos);
                    placed.insert(id);
                    order.push(id);
                }
                None => return Err(DepsError::Cycle { remaining }),
            }
        }
        Ok(order)
    }

    /// Members of `members` that `id` reaches, walking through non-members.
    fn member_dependencies(&self, id: ObjectId, members: &HashSet<ObjectId>) -> Vec<ObjectId> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![start];
        let mut found = Vec::new();

        while let Some(current) = stack.pop() {
            for &(target, _) in &self.outgoing[current] {
                if visited[target] {
                    continue;
                }
                visited[target] = true;
                let object = self.nodes[target];
                if members.contains(&object) {
                    found.push(object);
                } else {
                    stack.push(target);
                }
            }
        }
        found
    }

    // ---------------------------------------------------------------
    // Impact
    // ---------------------------------------------------------------

    /// Every object that transitively depends on `id`, sorted.
    pub fn dependents(&self, id: ObjectId) -> Vec<ObjectId> {
        self.reverse_reachable(id, |_| true)
    }

    /// Objects that transitively depend on `id` through structural edges
    /// only, sorted.
    pub fn structural_dependents(&self, id: ObjectId) -> Vec<ObjectId> {
        self.reverse_reachable(id, |k| k.is_structural())
    }

    fn reverse_reachable(&self, id: ObjectId, follow: impl Fn(DependencyKind) -> bool) -> Vec<ObjectId> {
        let Some(&start) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut visited = vec![false; self.nodes.len()];
        visited[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            for &dependent in &self.incoming[current] {
                if visited[dependent] {
                    continue;
                }
                let kind = self.outgoing[dependent]
                    .iter()
                    .find(|(t, _)| *t == current)
                    .map(|(_, k)| *k);
                if kind.is_some_and(&follow) {
                    visited[dependent] = true;
                    found.push(self.nodes[dependent]);
                    queue.push_back(dependent);
                }
            }
        }
        found.sort();
        found
    }

    // ---------------------------------------------------------------
    // Export
    // ---------------------------------------------------------------

    pub fn to_bytes(&self) -> DepsResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| DepsError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> DepsResult<Self> {
        bincode::deserialize(bytes).map_err(|e| DepsError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const A: ObjectId = ObjectId::new(0);
    const B: ObjectId = ObjectId::new(1);
    const C: ObjectId = ObjectId::new(2);
    const D: ObjectId = ObjectId::new(3);

    fn chain() -> DependencyGraph {
        // B -> A, C -> B
        let mut g = DependencyGraph::new();
        g.add_dependency(B, A, DependencyKind::Structural);
        g.add_dependency(C, B, DependencyKind::Structural);
        g
    }

    // ---------------------------------------------------------------
    // Edges
    // ---------------------------------------------------------------

    #[test]
    fn add_dependency_upserts_kind() {
        let mut g = DependencyGraph::new();
        assert_eq!(g.add_dependency(B, A, DependencyKind::Functional), None);
        assert_eq!(
            g.add_dependency(B, A, DependencyKind::Structural),
            Some(DependencyKind::Functional)
        );
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edge(B, A), Some(DependencyKind::Structural));
        assert_eq!(g.dependents_of(A), vec![B]);
    }

    #[test]
    fn remove_dependency() {
        let mut g = chain();
        assert_eq!(g.remove_dependency(C, B), Some(DependencyKind::Structural));
        assert_eq!(g.remove_dependency(C, B), None);
        assert!(g.dependents_of(B).is_empty());
    }

    // ---------------------------------------------------------------
    // Cycles
    // ---------------------------------------------------------------

    #[test]
    fn chain_has_no_cycle() {
        let g = chain();
        assert!(!g.has_cycle(A) && !g.has_cycle(B) && !g.has_cycle(C));
        assert!(g.is_acyclic());
    }

    #[test]
    fn closing_the_loop_is_detected() {
        let mut g = chain();
        g.add_dependency(A, C, DependencyKind::Structural);
        assert!(g.has_cycle(A) && g.has_cycle(B) && g.has_cycle(C));
        let cycle = g.find_cycle().unwrap();
        assert_eq!(cycle.len(), 3);
    }

    #[test]
    fn has_cycle_only_for_nodes_on_the_cycle() {
        // D -> B, B <-> C
        let mut g = DependencyGraph::new();
        g.add_dependency(D, B, DependencyKind::Functional);
        g.add_dependency(B, C, DependencyKind::Functional);
        g.add_dependency(C, B, DependencyKind::Functional);
        assert!(g.has_cycle(B));
        assert!(!g.has_cycle(D));
        assert!(!g.is_acyclic());
    }

    #[test]
    fn self_edge_is_a_cycle() {
        let mut g = DependencyGraph::new();
        g.add_dependency(A, A, DependencyKind::Structural);
        assert!(g.has_cycle(A));
    }

    #[test]
    fn acyclic_insert_rolls_back() {
        let mut g = chain();
        let err = g
            .add_dependency_acyclic(A, C, DependencyKind::Functional)
            .unwrap_err();
        assert_eq!(err, DepsError::WouldCycle { dependent: A, depends_on: C });
        assert_eq!(g.edge(A, C), None);
        assert_eq!(g.edge_count(), 2);
        assert!(g.is_acyclic());
        assert!(matches!(
            g.add_dependency_acyclic(A, A, DependencyKind::Structural),
            Err(DepsError::SelfDependency(_))
        ));
    }

    #[test]
    fn unknown_object_has_no_cycle() {
        assert!(!DependencyGraph::new().has_cycle(D));
    }

    // ---------------------------------------------------------------
    // Ordering
    // ---------------------------------------------------------------

    #[test]
    fn topological_order_of_chain() {
        let g = chain();
        assert_eq!(g.topological_order(&[A, B, C]).unwrap(), vec![A, B, C]);
        assert_eq!(g.topological_order(&[C, B, A]).unwrap(), vec![A, B, C]);
    }

    #[test]
    fn topological_order_rejects_cycle() {
        let mut g = chain();
        g.add_dependency(A, C, DependencyKind::Structural);
        let err = g.topological_order(&[A, B, C]).unwrap_err();
        assert!(matches!(err, DepsError::Cycle { remaining } if remaining.len() == 3));
    }

    #[test]
    fn dependencies_through_outside_objects_constrain_the_order() {
        let g = chain();
        // C reaches A only through B, which is not being ordered.
        assert_eq!(g.topological_order(&[C, A]).unwrap(), vec![A, C]);
        assert_eq!(g.topological_order(&[A, C]).unwrap(), vec![A, C]);
    }

    #[test]
    fn unrelated_outside_edges_are_ignored() {
        let mut g = chain();
        g.add_dependency(D, C, DependencyKind::Functional);
        assert_eq!(g.topological_order(&[B, A]).unwrap(), vec![A, B]);
    }

    #[test]
    fn cycle_through_outside_object_is_rejected() {
        let mut g = chain();
        g.add_dependency(A, C, DependencyKind::Structural);
        let err = g.topological_order(&[B, A]).unwrap_err();
        assert!(matches!(err, DepsError::Cycle { remaining } if remaining.len() == 2));
    }

    #[test]
    fn ties_follow_input_order() {
        let g = DependencyGraph::new();
        assert_eq!(g.topological_order(&[C, A, B, A]).unwrap(), vec![C, A, B]);
    }

    // ---------------------------------------------------------------
    // Impact
    // ---------------------------------------------------------------

    #[test]
    fn transitive_dependents() {
        let mut g = chain();
        g.add_dependency(D, A, DependencyKind::Functional);
        assert_eq!(g.dependents(A), vec![B, C, D]);
        assert_eq!(g.structural_dependents(A), vec![B, C]);
        assert!(g.dependents(C).is_empty());
    }

    #[test]
    fn export_roundtrip() {
        let g = chain();
        let restored = DependencyGraph::from_bytes(&g.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.edges(), g.edges());
    }

    // ---------------------------------------------------------------
    // Properties
    // ---------------------------------------------------------------

    proptest! {
        /// Edges only from higher to lower ids: always acyclic, and the
        /// order must respect every direct and transitive dependency.
        #[test]
        fn order_respects_every_edge(
            edges in prop::collection::vec((0u64..12, 0u64..12), 0..40),
            shuffle in prop::collection::vec(0u64..12, 0..24),
        ) {
            let mut g = DependencyGraph::new();
            for (x, y) in &edges {
                if x > y {
                    g.add_dependency(ObjectId::new(*x), ObjectId::new(*y), DependencyKind::Structural);
                }
            }
            let ids: Vec<ObjectId> = shuffle.iter().map(|i| ObjectId::new(*i)).collect();
            let order = g.topological_order(&ids).unwrap();
            let pos: HashMap<ObjectId, usize> =
                order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
            for (t, at) in &pos {
                for dependent in g.dependents(*t) {
                    if let Some(ad) = pos.get(&dependent) {
                        prop_assert!(at < ad);
                    }
                }
            }
            prop_assert!(g.is_acyclic());
        }

        #[test]
        fn has_cycle_iff_self_reachable(
            edges in prop::collection::vec((0u64..6, 0u64..6), 0..12),
        ) {
            let mut g = DependencyGraph::new();
            for (x, y) in &edges {
                g.add_dependency(ObjectId::new(*x), ObjectId::new(*y), DependencyKind::Functional);
            }
            for n in 0..6u64 {
                let id = ObjectId::new(n);
                let reaches_self = g
                    .dependencies_of(id)
                    .iter()
                    .any(|(dep, _)| *dep == id || g.dependents(id).contains(dep));
                prop_assert_eq!(g.has_cycle(id), reaches_self);
            }
        }
    }
}
