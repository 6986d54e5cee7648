//! Branch diff: per-path classification of two branch snapshots.
//!
//! Every path in either tree is classified relative to the first (`left`)
//! branch. When the merge base is known, a path that both branches changed
//! away from the base in different ways is reported as CONFLICT instead.

use std::collections::BTreeSet;

use dbv_store::Tree;
use dbv_types::{ContentHash, ObjectType};
use serde::{Deserialize, Serialize};

/// Classification of one path in a branch diff.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStatus {
    /// Present only on the right branch.
    Added,
    /// Present only on the left branch.
    Removed,
    /// Present on both with different content.
    Modified,
    Unchanged,
    /// Both branches diverged from the merge base and from each other.
    Conflict,
}

impl PathStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Removed => "REMOVED",
            Self::Modified => "MODIFIED",
            Self::Unchanged => "UNCHANGED",
            Self::Conflict => "CONFLICT",
        }
    }
}

impl std::fmt::Display for PathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a branch diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDiff {
    pub path: String,
    pub object_type: ObjectType,
    pub status: PathStatus,
    pub left: Option<ContentHash>,
    pub right: Option<ContentHash>,
    pub base: Option<ContentHash>,
}

/// Per-path comparison of two branches, sorted by path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDiff {
    pub entries: Vec<PathDiff>,
}

impl BranchDiff {
    /// Rows with the given status.
    pub fn with_status(&self, status: PathStatus) -> impl Iterator<Item = &PathDiff> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    pub fn count(&self, status: PathStatus) -> usize {
        self.with_status(status).count()
    }

    pub fn get(&self, path: &str) -> Option<&PathDiff> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// `true` if no row is anything but UNCHANGED.
    pub fn is_identical(&self) -> bool {
        self.entries.iter().all(|e| e.status == PathStatus::Unchanged)
    }
}

/// Classify every path of `left` and `right`.
///
/// `base` is the snapshot at the branches' merge base; pass `None` to
/// disable conflict detection (pure two-way comparison).
pub fn diff_branches(left: &Tree, right: &Tree, base: Option<&Tree>) -> BranchDiff {
    let paths: BTreeSet<&str> = left
        .entries()
        .iter()
        .chain(right.entries())
        .map(|e| e.path.as_str())
        .collect();

    let entries = paths
        .into_iter()
        .map(|path| {
            let l = left.get(path);
            let r = right.get(path);
            let lh = l.map(|e| e.blob);
            let rh = r.map(|e| e.blob);
            let bh = base.and_then(|b| b.blob_at(path));

            let status = if lh == rh {
                PathStatus::Unchanged
            } else if base.is_some() && lh != bh && rh != bh {
                PathStatus::Conflict
            } else {
                match (lh, rh) {
                    (None, Some(_)) => PathStatus::Added,
                    (Some(_), None) => PathStatus::Removed,
                    _ => PathStatus::Modified,
                }
            };

            let object_type = r.or(l).map(|e| e.object_type).unwrap_or(ObjectType::Table);
            PathDiff {
                path: path.to_string(),
                object_type,
                status,
                left: lh,
                right: rh,
                base: bh,
            }
        })
        .collect();

    BranchDiff { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbv_store::TreeEntry;

    fn h(b: u8) -> ContentHash {
        ContentHash::from_hash([b; 32])
    }

    fn tree(entries: &[(&str, u8)]) -> Tree {
        Tree::new(
            entries
                .iter()
                .map(|(p, b)| TreeEntry::new(*p, ObjectType::Table, h(*b)))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn two_way_classification() {
        let left = tree(&[("table/a.same", 1), ("table/a.edit", 2), ("table/a.gone", 3)]);
        let right = tree(&[("table/a.same", 1), ("table/a.edit", 4), ("table/a.new", 5)]);
        let diff = diff_branches(&left, &right, None);

        assert_eq!(diff.get("table/a.same").unwrap().status, PathStatus::Unchanged);
        assert_eq!(diff.get("table/a.edit").unwrap().status, PathStatus::Modified);
        assert_eq!(diff.get("table/a.gone").unwrap().status, PathStatus::Removed);
        assert_eq!(diff.get("table/a.new").unwrap().status, PathStatus::Added);
        assert_eq!(diff.count(PathStatus::Conflict), 0);
    }

    #[test]
    fn both_changed_differently_is_conflict() {
        let base = tree(&[("table/a.x", 1)]);
        let left = tree(&[("table/a.x", 2)]);
        let right = tree(&[("table/a.x", 3)]);
        let diff = diff_branches(&left, &right, Some(&base));
        let row = diff.get("table/a.x").unwrap();
        assert_eq!(row.status, PathStatus::Conflict);
        assert_eq!(row.base, Some(h(1)));
    }

    #[test]
    fn one_sided_change_is_not_conflict() {
        let base = tree(&[("table/a.x", 1)]);
        let left = tree(&[("table/a.x", 1)]);
        let right = tree(&[("table/a.x", 3)]);
        let diff = diff_branches(&left, &right, Some(&base));
        assert_eq!(diff.get("table/a.x").unwrap().status, PathStatus::Modified);
    }

    #[test]
    fn delete_versus_modify_is_conflict() {
        let base = tree(&[("table/a.x", 1)]);
        let left = Tree::empty();
        let right = tree(&[("table/a.x", 3)]);
        let diff = diff_branches(&left, &right, Some(&base));
        assert_eq!(diff.get("table/a.x").unwrap().status, PathStatus::Conflict);
    }

    #[test]
    fn identical_branches() {
        let t = tree(&[("table/a.x", 1)]);
        assert!(diff_branches(&t, &t, Some(&t)).is_identical());
    }

    #[test]
    fn status_wire_format() {
        let json = serde_json::to_string(&PathStatus::Unchanged).unwrap();
        assert_eq!(json, "\"UNCHANGED\"");
    }
}
