//! Three-way classification of every object path.

use std::collections::BTreeSet;

use dbv_store::Tree;
use dbv_types::{ContentHash, ObjectType};
use serde::{Deserialize, Serialize};

/// How one object differs across base, source and target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClassification {
    /// Same on all three sides.
    Unchanged,
    /// Only the source changed it. Keep source.
    SourceOnlyChanged,
    /// Only the target changed it. Keep target.
    TargetOnlyChanged,
    /// Added on both sides with identical content.
    BothAddedSame,
    /// Added on both sides with different content.
    BothAddedDifferent,
    /// Both sides changed it to the same content.
    BothModifiedSame,
    /// Both sides changed it, differently. Includes modify versus delete.
    BothModifiedDifferent,
    /// Present at base, removed on both sides.
    BothRemoved,
}

impl ObjectClassification {
    /// Classify one object from its hash on each side (`None` = absent).
    ///
    /// Returns `None` when the object is absent everywhere.
    pub fn classify(
        base: Option<ContentHash>,
        source: Option<ContentHash>,
        target: Option<ContentHash>,
    ) -> Option<Self> {
        if base.is_none() && source.is_none() && target.is_none() {
            return None;
        }
        let class = if source == target {
            match (base == source, base, source) {
                (true, _, _) => Self::Unchanged,
                (false, None, _) => Self::BothAddedSame,
                (false, Some(_), None) => Self::BothRemoved,
                (false, Some(_), Some(_)) => Self::BothModifiedSame,
            }
        } else if source == base {
            Self::TargetOnlyChanged
        } else if target == base {
            Self::SourceOnlyChanged
        } else if base.is_none() {
            Self::BothAddedDifferent
        } else {
            Self::BothModifiedDifferent
        };
        Some(class)
    }

    /// True conflicts: both sides diverged from the base and from each other.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::BothAddedDifferent | Self::BothModifiedDifferent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::SourceOnlyChanged => "source_only_changed",
            Self::TargetOnlyChanged => "target_only_changed",
            Self::BothAddedSame => "both_added_same",
            Self::BothAddedDifferent => "both_added_different",
            Self::BothModifiedSame => "both_modified_same",
            Self::BothModifiedDifferent => "both_modified_different",
            Self::BothRemoved => "both_removed",
        }
    }
}

impl std::fmt::Display for ObjectClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object's three-way state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMerge {
    pub path: String,
    pub object_type: ObjectType,
    pub base: Option<ContentHash>,
    pub source: Option<ContentHash>,
    pub target: Option<ContentHash>,
    pub classification: ObjectClassification,
}

impl ObjectMerge {
    /// The merged value for non-conflicting objects (`None` = absent).
    ///
    /// Conflicts have no automatic value and return `None` too; check
    /// [`ObjectClassification::is_conflict`] first.
    pub fn auto_value(&self) -> Option<ContentHash> {
        match self.classification {
            ObjectClassification::Unchanged => self.base,
            ObjectClassification::SourceOnlyChanged => self.source,
            ObjectClassification::TargetOnlyChanged
            | ObjectClassification::BothAddedSame
            | ObjectClassification::BothModifiedSame => self.target,
            ObjectClassification::BothRemoved
            | ObjectClassification::BothAddedDifferent
            | ObjectClassification::BothModifiedDifferent => None,
        }
    }
}

/// Three-way classification of every path, sorted by path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeWayDiff {
    pub entries: Vec<ObjectMerge>,
}

impl ThreeWayDiff {
    pub fn get(&self, path: &str) -> Option<&ObjectMerge> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &ObjectMerge> {
        self.entries.iter().filter(|e| e.classification.is_conflict())
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts().count()
    }

    pub fn count(&self, class: ObjectClassification) -> usize {
        self.entries
            .iter()
            .filter(|e| e.classification == class)
            .count()
    }
}

/// Compare the source and target snapshots against their merge base.
///
/// An empty `base` tree means the branches share no history.
pub fn three_way_diff(base: &Tree, source: &Tree, target: &Tree) -> ThreeWayDiff {
    let paths: BTreeSet<&str> = base
        .entries()
        .iter()
        .chain(source.entries())
        .chain(target.entries())
        .map(|e| e.path.as_str())
        .collect();

    let entries = paths
        .into_iter()
        .filter_map(|path| {
            let b = base.get(path);
            let s = source.get(path);
            let t = target.get(path);
            let classification = ObjectClassification::classify(
                b.map(|e| e.blob),
                s.map(|e| e.blob),
                t.map(|e| e.blob),
            )?;
            let object_type = t.or(s).or(b).map(|e| e.object_type)?;
            Some(ObjectMerge {
                path: path.to_string(),
                object_type,
                base: b.map(|e| e.blob),
                source: s.map(|e| e.blob),
                target: t.map(|e| e.blob),
                classification,
            })
        })
        .collect();

    ThreeWayDiff { entries }
}
