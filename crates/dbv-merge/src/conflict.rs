//! Conflict types, severity scoring and resolution heuristics.

use std::collections::BTreeSet;
use std::fmt;

use dbv_diff::{diff_trees, TreeChange};
use dbv_store::{ObjectStore, Tree};
use dbv_types::{ContentHash, ObjectType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::MergeResult;

/// Clause keywords that enforce data integrity.
const INTEGRITY_KEYWORDS: [&str; 5] = ["PRIMARY KEY", "FOREIGN KEY", "REFERENCES", "UNIQUE", "CHECK"];

/// What happened to the object on the incoming side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictChange {
    Added,
    Removed,
    Modified,
}

impl ConflictChange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

/// Object type plus change, serialized as e.g. `"table_added"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConflictType {
    pub object_type: ObjectType,
    pub change: ConflictChange,
}

impl ConflictType {
    pub fn new(object_type: ObjectType, change: ConflictChange) -> Self {
        Self { object_type, change }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.object_type, self.change.as_str())
    }
}

impl Serialize for ConflictType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConflictType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let (type_part, change_part) = s
            .rsplit_once('_')
            .ok_or_else(|| serde::de::Error::custom(format!("invalid conflict type {s:?}")))?;
        let change = match change_part {
            "added" => ConflictChange::Added,
            "removed" => ConflictChange::Removed,
            "modified" => ConflictChange::Modified,
            other => {
                return Err(serde::de::Error::custom(format!("invalid change {other:?}")))
            }
        };
        let object_type = type_part.parse().map_err(serde::de::Error::custom)?;
        Ok(Self { object_type, change })
    }
}

/// Risk of a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        })
    }
}

/// Which side to keep. Ours is the target branch, theirs the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Ours,
    Theirs,
}

/// A caller's answer to a conflict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", content = "definition", rename_all = "snake_case")]
pub enum ResolutionChoice {
    Ours,
    Theirs,
    /// A hand-written definition replacing both sides.
    Custom(String),
}

impl From<Resolution> for ResolutionChoice {
    fn from(r: Resolution) -> Self {
        match r {
            Resolution::Ours => Self::Ours,
            Resolution::Theirs => Self::Theirs,
        }
    }
}

/// A recorded resolution and the value it produces.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub choice: ResolutionChoice,
    /// Resulting blob (`None` = the object is absent after the merge).
    pub value: Option<ContentHash>,
    /// `true` if applied by the merge strategy rather than a caller.
    pub automatic: bool,
}

/// The definitions involved in a conflict, where present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDefinitions {
    pub base: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
}

impl ConflictDefinitions {
    /// Load the definitions for three optional blob hashes.
    pub fn load(
        store: &dyn ObjectStore,
        base: Option<ContentHash>,
        source: Option<ContentHash>,
        target: Option<ContentHash>,
    ) -> MergeResult<Self> {
        let read = |h: Option<ContentHash>| -> MergeResult<Option<String>> {
            h.map(|h| store.definition(&h)).transpose().map_err(Into::into)
        };
        Ok(Self {
            base: read(base)?,
            source: read(source)?,
            target: read(target)?,
        })
    }

    fn present(&self) -> impl Iterator<Item = &str> {
        [&self.base, &self.source, &self.target]
            .into_iter()
            .filter_map(|d| d.as_deref())
    }
}

/// A conflict within a merge operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub merge_id: Uuid,
    pub path: String,
    pub object_type: ObjectType,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub base: Option<ContentHash>,
    /// Theirs.
    pub source: Option<ContentHash>,
    /// Ours.
    pub target: Option<ContentHash>,
    pub suggestion: Option<Resolution>,
    pub resolution: Option<ConflictResolution>,
}

impl Conflict {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// The blob a side-based choice selects.
    pub fn side(&self, resolution: Resolution) -> Option<ContentHash> {
        match resolution {
            Resolution::Ours => self.target,
            Resolution::Theirs => self.source,
        }
    }
}

// ---------------------------------------------------------------------------
// Severity and suggestions
// ---------------------------------------------------------------------------

/// Integrity clauses of a definition, one per matching line, normalized
/// to upper case with collapsed whitespace.
fn integrity_clauses(definition: &str) -> BTreeSet<String> {
    definition
        .lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase())
        .filter(|l| INTEGRITY_KEYWORDS.iter().any(|k| l.contains(k)))
        .map(|l| l.trim_end_matches(',').to_string())
        .collect()
}

fn is_required_without_default(definition: &str) -> bool {
    let upper = definition.to_ascii_uppercase();
    upper.contains("NOT NULL") && !upper.contains("DEFAULT")
}

/// Score a conflict.
///
/// - CRITICAL: a modification or removal that touches integrity rules (a
///   constraint object, a unique index, or integrity clauses that differ
///   between sides or disappear).
/// - WARNING: add, remove or modify of a container; removal or modification
///   of a member; adding a member that is NOT NULL without a DEFAULT.
/// - INFO: everything else additive or low-risk (new index, nullable or
///   defaulted member, removed index or sequence).
pub fn classify_severity(
    conflict_type: ConflictType,
    definitions: &ConflictDefinitions,
) -> ConflictSeverity {
    let object_type = conflict_type.object_type;
    let change = conflict_type.change;

    if matches!(change, ConflictChange::Modified | ConflictChange::Removed) {
        let unique_index = object_type == ObjectType::Index
            && definitions
                .present()
                .any(|d| d.to_ascii_uppercase().contains("UNIQUE"));
        if object_type.is_integrity_rule() || unique_index {
            return ConflictSeverity::Critical;
        }

        let clause_sets: Vec<BTreeSet<String>> =
            definitions.present().map(integrity_clauses).collect();
        let has_clauses = clause_sets.iter().any(|s| !s.is_empty());
        let clauses_differ = clause_sets.windows(2).any(|w| w[0] != w[1]);
        if has_clauses && (clauses_differ || change == ConflictChange::Removed) {
            return ConflictSeverity::Critical;
        }
    }

    match change {
        ConflictChange::Added => {
            let required = definitions.present().any(is_required_without_default);
            if object_type.is_container() || (object_type.is_member() && required) {
                ConflictSeverity::Warning
            } else {
                ConflictSeverity::Info
            }
        }
        ConflictChange::Removed => {
            if matches!(object_type, ObjectType::Index | ObjectType::Sequence) {
                ConflictSeverity::Info
            } else {
                ConflictSeverity::Warning
            }
        }
        ConflictChange::Modified => ConflictSeverity::Warning,
    }
}

/// Suggest a side for a conflict, or `None` when it needs a human.
///
/// INFO additions and removals accept the incoming side, as do additive
/// members that cannot break existing rows (nullable or defaulted).
pub fn suggest_resolution(
    conflict_type: ConflictType,
    severity: ConflictSeverity,
    definitions: &ConflictDefinitions,
) -> Option<Resolution> {
    let change = conflict_type.change;
    if severity == ConflictSeverity::Info
        && matches!(change, ConflictChange::Added | ConflictChange::Removed)
    {
        return Some(Resolution::Theirs);
    }
    if change == ConflictChange::Added
        && conflict_type.object_type.is_member()
        && severity != ConflictSeverity::Critical
        && !definitions.present().any(is_required_without_default)
    {
        return Some(Resolution::Theirs);
    }
    None
}

// ---------------------------------------------------------------------------
// Two-way detection
// ---------------------------------------------------------------------------

/// One difference found by [`detect_conflicts`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedConflict {
    pub path: String,
    pub object_type: ObjectType,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub suggestion: Option<Resolution>,
    pub source: Option<ContentHash>,
    pub target: Option<ContentHash>,
}

/// Read-only comparison of a source branch against a target branch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<DetectedConflict>,
}

impl ConflictReport {
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&DetectedConflict> {
        self.conflicts.iter().find(|c| c.path == path)
    }

    pub fn count(&self, severity: ConflictSeverity) -> usize {
        self.conflicts.iter().filter(|c| c.severity == severity).count()
    }

    /// The most severe entry, if any.
    pub fn max_severity(&self) -> Option<ConflictSeverity> {
        self.conflicts.iter().map(|c| c.severity).max()
    }
}

/// Compare `source` with `target` path by path.
///
/// An object only in the source is `{type}_added`, only in the target is
/// `{type}_removed`, and with differing content on both is
/// `{type}_modified`. Each entry is scored and given a suggestion.
pub fn detect_conflicts(
    source: &Tree,
    target: &Tree,
    store: &dyn ObjectStore,
) -> MergeResult<ConflictReport> {
    let diff = diff_trees(target, source);
    let mut conflicts = Vec::with_capacity(diff.len());

    for change in diff.changes() {
        let kind = match change {
            TreeChange::Added { .. } => ConflictChange::Added,
            TreeChange::Removed { .. } => ConflictChange::Removed,
            TreeChange::Modified { .. } => ConflictChange::Modified,
        };
        let conflict_type = ConflictType::new(change.object_type(), kind);
        let source_hash = change.new_hash();
        let target_hash = change.old_hash();
        let definitions = ConflictDefinitions::load(store, None, source_hash, target_hash)?;
        let severity = classify_severity(conflict_type, &definitions);
        conflicts.push(DetectedConflict {
            path: change.path().to_string(),
            object_type: change.object_type(),
            conflict_type,
            severity,
            suggestion: suggest_resolution(conflict_type, severity, &definitions),
            source: source_hash,
            target: target_hash,
        });
    }

    Ok(ConflictReport { conflicts })
}
