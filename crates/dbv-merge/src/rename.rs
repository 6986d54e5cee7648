//! Best-effort rename detection.
//!
//! An object that exists only on one side and a same-typed object in the
//! same schema that exists only on the other side, with names a few edits
//! apart, were probably renamed. Hints are informational and never block a
//! merge.

use dbv_store::Tree;
use dbv_types::{ObjectKey, ObjectType};
use serde::{Deserialize, Serialize};

/// A likely rename between the two sides of a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameHint {
    pub object_type: ObjectType,
    /// Path that exists only in the source.
    pub source_path: String,
    /// Path that exists only in the target.
    pub target_path: String,
    pub distance: usize,
}

/// Levenshtein distance between two strings, by characters.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}

/// Pair up paths present on only one side whose names are within
/// `max_distance` edits. Each path appears in at most one hint, closest
/// match first.
pub fn detect_renames(source: &Tree, target: &Tree, max_distance: usize) -> Vec<RenameHint> {
    let only = |a: &Tree, b: &Tree| -> Vec<ObjectKey> {
        a.entries()
            .iter()
            .filter(|e| b.get(&e.path).is_none())
            .filter_map(|e| ObjectKey::from_path(&e.path).ok())
            .collect()
    };
    let source_only = only(source, target);
    let target_only = only(target, source);

    let mut candidates: Vec<(usize, &ObjectKey, &ObjectKey)> = Vec::new();
    for s in &source_only {
        for t in &target_only {
            if s.object_type != t.object_type || s.schema != t.schema {
                continue;
            }
            let distance = edit_distance(&s.name, &t.name);
            if distance > 0 && distance <= max_distance {
                candidates.push((distance, s, t));
            }
        }
    }
    candidates.sort_by(|x, y| x.0.cmp(&y.0).then_with(|| x.1.cmp(y.1)).then_with(|| x.2.cmp(y.2)));

    let mut used_source = Vec::new();
    let mut used_target = Vec::new();
    let mut hints = Vec::new();
    for (distance, s, t) in candidates {
        if used_source.contains(&s) || used_target.contains(&t) {
            continue;
        }
        used_source.push(s);
        used_target.push(t);
        hints.push(RenameHint {
            object_type: s.object_type,
            source_path: s.path(),
            target_path: t.path(),
            distance,
        });
    }
    hints
}
