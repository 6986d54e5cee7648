//! Definition-level diff: line-by-line comparison of two object definitions.
//!
//! Used when inspecting a conflict. Hunks are computed with `similar`
//! (Myers diff) over normalized definition text, with three lines of context.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

const CONTEXT_LINES: usize = 3;

/// The result of diffing two definitions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionDiff {
    pub hunks: Vec<DiffHunk>,
    pub old_lines: usize,
    pub new_lines: usize,
}

impl DefinitionDiff {
    /// Returns `true` if the two definitions are identical.
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }

    /// Total number of lines added across all hunks.
    pub fn additions(&self) -> usize {
        self.lines()
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .count()
    }

    /// Total number of lines removed across all hunks.
    pub fn deletions(&self) -> usize {
        self.lines()
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .count()
    }

    /// Render as unified diff text with the given labels.
    pub fn to_unified(&self, old_label: &str, new_label: &str) -> String {
        let mut out = format!("--- {old_label}\n+++ {new_label}\n");
        for hunk in &self.hunks {
            out.push_str(&format!(
                "@@ -{},{} +{},{} @@\n",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            ));
            for line in &hunk.lines {
                let (prefix, text) = match line {
                    DiffLine::Context(t) => (' ', t),
                    DiffLine::Added(t) => ('+', t),
                    DiffLine::Removed(t) => ('-', t),
                };
                out.push(prefix);
                out.push_str(text);
                out.push('\n');
            }
        }
        out
    }

    fn lines(&self) -> impl Iterator<Item = &DiffLine> {
        self.hunks.iter().flat_map(|h| &h.lines)
    }
}

/// A contiguous region of changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// 1-based start line in the old definition.
    pub old_start: usize,
    pub old_count: usize,
    /// 1-based start line in the new definition.
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// A single line in a hunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "snake_case")]
pub enum DiffLine {
    Context(String),
    Added(String),
    Removed(String),
}

/// Compute a line diff between two definitions.
pub fn diff_definitions(old: &str, new: &str) -> DefinitionDiff {
    let old_lines = old.lines().count();
    let new_lines = new.lines().count();
    if old == new {
        return DefinitionDiff {
            hunks: Vec::new(),
            old_lines,
            new_lines,
        };
    }

    let text_diff = TextDiff::from_lines(old, new);
    let mut hunks = Vec::new();

    for group in text_diff.grouped_ops(CONTEXT_LINES) {
        let Some(first) = group.first() else {
            continue;
        };
        let mut hunk = DiffHunk {
            old_start: first.old_range().start + 1,
            old_count: 0,
            new_start: first.new_range().start + 1,
            new_count: 0,
            lines: Vec::new(),
        };

        for op in &group {
            for change in text_diff.iter_changes(op) {
                let text = change.value().trim_end_matches('\n').to_string();
                match change.tag() {
                    ChangeTag::Equal => {
                        hunk.lines.push(DiffLine::Context(text));
                        hunk.old_count += 1;
                        hunk.new_count += 1;
                    }
                    ChangeTag::Delete => {
                        hunk.lines.push(DiffLine::Removed(text));
                        hunk.old_count += 1;
                    }
                    ChangeTag::Insert => {
                        hunk.lines.push(DiffLine::Added(text));
                        hunk.new_count += 1;
                    }
                }
            }
        }
        hunks.push(hunk);
    }

    DefinitionDiff {
        hunks,
        old_lines,
        new_lines,
    }
}
