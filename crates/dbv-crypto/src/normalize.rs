//! Definition normalization.
//!
//! Two definitions that differ only in trailing whitespace, blank-line runs,
//! line endings or a trailing statement terminator normalize to the same
//! text and therefore hash identically.

use dbv_types::ContentHash;

use crate::hasher::ContentHasher;

/// Normalize an object definition before hashing and storage.
///
/// - CRLF line endings become LF
/// - trailing whitespace is stripped from every line
/// - runs of blank lines collapse to a single blank line
/// - leading and trailing blank lines are removed
/// - a single trailing `;` is dropped
pub fn normalize_definition(definition: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for raw in definition.split('\n') {
        let line = raw.trim_end_matches('\r').trim_end();
        let blank = line.is_empty();
        if blank && (previous_blank || lines.is_empty()) {
            continue;
        }
        lines.push(line);
        previous_blank = blank;
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let mut text = lines.join("\n");
    if text.ends_with(';') {
        text.pop();
        let trimmed = text.trim_end().len();
        text.truncate(trimmed);
    }
    text
}

/// Hash a definition: normalize, then hash with the blob domain.
pub fn compute_hash(definition: &str) -> ContentHash {
    ContentHasher::BLOB.hash(normalize_definition(definition).as_bytes())
}
