//! Branch name validation.
//!
//! Valid branch names:
//! - are 1 to 128 characters of ASCII letters, digits, `_`, `-`, `.` and `/`
//! - do not contain `..` or `//`
//! - do not start or end with `.` or `/`
//! - have no path component starting with `.`
//! - do not end with `.lock`

use crate::error::{RefError, RefResult};

/// Longest accepted branch name.
pub const MAX_BRANCH_NAME_LEN: usize = 128;

fn is_allowed(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.' | '/')
}

/// Validate a branch name, returning `Ok(())` if valid.
///
/// ```
/// use dbv_refs::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("feature/add-email").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> RefResult<()> {
    let invalid = |reason: String| RefError::InvalidBranchName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("branch name must not be empty".into()));
    }
    if name.len() > MAX_BRANCH_NAME_LEN {
        return Err(invalid(format!(
            "longer than {MAX_BRANCH_NAME_LEN} characters"
        )));
    }
    if let Some(ch) = name.chars().find(|c| !is_allowed(*c)) {
        return Err(invalid(format!("contains forbidden character: {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid("must not contain '..'".into()));
    }
    if name.contains("//") {
        return Err(invalid("must not contain consecutive slashes '//'".into()));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid("must not start or end with '.'".into()));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("must not start or end with '/'".into()));
    }
    if name.ends_with(".lock") {
        return Err(invalid("must not end with '.lock'".into()));
    }
    if let Some(component) = name.split('/').find(|c| c.starts_with('.')) {
        return Err(invalid(format!(
            "component must not start with '.': {component:?}"
        )));
    }
    Ok(())
}
