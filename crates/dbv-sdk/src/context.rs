use dbv_types::ContentHash;
use serde::{Deserialize, Serialize};

/// Who is acting, and on which branch.
///
/// Every repository call takes its branch from a context rather than from
/// any "current branch" state. Pinning an expected head turns the call
/// into a compare-and-swap: it fails with a concurrency error if the
/// branch moved since the caller read it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub branch: String,
    pub author: String,
    /// Head the caller last observed. `None` means "whatever is current".
    pub expected_head: Option<ContentHash>,
}

impl Context {
    pub fn new(branch: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            author: author.into(),
            expected_head: None,
        }
    }

    /// Require the branch head to still be `head` when the call commits.
    pub fn at_head(mut self, head: ContentHash) -> Self {
        self.expected_head = Some(head);
        self
    }

    /// The same author acting on another branch.
    pub fn on_branch(&self, branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            author: self.author.clone(),
            expected_head: None,
        }
    }
}
