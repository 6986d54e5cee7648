use std::collections::BTreeMap;

use dbv_types::{ContentHash, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::branch::{Branch, BranchStatus, CowStats};
use crate::error::{RefError, RefResult};
use crate::names::validate_branch_name;

/// Every branch in a repository, keyed by name.
///
/// The registry is a plain value; callers that share it across threads
/// wrap it in their own lock so head advancement can be made atomic with
/// the commit append that precedes it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BranchRegistry {
    branches: BTreeMap<String, Branch>,
}

impl BranchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Create a branch.
    ///
    /// A root branch has no parent and no head. A child branch starts with
    /// its head at the parent's current head; `inherited` is the number of
    /// live objects it shares with the parent.
    pub fn create(
        &mut self,
        name: &str,
        parent: Option<&str>,
        inherited: u64,
        created_at: Timestamp,
    ) -> RefResult<&Branch> {
        validate_branch_name(name)?;
        if self.branches.contains_key(name) {
            return Err(RefError::AlreadyExists {
                name: name.to_string(),
            });
        }

        let fork_commit = match parent {
            Some(p) => {
                let parent_branch = self.require(p)?;
                if parent_branch.status == BranchStatus::Deleted {
                    return Err(RefError::NotWritable {
                        name: p.to_string(),
                        status: parent_branch.status,
                    });
                }
                parent_branch.head
            }
            None => None,
        };

        let branch = Branch {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            fork_commit,
            head: fork_commit,
            status: BranchStatus::Active,
            stats: CowStats {
                objects_inherited: inherited,
                objects_modified: 0,
            },
            created_at,
        };
        debug!(branch = %name, parent = ?parent, "created branch");
        Ok(self.branches.entry(name.to_string()).or_insert(branch))
    }

    pub fn get(&self, name: &str) -> Option<&Branch> {
        self.branches.get(name)
    }

    /// Like [`get`](Self::get) but returns `NotFound` when missing.
    pub fn require(&self, name: &str) -> RefResult<&Branch> {
        self.branches.get(name).ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// All branches, sorted by name.
    pub fn list(&self) -> Vec<&Branch> {
        self.branches.values().collect()
    }

    /// Branches with the given status.
    pub fn with_status(&self, status: BranchStatus) -> Vec<&Branch> {
        self.branches
            .values()
            .filter(|b| b.status == status)
            .collect()
    }

    /// Check that `name` can take a new head expected to replace `expected`.
    ///
    /// Split from [`advance_head`](Self::advance_head) so a caller can
    /// validate before performing other writes of the same unit.
    pub fn check_advance(&self, name: &str, expected: Option<&ContentHash>) -> RefResult<()> {
        let branch = self.require(name)?;
        if !branch.status.is_writable() {
            return Err(RefError::NotWritable {
                name: name.to_string(),
                status: branch.status,
            });
        }
        if branch.head.as_ref() != expected {
            warn!(
                branch = %name,
                expected = ?expected.map(|h| h.short_hex()),
                actual = ?branch.head.map(|h| h.short_hex()),
                "head compare-and-swap failed"
            );
            return Err(RefError::HeadMoved {
                name: name.to_string(),
                expected: expected.copied(),
                actual: branch.head,
            });
        }
        Ok(())
    }

    /// Compare-and-swap the head of `name` from `expected` to `new`.
    pub fn advance_head(
        &mut self,
        name: &str,
        expected: Option<&ContentHash>,
        new: ContentHash,
    ) -> RefResult<()> {
        self.check_advance(name, expected)?;
        let branch = self.get_mut(name)?;
        branch.head = Some(new);
        debug!(branch = %name, head = %new.short_hex(), "advanced head");
        Ok(())
    }

    /// Move a branch to a new lifecycle status.
    ///
    /// Setting the current status again is a no-op.
    pub fn set_status(&mut self, name: &str, to: BranchStatus) -> RefResult<()> {
        let branch = self.get_mut(name)?;
        if branch.status == to {
            return Ok(());
        }
        if !branch.status.can_transition_to(to) {
            return Err(RefError::InvalidTransition {
                name: name.to_string(),
                from: branch.status,
                to,
            });
        }
        debug!(branch = %name, from = %branch.status, to = %to, "branch status changed");
        branch.status = to;
        Ok(())
    }

    /// Add to the count of objects modified on the branch.
    pub fn record_modified(&mut self, name: &str, newly_modified: u64) -> RefResult<()> {
        let branch = self.get_mut(name)?;
        branch.stats.objects_modified += newly_modified;
        Ok(())
    }

    fn get_mut(&mut self, name: &str) -> RefResult<&mut Branch> {
        self.branches.get_mut(name).ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(b: u8) -> ContentHash {
        ContentHash::from_hash([b; 32])
    }

    fn registry_with_main() -> BranchRegistry {
        let mut reg = BranchRegistry::new();
        reg.create("main", None, 0, Timestamp::zero()).unwrap();
        reg
    }

    // ---------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------

    #[test]
    fn create_root_branch() {
        let reg = registry_with_main();
        let main = reg.get("main").unwrap();
        assert!(main.is_root());
        assert_eq!(main.head, None);
        assert_eq!(main.status, BranchStatus::Active);
    }

    #[test]
    fn child_forks_at_parent_head() {
        let mut reg = registry_with_main();
        reg.advance_head("main", None, h(1)).unwrap();
        let feature = reg.create("feature", Some("main"), 3, Timestamp::zero()).unwrap();
        assert_eq!(feature.fork_commit, Some(h(1)));
        assert_eq!(feature.head, Some(h(1)));
        assert_eq!(feature.parent.as_deref(), Some("main"));
        assert_eq!(feature.stats.objects_inherited, 3);
    }

    #[test]
    fn duplicate_and_invalid_names_rejected() {
        let mut reg = registry_with_main();
        assert!(matches!(
            reg.create("main", None, 0, Timestamp::zero()),
            Err(RefError::AlreadyExists { .. })
        ));
        assert!(matches!(
            reg.create("bad name", None, 0, Timestamp::zero()),
            Err(RefError::InvalidBranchName { .. })
        ));
        assert!(matches!(
            reg.create("x", Some("ghost"), 0, Timestamp::zero()),
            Err(RefError::NotFound { .. })
        ));
    }

    #[test]
    fn cannot_fork_deleted_branch() {
        let mut reg = registry_with_main();
        reg.create("old", Some("main"), 0, Timestamp::zero()).unwrap();
        reg.set_status("old", BranchStatus::Deleted).unwrap();
        assert!(matches!(
            reg.create("new", Some("old"), 0, Timestamp::zero()),
            Err(RefError::NotWritable { .. })
        ));
    }

    // ---------------------------------------------------------------
    // Head compare-and-swap
    // ---------------------------------------------------------------

    #[test]
    fn advance_head_requires_expected_head() {
        let mut reg = registry_with_main();
        reg.advance_head("main", None, h(1)).unwrap();
        reg.advance_head("main", Some(&h(1)), h(2)).unwrap();

        let err = reg.advance_head("main", Some(&h(1)), h(3)).unwrap_err();
        assert_eq!(
            err,
            RefError::HeadMoved {
                name: "main".into(),
                expected: Some(h(1)),
                actual: Some(h(2)),
            }
        );
        assert_eq!(reg.get("main").unwrap().head, Some(h(2)));
    }

    #[test]
    fn conflicted_branch_is_not_writable() {
        let mut reg = registry_with_main();
        reg.set_status("main", BranchStatus::Conflicted).unwrap();
        assert!(matches!(
            reg.advance_head("main", None, h(1)),
            Err(RefError::NotWritable { status: BranchStatus::Conflicted, .. })
        ));
        reg.set_status("main", BranchStatus::Active).unwrap();
        reg.advance_head("main", None, h(1)).unwrap();
    }

    #[test]
    fn merged_branch_is_not_writable() {
        let mut reg = registry_with_main();
        reg.create("feature", Some("main"), 0, Timestamp::zero()).unwrap();
        reg.set_status("feature", BranchStatus::Merged).unwrap();
        assert!(matches!(
            reg.advance_head("feature", None, h(1)),
            Err(RefError::NotWritable { .. })
        ));
    }

    // ---------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------

    #[test]
    fn status_transitions_are_validated() {
        let mut reg = registry_with_main();
        reg.create("f", Some("main"), 0, Timestamp::zero()).unwrap();
        reg.set_status("f", BranchStatus::Conflicted).unwrap();
        reg.set_status("f", BranchStatus::Active).unwrap();
        reg.set_status("f", BranchStatus::Merged).unwrap();
        reg.set_status("f", BranchStatus::Merged).unwrap();
        assert!(matches!(
            reg.set_status("f", BranchStatus::Active),
            Err(RefError::InvalidTransition { .. })
        ));
        assert_eq!(reg.with_status(BranchStatus::Merged).len(), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn modified_counter() {
        let mut reg = registry_with_main();
        reg.record_modified("main", 2).unwrap();
        reg.record_modified("main", 1).unwrap();
        assert_eq!(reg.get("main").unwrap().stats.objects_modified, 3);
    }
}
