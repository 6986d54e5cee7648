use std::fmt;

use dbv_types::{ContentHash, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    Merged,
    Deleted,
    /// A merge into this branch is waiting for conflict resolution.
    Conflicted,
}

impl BranchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Merged => "merged",
            Self::Deleted => "deleted",
            Self::Conflicted => "conflicted",
        }
    }

    /// Merged and deleted branches never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged | Self::Deleted)
    }

    /// Whether new commits may be appended. A conflicted branch only
    /// accepts the commit that completes its open merge.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn can_transition_to(&self, to: BranchStatus) -> bool {
        match (self, to) {
            (Self::Active, Self::Merged | Self::Deleted | Self::Conflicted) => true,
            (Self::Conflicted, Self::Active | Self::Merged | Self::Deleted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BranchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Copy-on-write statistics: how much of the branch is still shared with
/// its parent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CowStats {
    /// Live objects copied from the parent at fork time.
    pub objects_inherited: u64,
    /// Distinct objects changed on this branch since the fork.
    pub objects_modified: u64,
}

impl CowStats {
    /// Fraction of inherited objects still untouched, in `[0, 1]`.
    pub fn shared_ratio(&self) -> f64 {
        if self.objects_inherited == 0 {
            return 0.0;
        }
        let untouched = self.objects_inherited.saturating_sub(self.objects_modified);
        untouched as f64 / self.objects_inherited as f64
    }
}

/// A named pointer into the commit graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Branch this one was forked from. `None` for the root branch.
    pub parent: Option<String>,
    /// Parent's head at fork time.
    pub fork_commit: Option<ContentHash>,
    /// Current head commit. `None` until the first commit.
    pub head: Option<ContentHash>,
    pub status: BranchStatus,
    pub stats: CowStats,
    pub created_at: Timestamp,
}

impl Branch {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        use BranchStatus::*;
        assert!(Active.can_transition_to(Merged));
        assert!(Active.can_transition_to(Conflicted));
        assert!(Conflicted.can_transition_to(Active));
        assert!(!Merged.can_transition_to(Active));
        assert!(!Deleted.can_transition_to(Active));
        assert!(!Active.can_transition_to(Active));
        assert!(Merged.is_terminal() && Deleted.is_terminal());
        assert!(!Merged.is_writable());
        assert!(!Conflicted.is_writable());
        assert!(Active.is_writable());
    }

    #[test]
    fn shared_ratio() {
        let stats = CowStats {
            objects_inherited: 4,
            objects_modified: 1,
        };
        assert!((stats.shared_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CowStats::default().shared_ratio(), 0.0);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&BranchStatus::Conflicted).unwrap(),
            "\"conflicted\""
        );
    }
}
