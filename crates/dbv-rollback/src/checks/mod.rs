//! Built-in rollback checks, in pipeline order.

pub mod impact;
pub mod preconditions;

pub use impact::{
    AlreadyRolledBackCheck, DataLossCheck, DependencyImpactCheck, MergeCommitCheck,
    SubsequentChangesCheck,
};
pub use preconditions::{BranchExistsCheck, CommitOnBranchCheck, TargetCommitCheck};
