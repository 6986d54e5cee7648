use dbv_types::ObjectId;

/// Errors produced by dependency graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DepsError {
    /// The objects still unplaced when ordering got stuck.
    #[error("dependency cycle among {} objects: {remaining:?}", remaining.len())]
    Cycle { remaining: Vec<ObjectId> },

    /// Adding the edge would close a cycle through `dependent`.
    #[error("edge {dependent} -> {depends_on} would create a cycle")]
    WouldCycle {
        dependent: ObjectId,
        depends_on: ObjectId,
    },

    #[error("an object cannot depend on itself: {0}")]
    SelfDependency(ObjectId),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for dependency graph results.
pub type DepsResult<T> = Result<T, DepsError>;
