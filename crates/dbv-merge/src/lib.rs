//! Merge engine for dbv.
//!
//! Merges one branch (the *source*, "theirs") into another (the *target*,
//! "ours") using the snapshot at their merge base to tell one-sided changes
//! from true conflicts.
//!
//! # Pipeline
//!
//! 1. [`three_way_diff`] classifies every path of base, source and target.
//! 2. Conflicting paths become [`Conflict`]s with a [`ConflictSeverity`]
//!    from [`classify_severity`] and an optional [`suggest_resolution`].
//! 3. A [`MergeOperation`] applies its [`MergeStrategy`], waits for manual
//!    resolutions, and composes the merged tree once nothing is unresolved.
//!
//! [`detect_conflicts`] is the read-only two-way report used before a
//! merge is started; [`detect_renames`] adds non-blocking rename hints.

pub mod classify;
pub mod conflict;
pub mod error;
pub mod operation;
pub mod rename;

pub use classify::{three_way_diff, ObjectClassification, ObjectMerge, ThreeWayDiff};
pub use conflict::{
    classify_severity, detect_conflicts, suggest_resolution, Conflict, ConflictChange,
    ConflictDefinitions, ConflictReport, ConflictResolution, ConflictSeverity, ConflictType,
    DetectedConflict, Resolution, ResolutionChoice,
};
pub use error::{MergeError, MergeResult};
pub use operation::{MergeConfig, MergeOperation, MergeRequest, MergeStatus, MergeStrategy};
pub use rename::{detect_renames, edit_distance, RenameHint};
