//! Session scripts: a JSON list of repository operations.
//!
//! ```json
//! {
//!   "config": { "default_author": "ci" },
//!   "steps": [
//!     { "op": "create", "path": "table/app.users", "definition": "CREATE TABLE users (id int)" },
//!     { "op": "branch", "name": "feature" },
//!     { "op": "alter", "branch": "feature", "path": "table/app.users",
//!       "definition": "CREATE TABLE users (id bigint)", "severity": "MINOR" },
//!     { "op": "merge", "source": "feature" },
//!     { "op": "rollback", "back": 0, "mode": "DRY_RUN" }
//!   ]
//! }
//! ```
//!
//! Objects are named by tree path (`{type}/{schema}.{name}`). A step that
//! omits its branch runs on the configured default branch.

use std::path::Path;

use anyhow::Context as _;
use dbv_sdk::{
    DependencyKind, MergeStrategy, ObjectKey, RepositoryConfig, ResolutionChoice, RollbackMode,
    Severity,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Used when no `--config` file is given.
    #[serde(default)]
    pub config: Option<RepositoryConfig>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let script: Self = serde_json::from_str(text).context("invalid session script")?;
        for (i, step) in script.steps.iter().enumerate() {
            step.validate()
                .with_context(|| format!("step {} ({})", i + 1, step.name()))?;
        }
        Ok(script)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::parse(&text)
    }
}

fn default_count() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

fn default_mode() -> RollbackMode {
    RollbackMode::DryRun
}

fn default_kind() -> DependencyKind {
    DependencyKind::Structural
}

/// One operation of a session.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Create {
        branch: Option<String>,
        path: String,
        definition: String,
        severity: Option<Severity>,
        /// Enclosing object, for members such as columns.
        parent: Option<String>,
        message: Option<String>,
    },
    Alter {
        branch: Option<String>,
        path: String,
        definition: String,
        severity: Option<Severity>,
        message: Option<String>,
    },
    Drop {
        branch: Option<String>,
        path: String,
        severity: Option<Severity>,
    },
    Rename {
        branch: Option<String>,
        path: String,
        new_name: String,
        severity: Option<Severity>,
    },
    Branch {
        name: String,
        from: Option<String>,
    },
    DeleteBranch {
        name: String,
    },
    Depend {
        branch: Option<String>,
        dependent: String,
        depends_on: String,
        #[serde(default = "default_kind")]
        kind: DependencyKind,
    },
    Order {
        branch: Option<String>,
        paths: Vec<String>,
    },
    Diff {
        left: String,
        right: String,
    },
    Conflicts {
        source: String,
        target: Option<String>,
    },
    Merge {
        source: String,
        target: Option<String>,
        strategy: Option<MergeStrategy>,
    },
    /// Resolve a conflict of the open merge into `target`.
    Resolve {
        target: Option<String>,
        path: String,
        /// `ours`, `theirs` or `custom`.
        choice: String,
        definition: Option<String>,
    },
    Abort {
        target: Option<String>,
    },
    /// Revert `count` first-parent commits, the newest being `back`
    /// commits behind the branch head.
    Rollback {
        branch: Option<String>,
        #[serde(default)]
        back: usize,
        #[serde(default = "default_count")]
        count: usize,
        #[serde(default = "default_mode")]
        mode: RollbackMode,
    },
    History {
        branch: Option<String>,
        path: String,
        #[serde(default)]
        page: usize,
        page_size: Option<usize>,
    },
    Log {
        branch: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    },
    Snapshot,
    Verify,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Alter { .. } => "alter",
            Self::Drop { .. } => "drop",
            Self::Rename { .. } => "rename",
            Self::Branch { .. } => "branch",
            Self::DeleteBranch { .. } => "delete_branch",
            Self::Depend { .. } => "depend",
            Self::Order { .. } => "order",
            Self::Diff { .. } => "diff",
            Self::Conflicts { .. } => "conflicts",
            Self::Merge { .. } => "merge",
            Self::Resolve { .. } => "resolve",
            Self::Abort { .. } => "abort",
            Self::Rollback { .. } => "rollback",
            Self::History { .. } => "history",
            Self::Log { .. } => "log",
            Self::Snapshot => "snapshot",
            Self::Verify => "verify",
        }
    }

    /// Static checks that need no repository: paths parse, counts are
    /// positive, resolutions are complete.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            Self::Create { path, parent, .. } => {
                parse_key(path)?;
                if let Some(parent) = parent {
                    parse_key(parent)?;
                }
            }
            Self::Alter { path, .. }
            | Self::Drop { path, .. }
            | Self::Rename { path, .. }
            | Self::History { path, .. } => {
                parse_key(path)?;
            }
            Self::Depend {
                dependent,
                depends_on,
                ..
            } => {
                parse_key(dependent)?;
                parse_key(depends_on)?;
            }
            Self::Order { paths, .. } => {
                for path in paths {
                    parse_key(path)?;
                }
            }
            Self::Resolve {
                choice, definition, ..
            } => {
                resolution(choice, definition.as_deref())?;
            }
            Self::Rollback { count, .. } => anyhow::ensure!(*count > 0, "count must be positive"),
            _ => {}
        }
        Ok(())
    }
}

pub fn parse_key(path: &str) -> anyhow::Result<ObjectKey> {
    ObjectKey::from_path(path).with_context(|| format!("invalid object path {path:?}"))
}

pub fn resolution(choice: &str, definition: Option<&str>) -> anyhow::Result<ResolutionChoice> {
    match (choice, definition) {
        ("ours", _) => Ok(ResolutionChoice::Ours),
        ("theirs", _) => Ok(ResolutionChoice::Theirs),
        ("custom", Some(def)) => Ok(ResolutionChoice::Custom(def.to_string())),
        ("custom", None) => anyhow::bail!("custom resolution needs a definition"),
        (other, _) => anyhow::bail!("unknown resolution {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_session() {
        let script = Script::parse(
            r#"{
                "config": { "default_author": "ci" },
                "steps": [
                    { "op": "create", "path": "table/app.users", "definition": "CREATE TABLE users (id int)" },
                    { "op": "depend", "dependent": "view/app.v", "depends_on": "table/app.users" },
                    { "op": "rollback", "count": 2, "mode": "EXECUTED" },
                    { "op": "snapshot" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(script.config.unwrap().default_author, "ci");
        assert_eq!(script.steps.len(), 4);
        match &script.steps[2] {
            Step::Rollback {
                back, count, mode, ..
            } => {
                assert_eq!((*back, *count), (0, 2));
                assert_eq!(*mode, RollbackMode::Executed);
            }
            other => panic!("unexpected step {other:?}"),
        }
        match &script.steps[1] {
            Step::Depend { kind, .. } => assert_eq!(*kind, DependencyKind::Structural),
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_steps() {
        assert!(Script::parse(r#"{ "steps": [ { "op": "explode" } ] }"#).is_err());
        assert!(Script::parse(
            r#"{ "steps": [ { "op": "drop", "path": "users" } ] }"#
        )
        .is_err());
        assert!(Script::parse(
            r#"{ "steps": [ { "op": "resolve", "path": "table/a.b", "choice": "custom" } ] }"#
        )
        .is_err());
        assert!(Script::parse(r#"{ "steps": [ { "op": "rollback", "count": 0 } ] }"#).is_err());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{ "steps": [ { "op": "verify" } ] }"#).unwrap();
        let script = Script::load(&path).unwrap();
        assert!(script.config.is_none());
        assert_eq!(script.steps[0].name(), "verify");
    }
}
