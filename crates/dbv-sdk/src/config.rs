use std::path::Path;

use dbv_merge::{MergeConfig, MergeStrategy};
use dbv_rollback::RollbackConfig;
use dbv_types::Severity;
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// Repository settings, loadable from TOML.
///
/// ```toml
/// default_branch = "main"
/// default_author = "migrations"
/// default_severity = "MINOR"
/// allow_rollback_warnings = false
/// rename_threshold = 3
/// merge_strategy = "manual"
/// history_page_size = 20
/// ```
///
/// Missing keys take their default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Branch created with the repository.
    pub default_branch: String,
    /// Author recorded when a context does not name one.
    pub default_author: String,
    /// Severity for changes reported without one. When unset, each change
    /// kind's own default applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_severity: Option<Severity>,
    /// Execute rollbacks whose validation only produced warnings.
    pub allow_rollback_warnings: bool,
    /// Largest name edit distance reported as a likely rename in a merge.
    pub rename_threshold: usize,
    /// Strategy for merges started without one.
    pub merge_strategy: MergeStrategy,
    /// Page size for history queries that do not pass one.
    pub history_page_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".into(),
            default_author: "dbv".into(),
            default_severity: None,
            allow_rollback_warnings: false,
            rename_threshold: 3,
            merge_strategy: MergeStrategy::Manual,
            history_page_size: 20,
        }
    }
}

impl RepositoryConfig {
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| SdkError::Validation(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SdkError::Validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SdkError::Validation(format!("cannot encode config: {e}")))
    }

    pub fn validate(&self) -> SdkResult<()> {
        dbv_refs::validate_branch_name(&self.default_branch)?;
        if self.default_author.trim().is_empty() {
            return Err(SdkError::Validation("default_author must not be empty".into()));
        }
        if self.history_page_size == 0 {
            return Err(SdkError::Validation("history_page_size must be positive".into()));
        }
        Ok(())
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            rename_threshold: self.rename_threshold,
            default_strategy: self.merge_strategy,
        }
    }

    pub fn rollback_config(&self) -> RollbackConfig {
        RollbackConfig {
            allow_warnings: self.allow_rollback_warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RepositoryConfig::from_toml_str(
            "default_author = \"ci\"\nmerge_strategy = \"auto\"\ndefault_severity = \"PATCH\"\n",
        )
        .unwrap();
        assert_eq!(config.default_author, "ci");
        assert_eq!(config.merge_strategy, MergeStrategy::Auto);
        assert_eq!(config.default_severity, Some(Severity::Patch));
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.merge_config().rename_threshold, 3);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(RepositoryConfig::from_toml_str("default_branch = \"a..b\"").is_err());
        assert!(RepositoryConfig::from_toml_str("history_page_size = 0").is_err());
        assert!(RepositoryConfig::from_toml_str("merge_strategy = \"yolo\"").is_err());
    }

    #[test]
    fn load_from_file_roundtrip() {
        let config = RepositoryConfig {
            allow_rollback_warnings: true,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes())
            .unwrap();
        let loaded = RepositoryConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.rollback_config().allow_warnings);
    }
}
