use crate::error::{AvlError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Duplicate handling rule applied by [`AvlTree::insert`](crate::AvlTree::insert).
///
/// Exactly one policy is active on a tree at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// Equal values are stored side by side (default).
    ///
    /// A new duplicate descends into the left subtree of the equal node, so
    /// it sorts before the entries already stored.
    #[default]
    AllowDuplicates,
    /// Inserting an equal value fails with `AlreadyExists`.
    RejectError,
    /// Inserting an equal value hands back the stored one without error.
    ReturnExisting,
    /// Inserting an equal value overwrites the stored one in place.
    Replace,
}

impl std::str::FromStr for InsertPolicy {
    type Err = AvlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.replace('-', "_").as_str() {
            "allow_duplicates" => Ok(InsertPolicy::AllowDuplicates),
            "reject_error" => Ok(InsertPolicy::RejectError),
            "return_existing" => Ok(InsertPolicy::ReturnExisting),
            "replace" => Ok(InsertPolicy::Replace),
            other => Err(AvlError::ConfigError(format!(
                "unknown insert policy '{}'",
                other
            ))),
        }
    }
}

/// Configuration for a tree.
///
/// Only traversal tuning and the insertion policy live here; the
/// comparator is supplied in code.
///
/// # Example
///
/// ```
/// use avlkit::{InsertPolicy, TreeConfig};
///
/// let config = TreeConfig::new()
///     .with_policy(InsertPolicy::RejectError)
///     .with_parallel_threshold(4096)
///     .with_merge_ceiling(Some(1_000_000));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Duplicate handling rule (default: allow duplicates).
    pub policy: InsertPolicy,

    /// Subtree size above which a parallel visit forks (default: 1000).
    ///
    /// Subtrees at or below this estimate are visited sequentially inside
    /// the job that reached them.
    pub parallel_threshold: usize,

    /// Maximum number of nested forks in one parallel visit (default: 6).
    ///
    /// Each fork dispatches two jobs, so a visit creates at most
    /// `2^(max_fork_depth + 1) - 2` jobs. Valid range: 0 - 16.
    pub max_fork_depth: usize,

    /// Tree size at which parallel merge stops allocating per-job buffers
    /// (default: unlimited).
    ///
    /// When reached, the merge visit runs in the calling job only and the
    /// skip is counted in `VisitSummary::merges_skipped`.
    pub merge_ceiling: Option<usize>,
}

impl TreeConfig {
    /// Creates a configuration with default values.
    ///
    /// - Policy: allow duplicates
    /// - Parallel threshold: 1000 nodes
    /// - Max fork depth: 6
    /// - Merge ceiling: none
    pub fn new() -> Self {
        Self {
            policy: InsertPolicy::AllowDuplicates,
            parallel_threshold: 1000,
            max_fork_depth: 6,
            merge_ceiling: None,
        }
    }

    /// Validates the configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `parallel_threshold` is 0
    /// - `max_fork_depth` exceeds 16
    /// - `merge_ceiling` is `Some(0)`
    pub fn validate(&self) -> Result<()> {
        if self.parallel_threshold == 0 {
            return Err(AvlError::ConfigError(
                "parallel_threshold must be at least 1".to_string(),
            ));
        }

        if self.max_fork_depth > 16 {
            return Err(AvlError::ConfigError(
                "max_fork_depth cannot exceed 16".to_string(),
            ));
        }

        if self.merge_ceiling == Some(0) {
            return Err(AvlError::ConfigError(
                "merge_ceiling must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: TreeConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!("Loaded tree config from {}", path.display());
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!("Saved tree config to {}", path.display());
        Ok(())
    }

    /// Set insertion policy
    pub fn with_policy(mut self, policy: InsertPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set parallel fork threshold
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Set maximum fork depth
    pub fn with_max_fork_depth(mut self, depth: usize) -> Self {
        self.max_fork_depth = depth;
        self
    }

    /// Set merge ceiling
    pub fn with_merge_ceiling(mut self, ceiling: Option<usize>) -> Self {
        self.merge_ceiling = ceiling;
        self
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = TreeConfig::new();

        assert_eq!(config.policy, InsertPolicy::AllowDuplicates);
        assert_eq!(config.parallel_threshold, 1000);
        assert_eq!(config.max_fork_depth, 6);
        assert_eq!(config.merge_ceiling, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("replace".parse::<InsertPolicy>().unwrap(), InsertPolicy::Replace);
        assert_eq!(
            "reject-error".parse::<InsertPolicy>().unwrap(),
            InsertPolicy::RejectError
        );
        assert!("sometimes".parse::<InsertPolicy>().is_err());
    }

    #[test]
    fn test_config_validation_zero_threshold() {
        let config = TreeConfig::new().with_parallel_threshold(0);
        assert!(matches!(config.validate(), Err(AvlError::ConfigError(_))));
    }

    #[test]
    fn test_config_validation_fork_depth_too_large() {
        let config = TreeConfig::new().with_max_fork_depth(17);
        assert!(config.validate().is_err());

        let config = TreeConfig::new().with_max_fork_depth(16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_merge_ceiling() {
        let config = TreeConfig::new().with_merge_ceiling(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder_pattern() {
        let config = TreeConfig::new()
            .with_policy(InsertPolicy::Replace)
            .with_parallel_threshold(64)
            .with_max_fork_depth(3)
            .with_merge_ceiling(Some(1000));

        assert_eq!(config.policy, InsertPolicy::Replace);
        assert_eq!(config.parallel_threshold, 64);
        assert_eq!(config.max_fork_depth, 3);
        assert_eq!(config.merge_ceiling, Some(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");

        let config = TreeConfig::new()
            .with_policy(InsertPolicy::ReturnExisting)
            .with_parallel_threshold(250);
        config.save(&path).unwrap();

        let loaded = TreeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, r#"{ "policy": "reject_error" }"#).unwrap();

        let loaded = TreeConfig::load(&path).unwrap();
        assert_eq!(loaded.policy, InsertPolicy::RejectError);
        assert_eq!(loaded.parallel_threshold, 1000);
    }

    #[test]
    fn test_config_load_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, r#"{ "parallel_threshold": 0 }"#).unwrap();

        assert!(matches!(
            TreeConfig::load(&path),
            Err(AvlError::ConfigError(_))
        ));
    }
}
