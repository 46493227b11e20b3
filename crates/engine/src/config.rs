//! Repository configuration via TOML
//!
//! Loaded once at startup and shared by every repository instance.
//!
//! ```toml
//! default_database_name = "orders"
//! delete_ttl = 10
//! include_total_results_by_default = true
//! populate_index_metrics = false
//! large_result_warning = 500
//! ```

use docrepo_core::{RepoError, RepoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Repository-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Database used when a repository does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_database_name: Option<String>,
    /// Seconds a soft-deleted record lives before the store expires it
    #[serde(default = "default_delete_ttl")]
    pub delete_ttl: i32,
    /// Whether token-less queries compute totals unless the call says otherwise
    #[serde(default = "default_true")]
    pub include_total_results_by_default: bool,
    /// Request and log index utilization for every query batch
    #[serde(default)]
    pub populate_index_metrics: bool,
    /// Total above which a query logs a large-result warning
    #[serde(default = "default_large_result_warning")]
    pub large_result_warning: usize,
}

fn default_delete_ttl() -> i32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_large_result_warning() -> usize {
    500
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        RepositoryConfig {
            default_database_name: None,
            delete_ttl: default_delete_ttl(),
            include_total_results_by_default: true,
            populate_index_metrics: false,
            large_result_warning: default_large_result_warning(),
        }
    }
}

impl RepositoryConfig {
    /// Config with a default database and every other setting at its default
    pub fn for_database(name: impl Into<String>) -> Self {
        RepositoryConfig {
            default_database_name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parse from TOML text
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the text does not parse or the
    /// values are out of range.
    pub fn from_toml_str(content: &str) -> RepoResult<Self> {
        let config: RepositoryConfig = toml::from_str(content)
            .map_err(|e| RepoError::Configuration(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> RepoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepoError::Configuration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges
    pub fn validate(&self) -> RepoResult<()> {
        if self.delete_ttl <= 0 {
            return Err(RepoError::Configuration(format!(
                "delete_ttl must be a positive number of seconds, got {}",
                self.delete_ttl
            )));
        }
        if let Some(name) = &self.default_database_name {
            if name.trim().is_empty() {
                return Err(RepoError::Configuration(
                    "default_database_name must not be blank".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the database a repository should use
    ///
    /// # Errors
    ///
    /// Returns a configuration error when neither an explicit name nor a
    /// default is available.
    pub fn resolve_database(&self, explicit: Option<&str>) -> RepoResult<String> {
        explicit
            .filter(|name| !name.is_empty())
            .or(self.default_database_name.as_deref())
            .map(str::to_string)
            .ok_or_else(|| {
                RepoError::Configuration(
                    "no database name given and no default_database_name configured".to_string(),
                )
            })
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# Repository configuration
#
# Database used when a repository does not name one.
# default_database_name = "app"

# Seconds a soft-deleted record lives before the store expires it.
delete_ttl = 10

# Compute total counts on the first page of a query unless the call overrides it.
include_total_results_by_default = true

# Log index utilization for every query batch.
populate_index_metrics = false

# Total count above which a query logs a warning.
large_result_warning = 500
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.delete_ttl, 10);
        assert!(config.include_total_results_by_default);
        assert!(!config.populate_index_metrics);
        assert_eq!(config.large_result_warning, 500);
    }

    #[test]
    fn test_default_toml_parses_to_defaults() {
        let config = RepositoryConfig::from_toml_str(RepositoryConfig::default_toml()).unwrap();
        assert_eq!(config, RepositoryConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config =
            RepositoryConfig::from_toml_str("default_database_name = \"orders\"\ndelete_ttl = 30")
                .unwrap();
        assert_eq!(config.default_database_name.as_deref(), Some("orders"));
        assert_eq!(config.delete_ttl, 30);
        assert!(config.include_total_results_by_default);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            RepositoryConfig::from_toml_str("delete_ttl = 0"),
            Err(RepoError::Configuration(_))
        ));
        assert!(matches!(
            RepositoryConfig::from_toml_str("delete_ttl = \"soon\""),
            Err(RepoError::Configuration(_))
        ));
    }

    #[test]
    fn test_resolve_database() {
        let config = RepositoryConfig::for_database("main");
        assert_eq!(config.resolve_database(None).unwrap(), "main");
        assert_eq!(config.resolve_database(Some("other")).unwrap(), "other");
        assert_eq!(config.resolve_database(Some("")).unwrap(), "main");
        assert!(matches!(
            RepositoryConfig::default().resolve_database(None),
            Err(RepoError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = RepositoryConfig::from_file(Path::new("/nonexistent/docrepo.toml")).unwrap_err();
        assert!(matches!(err, RepoError::Configuration(_)));
    }
}
