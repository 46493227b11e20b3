//! Caching decorator settings
//!
//! ```toml
//! cache_seconds = 60
//! refresh_cache = false
//! ```

use crate::cache::EntryOptions;
use docrepo_core::{RepoError, RepoResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How long cached entities live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Expiration window in seconds
    #[serde(default = "default_cache_seconds")]
    pub cache_seconds: u64,
    /// Renew the window on every cache hit instead of expiring it after the write
    #[serde(default)]
    pub refresh_cache: bool,
}

fn default_cache_seconds() -> u64 {
    60
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            cache_seconds: default_cache_seconds(),
            refresh_cache: false,
        }
    }
}

impl CacheOptions {
    /// Sliding-window options with the given lifetime
    pub fn sliding(cache_seconds: u64) -> Self {
        CacheOptions {
            cache_seconds,
            refresh_cache: true,
        }
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> RepoResult<Self> {
        let options: CacheOptions = toml::from_str(content).map_err(|e| {
            RepoError::Configuration(format!("failed to parse cache options: {}", e))
        })?;
        if options.cache_seconds == 0 {
            return Err(RepoError::Configuration(
                "cache_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(options)
    }

    /// Read and parse options from a file path
    pub fn from_file(path: &Path) -> RepoResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RepoError::Configuration(format!(
                "failed to read cache options '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Expiration policy for entries written by the decorator
    pub fn entry_options(&self) -> EntryOptions {
        let window = Duration::from_secs(self.cache_seconds);
        if self.refresh_cache {
            EntryOptions::sliding(window)
        } else {
            EntryOptions::absolute(window)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CacheOptions::default();
        assert_eq!(options.cache_seconds, 60);
        assert!(!options.refresh_cache);
        assert_eq!(
            options.entry_options(),
            EntryOptions::absolute(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_refresh_selects_sliding_window() {
        let options = CacheOptions::from_toml_str("cache_seconds = 5\nrefresh_cache = true").unwrap();
        assert_eq!(
            options.entry_options(),
            EntryOptions::sliding(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_zero_seconds_rejected() {
        assert!(matches!(
            CacheOptions::from_toml_str("cache_seconds = 0"),
            Err(RepoError::Configuration(_))
        ));
    }
}
