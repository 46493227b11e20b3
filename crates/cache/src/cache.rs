//! Distributed cache contract
//!
//! The decorator reaches its cache only through [`DistributedCache`]: byte or
//! string payloads by string key, each entry with its own expiration policy.

use async_trait::async_trait;
use docrepo_core::{RepoError, RepoResult};
use std::time::Duration;

/// Expiration policy of one cache entry
///
/// Both windows may be set; the entry expires at whichever comes first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Lifetime counted from the write
    pub absolute_expiration: Option<Duration>,
    /// Idle window, renewed on every read or refresh
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Expire `window` after the write
    pub fn absolute(window: Duration) -> Self {
        EntryOptions {
            absolute_expiration: Some(window),
            sliding_expiration: None,
        }
    }

    /// Expire after `window` without access
    pub fn sliding(window: Duration) -> Self {
        EntryOptions {
            absolute_expiration: None,
            sliding_expiration: Some(window),
        }
    }
}

/// Shared key-value cache
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Payload stored under `key`, if present and unexpired
    async fn get(&self, key: &str) -> RepoResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous entry
    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> RepoResult<()>;

    /// Renew the sliding window of `key` without reading it
    async fn refresh(&self, key: &str) -> RepoResult<()>;

    /// Drop `key`; absent keys are not an error
    async fn remove(&self, key: &str) -> RepoResult<()>;

    /// Payload stored under `key`, decoded as UTF-8
    async fn get_string(&self, key: &str) -> RepoResult<Option<String>> {
        match self.get(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| RepoError::Cache(format!("entry '{}' is not UTF-8: {}", key, e))),
            None => Ok(None),
        }
    }

    /// Store a string payload under `key`
    async fn set_string(&self, key: &str, value: &str, options: EntryOptions) -> RepoResult<()> {
        self.set(key, value.as_bytes().to_vec(), options).await
    }
}
