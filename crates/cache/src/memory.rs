//! Process-local [`DistributedCache`]
//!
//! Entries are swept lazily on access. Time comes from `tokio::time`, so
//! tests running with a paused clock control expiry exactly.

use crate::cache::{DistributedCache, EntryOptions};
use async_trait::async_trait;
use docrepo_core::RepoResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    deadline: Option<Instant>,
    sliding: Option<Duration>,
    touched: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        let past_deadline = self.deadline.map_or(false, |at| now >= at);
        let idle = self
            .sliding
            .map_or(false, |window| now >= self.touched + window);
        past_deadline || idle
    }
}

/// Cache held in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, e| !e.is_expired(now));
        entries.len()
    }

    /// Whether no unexpired entry remains
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` holds an unexpired entry, without renewing it
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .map_or(false, |e| !e.is_expired(now))
    }

    fn touch(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key)?.is_expired(now) {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.touched = now;
        Some(entry.value.clone())
    }
}

#[async_trait]
impl DistributedCache for InMemoryCache {
    async fn get(&self, key: &str) -> RepoResult<Option<Vec<u8>>> {
        Ok(self.touch(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, options: EntryOptions) -> RepoResult<()> {
        let now = Instant::now();
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value,
                deadline: options.absolute_expiration.map(|window| now + window),
                sliding: options.sliding_expiration,
                touched: now,
            },
        );
        Ok(())
    }

    async fn refresh(&self, key: &str) -> RepoResult<()> {
        self.touch(key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> RepoResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
