//! Cache instance registry
//!
//! Every caching decorator in a deployment must share one cache client.
//! A second client fragments cached state between repositories and opens
//! extra connections to the backing cache, so registering a distinct
//! instance after the first is a configuration error.
//!
//! Tests construct their own [`CacheRegistry`]; production wiring uses
//! [`CacheRegistry::global`]. The check spans every entity type.

use crate::cache::DistributedCache;
use docrepo_core::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

static GLOBAL_REGISTRY: Lazy<CacheRegistry> = Lazy::new(CacheRegistry::new);

/// Tracks the cache instance decorators are allowed to use
#[derive(Default)]
pub struct CacheRegistry {
    tracked: Mutex<Option<Arc<dyn DistributedCache>>>,
}

fn same_instance(a: &Arc<dyn DistributedCache>, b: &Arc<dyn DistributedCache>) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl CacheRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry
    pub fn global() -> &'static CacheRegistry {
        &GLOBAL_REGISTRY
    }

    /// Track `cache`, or confirm it is the instance already tracked
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Configuration`] when a different instance is
    /// already tracked.
    pub fn register(&self, cache: &Arc<dyn DistributedCache>) -> RepoResult<()> {
        let mut tracked = self.tracked.lock();
        match tracked.as_ref() {
            None => {
                debug!(target: "docrepo::cache", "tracking cache instance");
                *tracked = Some(Arc::clone(cache));
                Ok(())
            }
            Some(existing) if same_instance(existing, cache) => Ok(()),
            Some(_) => {
                error!(target: "docrepo::cache", "distinct cache instance registered");
                Err(RepoError::Configuration(
                    "a different cache instance is already registered; \
                     register the cache client as a single shared instance"
                        .to_string(),
                ))
            }
        }
    }

    /// Whether any instance is tracked
    pub fn is_tracking(&self) -> bool {
        self.tracked.lock().is_some()
    }
}
