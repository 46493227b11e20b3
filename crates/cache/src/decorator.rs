//! Read-through, write-through caching over a [`Repository`]
//!
//! [`CachedRepository`] forwards predicate queries and counts untouched and
//! intercepts the operations addressed by id. Entities are cached as JSON
//! under `"{TypeName}:{id}"` so types sharing a collection never collide.
//!
//! Every cache call is contained: a failure is logged at warn and the
//! repository operation completes exactly as it would without a cache.

use crate::cache::DistributedCache;
use crate::options::CacheOptions;
use crate::registry::CacheRegistry;
use async_trait::async_trait;
use docrepo_core::{
    Filter, PatchOperationCollection, RepoResult, SearchModel, SearchResult, StorableEntity,
};
use docrepo_engine::{Repository, WriteMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Caller-keyed access to the decorator's cache
///
/// Independent of the typed operations. None of these calls fail: cache
/// faults are logged and read as misses.
#[async_trait]
pub trait CacheAccess: Send + Sync {
    /// Store any serializable value under `key`
    async fn cache<V: Serialize + Sync>(&self, value: &V, key: &str);

    /// Read a value stored under `key` as `V`
    async fn retrieve<V: DeserializeOwned + Send>(&self, key: &str) -> Option<V>;

    /// Read a value stored under `key` without a target type
    async fn retrieve_value(&self, key: &str) -> Option<Value>;

    /// Drop `key`; absent keys are fine
    async fn evict(&self, key: &str);
}

/// Repository decorator adding a distributed cache
pub struct CachedRepository<T, R> {
    inner: R,
    cache: Arc<dyn DistributedCache>,
    options: CacheOptions,
    _entity: PhantomData<fn() -> T>,
}

impl<T, R> CachedRepository<T, R>
where
    T: StorableEntity,
    R: Repository<T>,
{
    /// Wrap `inner`, checking `cache` against the process-wide registry
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a different cache instance was
    /// registered before.
    pub fn new(inner: R, cache: Arc<dyn DistributedCache>, options: CacheOptions) -> RepoResult<Self> {
        Self::with_registry(inner, cache, options, CacheRegistry::global())
    }

    /// Wrap `inner`, checking `cache` against `registry`
    pub fn with_registry(
        inner: R,
        cache: Arc<dyn DistributedCache>,
        options: CacheOptions,
        registry: &CacheRegistry,
    ) -> RepoResult<Self> {
        registry.register(&cache)?;
        Ok(CachedRepository {
            inner,
            cache,
            options,
            _entity: PhantomData,
        })
    }

    /// Wrapped repository
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Cache key of the entity with `id`
    pub fn key(id: Uuid) -> String {
        format!("{}:{}", T::type_name(), id)
    }

    async fn write_entity(&self, entity: &T) {
        let Some(id) = entity.id() else {
            return;
        };
        let key = Self::key(id);
        let payload = match serde_json::to_string(entity) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "could not serialize entity for cache");
                return;
            }
        };
        match self
            .cache
            .set_string(&key, &payload, self.options.entry_options())
            .await
        {
            Ok(()) => debug!(target: "docrepo::cache", %key, "cached"),
            Err(e) => warn!(target: "docrepo::cache", %key, error = %e, "cache write failed"),
        }
    }

    async fn read_entity(&self, key: &str) -> Option<T> {
        let payload = match self.cache.get_string(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(target: "docrepo::cache", %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    async fn remove_key(&self, key: &str) {
        if let Err(e) = self.cache.remove(key).await {
            warn!(target: "docrepo::cache", %key, error = %e, "cache eviction failed");
        }
    }
}

#[async_trait]
impl<T, R> Repository<T> for CachedRepository<T, R>
where
    T: StorableEntity,
    R: Repository<T>,
{
    async fn get(&self, id: Uuid, partition_key: Option<&str>) -> RepoResult<Option<T>> {
        let key = Self::key(id);
        if let Some(entity) = self.read_entity(&key).await {
            if self.options.refresh_cache {
                if let Err(e) = self.cache.refresh(&key).await {
                    warn!(target: "docrepo::cache", %key, error = %e, "cache refresh failed");
                }
            }
            debug!(target: "docrepo::cache", %key, "cache hit");
            return Ok(Some(entity));
        }

        let found = self.inner.get(id, partition_key).await?;
        if let Some(entity) = &found {
            self.write_entity(entity).await;
        }
        Ok(found)
    }

    async fn query(&self, filter: Filter, search: SearchModel) -> RepoResult<SearchResult<T>> {
        self.inner.query(filter, search).await
    }

    async fn query_text(&self, filter: &str, search: SearchModel) -> RepoResult<SearchResult<T>> {
        self.inner.query_text(filter, search).await
    }

    async fn get_all(&self, filter: Filter, search: SearchModel) -> RepoResult<SearchResult<T>> {
        self.inner.get_all(filter, search).await
    }

    async fn find_one(
        &self,
        filter: Filter,
        partition_key: Option<&str>,
        require_single: bool,
    ) -> RepoResult<Option<T>> {
        let found = self
            .inner
            .find_one(filter, partition_key, require_single)
            .await?;
        if let Some(entity) = &found {
            self.write_entity(entity).await;
        }
        Ok(found)
    }

    async fn save(&self, entity: T, mode: WriteMode) -> RepoResult<(Uuid, T)> {
        let (id, saved) = self.inner.save(entity, mode).await?;
        // Cache the entity as persisted, stamps included
        self.write_entity(&saved).await;
        Ok((id, saved))
    }

    async fn delete(&self, id: Uuid, partition_key: &str, force: bool) -> RepoResult<()> {
        self.remove_key(&Self::key(id)).await;
        self.inner.delete(id, partition_key, force).await
    }

    async fn patch<P>(&self, id: Uuid, partition_key: &str, operations: &P) -> RepoResult<()>
    where
        P: PatchOperationCollection<T> + Sync,
    {
        self.inner.patch(id, partition_key, operations).await?;
        // The cached copy predates the patch
        self.remove_key(&Self::key(id)).await;
        Ok(())
    }

    async fn count(&self, filter: Filter, partition_key: Option<&str>) -> RepoResult<usize> {
        self.inner.count(filter, partition_key).await
    }
}

#[async_trait]
impl<T, R> CacheAccess for CachedRepository<T, R>
where
    T: StorableEntity,
    R: Repository<T>,
{
    async fn cache<V: Serialize + Sync>(&self, value: &V, key: &str) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "could not serialize value for cache");
                return;
            }
        };
        if let Err(e) = self
            .cache
            .set_string(key, &payload, self.options.entry_options())
            .await
        {
            warn!(target: "docrepo::cache", %key, error = %e, "cache write failed");
        }
    }

    async fn retrieve<V: DeserializeOwned + Send>(&self, key: &str) -> Option<V> {
        let value = self.retrieve_value(key).await?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "cached value has a different shape");
                None
            }
        }
    }

    async fn retrieve_value(&self, key: &str) -> Option<Value> {
        let payload = match self.cache.get_string(key).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(target: "docrepo::cache", %key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    async fn evict(&self, key: &str) {
        self.remove_key(key).await;
    }
}
