//! Integration tests for the caching decorator
//!
//! Expiration behavior as seen through the decorator, with the clock paused.

use docrepo_cache::{CacheOptions, CacheRegistry, CachedRepository, DistributedCache, InMemoryCache};
use docrepo_core::{EntityHeader, StorableEntity};
use docrepo_engine::{GenericRepository, InMemoryStore, Repository, RepositoryConfig, RepositoryOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    #[serde(flatten)]
    header: EntityHeader,
    #[serde(rename = "Region")]
    region: String,
}

impl StorableEntity for Profile {
    const TYPE_LABELS: &'static [&'static str] = &["Profile"];

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn partition_key(&self) -> String {
        self.region.clone()
    }
}

fn profile() -> Profile {
    Profile {
        header: EntityHeader::default(),
        region: "eu".to_string(),
    }
}

fn decorated(
    options: CacheOptions,
) -> (
    CachedRepository<Profile, GenericRepository<Profile>>,
    InMemoryCache,
) {
    let store = InMemoryStore::new();
    let inner = GenericRepository::new(
        Arc::new(store),
        Arc::new(RepositoryConfig::for_database("db")),
        RepositoryOptions::default(),
    )
    .unwrap();
    let cache = InMemoryCache::new();
    let registry = CacheRegistry::new();
    let repo = CachedRepository::with_registry(
        inner,
        Arc::new(cache.clone()) as Arc<dyn DistributedCache>,
        options,
        &registry,
    )
    .unwrap();
    (repo, cache)
}

fn key(id: uuid::Uuid) -> String {
    format!("Profile:{}", id)
}

#[tokio::test(start_paused = true)]
async fn test_absolute_entries_expire_despite_hits() {
    let (repo, cache) = decorated(CacheOptions {
        cache_seconds: 60,
        refresh_cache: false,
    });
    let id = repo.create(profile()).await.unwrap();

    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(repo.get(id, Some("eu")).await.unwrap().is_some());
    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(!cache.contains(&key(id)));
}

#[tokio::test(start_paused = true)]
async fn test_sliding_entries_renewed_by_hits() {
    let (repo, cache) = decorated(CacheOptions::sliding(60));
    let id = repo.create(profile()).await.unwrap();

    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(repo.get(id, Some("eu")).await.unwrap().is_some());
        assert!(cache.contains(&key(id)));
    }

    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(!cache.contains(&key(id)));
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_reads_through_again() {
    let (repo, cache) = decorated(CacheOptions {
        cache_seconds: 5,
        refresh_cache: false,
    });
    let id = repo.create(profile()).await.unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(!cache.contains(&key(id)));
    assert!(repo.get(id, Some("eu")).await.unwrap().is_some());
    assert!(cache.contains(&key(id)));
}
