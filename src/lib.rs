//! docrepo - typed repositories over partitioned document stores
//!
//! docrepo gives application code one CRUD and query surface for entities
//! kept in a partitioned, schema-flexible document store. Several entity
//! types can share a physical collection; every record carries its type
//! labels and partition key inline.
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::prelude::*;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let config = Arc::new(RepositoryConfig::for_database("app"));
//! let orders = GenericRepository::<Order>::new(store, config, RepositoryOptions::default())?;
//!
//! let id = orders.create(order).await?;
//! let page = orders
//!     .query(Filter::gt("Total", 100), SearchModel::with_page_size(50).partition("acme"))
//!     .await?;
//!
//! let mut patch = DocumentPatchSet::<Order>::new();
//! patch.replace(&Selector::root().field(Order::STATUS), "shipped".to_string())?;
//! orders.patch(id, "acme", &patch).await?;
//! ```
//!
//! # Architecture
//!
//! - `core`: entity model, selectors and the path compiler, patch sets, filters
//! - `engine`: store contract, query executor, generic repository
//! - `cache`: distributed cache contract and the caching decorator

pub use docrepo_cache as cache;
pub use docrepo_core as core;
pub use docrepo_engine as engine;

pub use docrepo_cache::{CacheAccess, CacheOptions, CacheRegistry, CachedRepository, DistributedCache};
pub use docrepo_core::{
    AuditMetadata, DocumentPatchSet, EntityHeader, Field, Filter, IndexPatchSet, RepoError,
    RepoResult, SearchModel, SearchResult, Selector, StorableEntity,
};
pub use docrepo_engine::{
    DocumentStore, GenericRepository, InMemoryStore, Repository, RepositoryConfig,
    RepositoryOptions, WriteMode,
};

/// Common imports for repository users
pub mod prelude {
    pub use docrepo_cache::{
        CacheAccess, CacheOptions, CacheRegistry, CachedRepository, DistributedCache,
        InMemoryCache,
    };
    pub use docrepo_core::{
        AuditMetadata, DocumentPatchSet, EntityHeader, Field, Filter, IndexPatchSet,
        PatchOperationCollection, RepoError, RepoResult, SearchModel, SearchResult, Selector,
        StorableEntity,
    };
    pub use docrepo_engine::{
        DocumentStore, GenericRepository, InMemoryStore, Repository, RepositoryConfig,
        RepositoryOptions, WriteMode,
    };
    pub use std::sync::Arc;
}
