//! Repository engine for docrepo
//!
//! This crate turns the core model into working repositories:
//! - Store contract: the document store client surface the engine consumes
//! - In-memory store: a batching, expiring store for tests and local tooling
//! - Query executor: partition-aware page assembly with continuation tokens
//! - Generic repository: typed CRUD, query, patch and soft delete
//! - Configuration, cost classification and diagnostics
//!
//! The engine is the only component that talks to the store.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cost;
pub mod diagnostics;
pub mod executor;
pub mod memory;
pub mod repository;
pub mod store;
pub mod token;

pub use config::RepositoryConfig;
pub use cost::{CostObserver, CostTier};
pub use diagnostics::Diagnostics;
pub use executor::QueryExecutor;
pub use memory::{InMemoryStore, MemoryStoreOptions};
pub use repository::{GenericRepository, Repository, RepositoryOptions, WriteMode};
pub use store::{
    ContainerRef, Document, DocumentStore, FeedIterator, FeedPage, OrderBy, QuerySpec,
    StoreResponse,
};
