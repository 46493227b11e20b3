//! Distributed caching for docrepo repositories
//!
//! This crate provides:
//! - DistributedCache: the cache client contract, with expiration policies
//! - InMemoryCache: a process-local implementation
//! - CacheRegistry: the shared-instance guard
//! - CachedRepository: a read-through, write-through repository decorator

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod decorator;
pub mod memory;
pub mod options;
pub mod registry;

pub use cache::{DistributedCache, EntryOptions};
pub use decorator::{CacheAccess, CachedRepository};
pub use memory::InMemoryCache;
pub use options::CacheOptions;
pub use registry::CacheRegistry;
