//! Document store contract
//!
//! The repository talks to a partitioned document store only through
//! [`DocumentStore`]. Implementations own connection handling, retries and
//! timeouts; this layer adds none of its own.
//!
//! Every response carries the request charge the store reported so callers
//! can classify cost per call. A missing record is reported as
//! `RepoError::Backend` with `BackendStatus::NotFound`.

use async_trait::async_trait;
use docrepo_core::{DocumentPatch, Filter, RepoResult};
use serde_json::Value;
use std::fmt;

/// A persisted record as stored
pub type Document = Value;

/// Database and collection a repository is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
}

impl ContainerRef {
    /// Create a container reference
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        ContainerRef {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database, self.collection)
    }
}

/// A store response with its request charge
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<T> {
    /// Returned resource
    pub resource: T,
    /// Cost units the store charged
    pub request_charge: f64,
}

impl<T> StoreResponse<T> {
    /// Wrap a resource
    pub fn new(resource: T, request_charge: f64) -> Self {
        StoreResponse {
            resource,
            request_charge,
        }
    }
}

/// Sort instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Dotted field path
    pub field: String,
    /// Ascending when true
    pub ascending: bool,
}

/// Query shape handed to the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Record predicate
    pub filter: Filter,
    /// Partition scope; `None` fans out across partitions
    pub partition_key: Option<String>,
    /// Sort order; `None` uses store-native order
    pub order_by: Option<OrderBy>,
    /// Records to skip
    pub offset: Option<usize>,
    /// Maximum records the whole query yields
    pub limit: Option<usize>,
    /// Maximum records per batch
    pub max_item_count: Option<usize>,
    /// Ask the store for index utilization details
    pub populate_index_metrics: bool,
}

impl QuerySpec {
    /// Query matching `filter` everywhere
    pub fn new(filter: Filter) -> Self {
        QuerySpec {
            filter,
            ..Self::default()
        }
    }

    /// Scope to a partition
    pub fn in_partition(mut self, partition_key: Option<&str>) -> Self {
        self.partition_key = partition_key.map(str::to_string);
        self
    }

    /// Limit batch size
    pub fn max_items(mut self, max_item_count: usize) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }
}

/// One batch returned by a [`FeedIterator`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    /// Records in this batch
    pub items: Vec<Document>,
    /// Store-native cursor for the next batch, `None` when exhausted
    pub continuation: Option<String>,
    /// Cost units charged for this batch
    pub request_charge: f64,
    /// Index utilization details when requested
    pub index_metrics: Option<String>,
}

/// Resumable batch iterator over query results
#[async_trait]
pub trait FeedIterator: Send {
    /// Whether another batch may be read
    fn has_more_results(&self) -> bool;

    /// Read the next batch
    async fn read_next(&mut self) -> RepoResult<FeedPage>;
}

/// Partitioned document store client
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Point read by id within a partition
    async fn read(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>>;

    /// Insert a new record; fails with `Conflict` if the id exists
    async fn create(
        &self,
        container: &ContainerRef,
        document: Document,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>>;

    /// Overwrite an existing record; fails with `NotFound` if absent
    async fn replace(
        &self,
        container: &ContainerRef,
        id: &str,
        document: Document,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>>;

    /// Insert or overwrite
    async fn upsert(
        &self,
        container: &ContainerRef,
        document: Document,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>>;

    /// Physically delete a record
    async fn delete(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<()>>;

    /// Apply patch operations atomically
    async fn patch(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
        operations: Vec<DocumentPatch>,
    ) -> RepoResult<StoreResponse<Document>>;

    /// Count records matching the filter and partition of `spec`
    async fn count(
        &self,
        container: &ContainerRef,
        spec: &QuerySpec,
    ) -> RepoResult<StoreResponse<usize>>;

    /// Start (or resume from `continuation`) a query
    async fn query(
        &self,
        container: &ContainerRef,
        spec: QuerySpec,
        continuation: Option<String>,
    ) -> RepoResult<Box<dyn FeedIterator>>;
}
