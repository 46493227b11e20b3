//! In-memory document store
//!
//! A [`DocumentStore`] backed by process memory, used by tests and local
//! tooling. It models the store behaviors the repository depends on:
//!
//! - records grouped by container and partition, kept in insertion order
//! - batched query results with a resumable, opaque cursor
//! - a per-batch request charge
//! - record expiry driven by the `ttl` field, counted from the last write
//! - fault injection through [`InMemoryStore::fail_next`]
//!
//! Query batches never exceed the configured backend batch size, whatever the
//! caller asks for, so multi-batch page assembly can be exercised.

use crate::store::{
    ContainerRef, Document, DocumentStore, FeedIterator, FeedPage, QuerySpec, StoreResponse,
};
use async_trait::async_trait;
use docrepo_core::filter::{compare_values, lookup};
use docrepo_core::{
    apply_patch, BackendFault, BackendStatus, DocumentPatch, RepoError, RepoResult, ID_FIELD,
    TTL_FIELD,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// Default maximum number of records per backend batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

// =============================================================================
// Options
// =============================================================================

/// Tuning for the in-memory store
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStoreOptions {
    /// Hard cap on records per batch
    pub max_batch_size: usize,
    /// Charge for any request
    pub base_charge: f64,
    /// Additional charge per record read or written
    pub charge_per_item: f64,
}

impl Default for MemoryStoreOptions {
    fn default() -> Self {
        MemoryStoreOptions {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            base_charge: 1.0,
            charge_per_item: 1.0,
        }
    }
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    partition_key: String,
    body: Value,
    written_at: Instant,
}

impl StoredDocument {
    fn is_expired(&self, now: Instant) -> bool {
        match self.body.get(TTL_FIELD).and_then(Value::as_i64) {
            Some(ttl) if ttl > 0 => now >= self.written_at + Duration::from_secs(ttl as u64),
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    containers: HashMap<ContainerRef, Vec<StoredDocument>>,
}

impl StoreState {
    /// Live records of a container, dropping expired ones first
    fn live(&mut self, container: &ContainerRef) -> &mut Vec<StoredDocument> {
        let now = Instant::now();
        let records = self.containers.entry(container.clone()).or_default();
        records.retain(|d| !d.is_expired(now));
        records
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NativeCursor {
    #[serde(rename = "pos")]
    position: usize,
    #[serde(rename = "range")]
    partition: String,
}

type FaultQueue = Arc<Mutex<VecDeque<BackendFault>>>;

fn take_fault(faults: &FaultQueue) -> RepoResult<()> {
    match faults.lock().pop_front() {
        Some(fault) => Err(RepoError::Backend(fault)),
        None => Ok(()),
    }
}

fn not_found(container: &ContainerRef, id: &str) -> RepoError {
    RepoError::Backend(BackendFault::not_found(format!(
        "record '{}' does not exist in {}",
        id, container
    )))
}

fn document_id(document: &Value) -> RepoResult<String> {
    document
        .get(ID_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RepoError::backend(BackendStatus::BadRequest, "document has no string 'id'"))
}

// =============================================================================
// InMemoryStore
// =============================================================================

/// Document store held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    faults: FaultQueue,
    options: MemoryStoreOptions,
}

impl InMemoryStore {
    /// Empty store with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty store with the given options
    pub fn with_options(options: MemoryStoreOptions) -> Self {
        InMemoryStore {
            options,
            ..Self::default()
        }
    }

    /// Empty store whose batches hold at most `max_batch_size` records
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self::with_options(MemoryStoreOptions {
            max_batch_size: max_batch_size.max(1),
            ..MemoryStoreOptions::default()
        })
    }

    /// Make the next store call fail with `status`
    ///
    /// Queued faults are consumed one per call, in order, by any operation
    /// including individual batch reads.
    pub fn fail_next(&self, status: BackendStatus) {
        self.faults
            .lock()
            .push_back(BackendFault::new(status, "injected fault"));
    }

    /// Number of live records in a container, across partitions
    pub fn len(&self, container: &ContainerRef) -> usize {
        self.state.write().live(container).len()
    }

    /// Whether a container holds no live records
    pub fn is_empty(&self, container: &ContainerRef) -> bool {
        self.len(container) == 0
    }

    /// Raw record as stored, if live
    pub fn raw(&self, container: &ContainerRef, id: &str) -> Option<Document> {
        self.state
            .write()
            .live(container)
            .iter()
            .find(|d| d.id == id)
            .map(|d| d.body.clone())
    }

    fn charge(&self, items: usize) -> f64 {
        self.options.base_charge + self.options.charge_per_item * items as f64
    }

    fn evaluate(&self, container: &ContainerRef, spec: &QuerySpec) -> Vec<Document> {
        let mut state = self.state.write();
        let mut matched: Vec<Document> = state
            .live(container)
            .iter()
            .filter(|d| match &spec.partition_key {
                Some(pk) => &d.partition_key == pk,
                None => true,
            })
            .filter(|d| spec.filter.matches(&d.body))
            .map(|d| d.body.clone())
            .collect();
        drop(state);

        if let Some(order) = &spec.order_by {
            matched.sort_by(|a, b| {
                let left = lookup(a, &order.field).unwrap_or(&Value::Null);
                let right = lookup(b, &order.field).unwrap_or(&Value::Null);
                let ord = compare_values(left, right);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        let offset = spec.offset.unwrap_or(0);
        let limit = spec.limit.unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn read(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>> {
        take_fault(&self.faults)?;
        let mut state = self.state.write();
        let record = state
            .live(container)
            .iter()
            .find(|d| d.id == id && d.partition_key == partition_key)
            .map(|d| d.body.clone())
            .ok_or_else(|| not_found(container, id))?;
        Ok(StoreResponse::new(record, self.charge(1)))
    }

    async fn create(
        &self,
        container: &ContainerRef,
        document: Document,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>> {
        take_fault(&self.faults)?;
        let id = document_id(&document)?;
        let mut state = self.state.write();
        let records = state.live(container);
        if records
            .iter()
            .any(|d| d.id == id && d.partition_key == partition_key)
        {
            return Err(RepoError::backend(
                BackendStatus::Conflict,
                format!("record '{}' already exists in {}", id, container),
            ));
        }
        records.push(StoredDocument {
            id: id.clone(),
            partition_key: partition_key.to_string(),
            body: document.clone(),
            written_at: Instant::now(),
        });
        debug!(target: "docrepo::store", %container, %id, partition_key, "created record");
        Ok(StoreResponse::new(document, self.charge(1)))
    }

    async fn replace(
        &self,
        container: &ContainerRef,
        id: &str,
        document: Document,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>> {
        take_fault(&self.faults)?;
        let mut state = self.state.write();
        let record = state
            .live(container)
            .iter_mut()
            .find(|d| d.id == id && d.partition_key == partition_key)
            .ok_or_else(|| not_found(container, id))?;
        record.body = document.clone();
        record.written_at = Instant::now();
        debug!(target: "docrepo::store", %container, id, partition_key, "replaced record");
        Ok(StoreResponse::new(document, self.charge(1)))
    }

    async fn upsert(
        &self,
        container: &ContainerRef,
        document: Document,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<Document>> {
        take_fault(&self.faults)?;
        let id = document_id(&document)?;
        let mut state = self.state.write();
        let records = state.live(container);
        match records
            .iter_mut()
            .find(|d| d.id == id && d.partition_key == partition_key)
        {
            Some(record) => {
                record.body = document.clone();
                record.written_at = Instant::now();
            }
            None => records.push(StoredDocument {
                id: id.clone(),
                partition_key: partition_key.to_string(),
                body: document.clone(),
                written_at: Instant::now(),
            }),
        }
        debug!(target: "docrepo::store", %container, %id, partition_key, "upserted record");
        Ok(StoreResponse::new(document, self.charge(1)))
    }

    async fn delete(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> RepoResult<StoreResponse<()>> {
        take_fault(&self.faults)?;
        let mut state = self.state.write();
        let records = state.live(container);
        let position = records
            .iter()
            .position(|d| d.id == id && d.partition_key == partition_key)
            .ok_or_else(|| not_found(container, id))?;
        records.remove(position);
        debug!(target: "docrepo::store", %container, id, partition_key, "deleted record");
        Ok(StoreResponse::new((), self.charge(1)))
    }

    async fn patch(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
        operations: Vec<DocumentPatch>,
    ) -> RepoResult<StoreResponse<Document>> {
        take_fault(&self.faults)?;
        let mut state = self.state.write();
        let record = state
            .live(container)
            .iter_mut()
            .find(|d| d.id == id && d.partition_key == partition_key)
            .ok_or_else(|| not_found(container, id))?;
        apply_patch(&mut record.body, &operations)
            .map_err(|e| RepoError::backend(BackendStatus::BadRequest, e.to_string()))?;
        record.written_at = Instant::now();
        debug!(
            target: "docrepo::store",
            %container,
            id,
            operations = operations.len(),
            "patched record"
        );
        Ok(StoreResponse::new(record.body.clone(), self.charge(1)))
    }

    async fn count(
        &self,
        container: &ContainerRef,
        spec: &QuerySpec,
    ) -> RepoResult<StoreResponse<usize>> {
        take_fault(&self.faults)?;
        let unbounded = QuerySpec {
            order_by: None,
            offset: None,
            limit: None,
            ..spec.clone()
        };
        let total = self.evaluate(container, &unbounded).len();
        Ok(StoreResponse::new(total, self.charge(0)))
    }

    async fn query(
        &self,
        container: &ContainerRef,
        spec: QuerySpec,
        continuation: Option<String>,
    ) -> RepoResult<Box<dyn FeedIterator>> {
        take_fault(&self.faults)?;
        let range = spec.partition_key.clone().unwrap_or_else(|| "*".to_string());
        let position = match continuation {
            Some(raw) => {
                let cursor: NativeCursor = serde_json::from_str(&raw).map_err(|e| {
                    RepoError::backend(BackendStatus::BadRequest, format!("malformed cursor: {}", e))
                })?;
                if cursor.partition != range {
                    return Err(RepoError::backend(
                        BackendStatus::BadRequest,
                        "cursor belongs to a different partition range",
                    ));
                }
                cursor.position
            }
            None => 0,
        };

        let batch_size = spec
            .max_item_count
            .unwrap_or(self.options.max_batch_size)
            .min(self.options.max_batch_size)
            .max(1);
        let results = self.evaluate(container, &spec);

        Ok(Box::new(MemoryFeed {
            results,
            position,
            batch_size,
            range,
            index_metrics: spec.populate_index_metrics.then(|| spec.filter.to_string()),
            finished: false,
            faults: Arc::clone(&self.faults),
            base_charge: self.options.base_charge,
            charge_per_item: self.options.charge_per_item,
        }))
    }
}

// =============================================================================
// Feed
// =============================================================================

struct MemoryFeed {
    results: Vec<Document>,
    position: usize,
    batch_size: usize,
    range: String,
    index_metrics: Option<String>,
    finished: bool,
    faults: FaultQueue,
    base_charge: f64,
    charge_per_item: f64,
}

#[async_trait]
impl FeedIterator for MemoryFeed {
    fn has_more_results(&self) -> bool {
        !self.finished
    }

    async fn read_next(&mut self) -> RepoResult<FeedPage> {
        take_fault(&self.faults)?;
        if self.finished {
            return Ok(FeedPage::default());
        }

        let start = self.position.min(self.results.len());
        let end = (start + self.batch_size).min(self.results.len());
        let items = self.results[start..end].to_vec();
        self.position = end;

        let continuation = if end < self.results.len() {
            let cursor = NativeCursor {
                position: end,
                partition: self.range.clone(),
            };
            Some(serde_json::to_string(&cursor)?)
        } else {
            None
        };
        self.finished = continuation.is_none();

        Ok(FeedPage {
            request_charge: self.base_charge + self.charge_per_item * items.len() as f64,
            index_metrics: self
                .index_metrics
                .as_ref()
                .map(|filter| format!("filter: {}; scanned: {}", filter, items.len())),
            items,
            continuation,
        })
    }
}
