//! Typed repository over a document store
//!
//! [`Repository`] is the contract application code programs against.
//! [`GenericRepository`] implements it for any [`StorableEntity`] on top of a
//! [`DocumentStore`]: point operations go straight to the store, everything
//! predicate-based goes through the [`QueryExecutor`].
//!
//! Several entity types may share one collection. Every query is restricted
//! to records carrying the bound type's label, and point reads discard
//! records that do not carry it.

use crate::config::RepositoryConfig;
use crate::cost::{self, CostObserver};
use crate::executor::QueryExecutor;
use crate::store::{ContainerRef, Document, DocumentStore};
use async_trait::async_trait;
use chrono::Utc;
use docrepo_core::{
    from_record, has_type_label, to_record, AuditMetadata, DocumentPatch, Filter,
    PatchOperationCollection, RepoError, RepoResult, SearchModel, SearchResult, StorableEntity,
    ACTIVE_FIELD, ID_FIELD, TTL_FIELD,
};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

// =============================================================================
// Contract
// =============================================================================

/// How [`Repository::save`] writes a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Insert; an existing id is a conflict
    Create,
    /// Overwrite; the record must exist and the entity must carry an id
    Update,
    /// Insert or overwrite
    Upsert,
}

impl WriteMode {
    fn operation(self) -> &'static str {
        match self {
            WriteMode::Create => "create",
            WriteMode::Update => "update",
            WriteMode::Upsert => "upsert",
        }
    }
}

/// CRUD and query operations for one entity type
#[async_trait]
pub trait Repository<T: StorableEntity>: Send + Sync {
    /// Point read by id
    ///
    /// Without a partition key the read becomes a cross-partition lookup by
    /// id. A missing record is `Ok(None)`.
    async fn get(&self, id: Uuid, partition_key: Option<&str>) -> RepoResult<Option<T>>;

    /// One page of records matching `filter`
    async fn query(&self, filter: Filter, search: SearchModel) -> RepoResult<SearchResult<T>>;

    /// One page of records matching a textual filter
    ///
    /// See [`Filter`]'s `FromStr` implementation for the grammar.
    async fn query_text(&self, filter: &str, search: SearchModel) -> RepoResult<SearchResult<T>>;

    /// Every record matching `filter`, following continuation tokens to the end
    async fn get_all(&self, filter: Filter, search: SearchModel) -> RepoResult<SearchResult<T>>;

    /// First record matching `filter`
    ///
    /// With `require_single`, more than one match is a
    /// [`RepoError::NotUnique`].
    async fn find_one(
        &self,
        filter: Filter,
        partition_key: Option<&str>,
        require_single: bool,
    ) -> RepoResult<Option<T>>;

    /// Write `entity` and return its id together with the entity as persisted
    ///
    /// The returned entity carries the assigned id and any audit stamps.
    async fn save(&self, entity: T, mode: WriteMode) -> RepoResult<(Uuid, T)>;

    /// Insert a new record, assigning an id if absent
    async fn create(&self, entity: T) -> RepoResult<Uuid> {
        Ok(self.save(entity, WriteMode::Create).await?.0)
    }

    /// Overwrite an existing record
    async fn update(&self, entity: T) -> RepoResult<Uuid> {
        Ok(self.save(entity, WriteMode::Update).await?.0)
    }

    /// Insert or overwrite, assigning an id if absent
    async fn upsert(&self, entity: T) -> RepoResult<Uuid> {
        Ok(self.save(entity, WriteMode::Upsert).await?.0)
    }

    /// Delete a record
    ///
    /// A soft delete marks the record inactive and lets the store expire it;
    /// `force` removes it immediately.
    async fn delete(&self, id: Uuid, partition_key: &str, force: bool) -> RepoResult<()>;

    /// Apply a patch set atomically
    async fn patch<P>(&self, id: Uuid, partition_key: &str, operations: &P) -> RepoResult<()>
    where
        P: PatchOperationCollection<T> + Sync;

    /// Number of records matching `filter`
    async fn count(&self, filter: Filter, partition_key: Option<&str>) -> RepoResult<usize>;
}

// =============================================================================
// GenericRepository
// =============================================================================

/// Where a repository stores its records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Collection name; defaults to the entity's type name
    pub collection_name: Option<String>,
    /// Database name; defaults to the configured default database
    pub database_name: Option<String>,
}

impl RepositoryOptions {
    /// Store in the named collection
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection_name = Some(name.into());
        self
    }

    /// Store in the named database
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }
}

/// Store-backed [`Repository`]
pub struct GenericRepository<T> {
    store: Arc<dyn DocumentStore>,
    executor: QueryExecutor,
    config: Arc<RepositoryConfig>,
    observer: Option<Arc<dyn CostObserver>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: StorableEntity> GenericRepository<T> {
    /// Bind a repository to a store
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no database name can be resolved.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: Arc<RepositoryConfig>,
        options: RepositoryOptions,
    ) -> RepoResult<Self> {
        let database = config.resolve_database(options.database_name.as_deref())?;
        let collection = options
            .collection_name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| T::type_name().to_string());
        let container = ContainerRef::new(database, collection);
        debug!(target: "docrepo::repo", %container, entity = T::type_name(), "repository bound");

        Ok(GenericRepository {
            executor: QueryExecutor::new(Arc::clone(&store), container, Arc::clone(&config)),
            store,
            config,
            observer: None,
            _entity: PhantomData,
        })
    }

    /// Forward cost signals of every store call to an observer
    pub fn with_cost_observer(mut self, observer: Arc<dyn CostObserver>) -> Self {
        self.executor = self.executor.with_observer(Arc::clone(&observer));
        self.observer = Some(observer);
        self
    }

    /// Bound container
    pub fn container(&self) -> &ContainerRef {
        self.executor.container()
    }

    fn fault(&self, operation: &str, err: RepoError) -> RepoError {
        error!(
            target: "docrepo::repo",
            container = %self.container(),
            operation,
            error = %err,
            "store call failed"
        );
        err
    }

    fn charge(&self, operation: &str, charge: f64) {
        cost::report(self.observer.as_deref(), operation, charge);
    }

    fn decode_page(page: SearchResult<Document>) -> RepoResult<SearchResult<T>> {
        page.try_map(from_record::<T>)
    }

    fn decode_typed(&self, record: Document) -> RepoResult<Option<T>> {
        if !has_type_label(&record, T::type_name()) {
            debug!(
                target: "docrepo::repo",
                container = %self.container(),
                entity = T::type_name(),
                "record belongs to another type"
            );
            return Ok(None);
        }
        from_record(record).map(Some)
    }

    async fn read_record(&self, id: Uuid, partition_key: &str) -> RepoResult<Option<Document>> {
        match self
            .store
            .read(self.container(), &id.to_string(), partition_key)
            .await
        {
            Ok(response) => {
                self.charge("read", response.request_charge);
                Ok(Some(response.resource))
            }
            Err(e) if e.is_not_found() => {
                debug!(target: "docrepo::repo", container = %self.container(), %id, "record not found");
                Ok(None)
            }
            Err(e) => Err(self.fault("read", e)),
        }
    }

    async fn soft_delete(&self, id: Uuid, partition_key: &str) -> RepoResult<()> {
        let mut record = match self.read_record(id, partition_key).await? {
            Some(record) if has_type_label(&record, T::type_name()) => record,
            _ => return Ok(()),
        };
        if let Some(object) = record.as_object_mut() {
            object.insert(TTL_FIELD.to_string(), Value::from(self.config.delete_ttl));
            object.insert(ACTIVE_FIELD.to_string(), Value::from(false));
        }
        let response = self
            .store
            .upsert(self.container(), record, partition_key)
            .await
            .map_err(|e| self.fault("delete", e))?;
        self.charge("delete", response.request_charge);
        info!(
            target: "docrepo::repo",
            container = %self.container(),
            %id,
            ttl = self.config.delete_ttl,
            "record marked for expiry"
        );
        Ok(())
    }

    async fn hard_delete(&self, id: Uuid, partition_key: &str) -> RepoResult<()> {
        match self
            .store
            .delete(self.container(), &id.to_string(), partition_key)
            .await
        {
            Ok(response) => {
                self.charge("delete", response.request_charge);
                info!(target: "docrepo::repo", container = %self.container(), %id, "record deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(target: "docrepo::repo", container = %self.container(), %id, "nothing to delete");
                Ok(())
            }
            Err(e) => Err(self.fault("delete", e)),
        }
    }
}

#[async_trait]
impl<T: StorableEntity> Repository<T> for GenericRepository<T> {
    async fn get(&self, id: Uuid, partition_key: Option<&str>) -> RepoResult<Option<T>> {
        match partition_key.filter(|pk| !pk.is_empty()) {
            Some(pk) => match self.read_record(id, pk).await? {
                Some(record) => self.decode_typed(record),
                None => Ok(None),
            },
            None => {
                self.find_one(Filter::eq(ID_FIELD, id.to_string()), None, false)
                    .await
            }
        }
    }

    async fn query(&self, filter: Filter, search: SearchModel) -> RepoResult<SearchResult<T>> {
        let page = self.executor.execute(T::type_name(), filter, search).await?;
        Self::decode_page(page)
    }

    async fn query_text(&self, filter: &str, search: SearchModel) -> RepoResult<SearchResult<T>> {
        let filter: Filter = filter.parse()?;
        self.query(filter, search).await
    }

    async fn get_all(&self, filter: Filter, search: SearchModel) -> RepoResult<SearchResult<T>> {
        let page_size = search.page_size;
        let mut search = search.include_totals(false);
        let mut results = Vec::new();
        loop {
            let page = self
                .executor
                .execute(T::type_name(), filter.clone(), search.clone())
                .await?;
            let exhausted = page.is_exhausted();
            let token = page.continuation_token.clone();
            results.extend(Self::decode_page(page)?.results);
            // Offset paging yields a single page
            if exhausted || search.offset > 0 {
                break;
            }
            search = search.continue_from(token);
        }
        Ok(SearchResult {
            page_size,
            total_results: results.len(),
            results,
            continuation_token: String::new(),
        })
    }

    async fn find_one(
        &self,
        filter: Filter,
        partition_key: Option<&str>,
        require_single: bool,
    ) -> RepoResult<Option<T>> {
        let spec = self
            .executor
            .lookup_spec(T::type_name(), filter, partition_key);
        let record = if require_single {
            self.executor.single_or_default(spec).await?
        } else {
            self.executor.first_or_default(spec).await?
        };
        record.map(from_record).transpose()
    }

    async fn save(&self, mut entity: T, mode: WriteMode) -> RepoResult<(Uuid, T)> {
        let id = match mode {
            WriteMode::Update => entity.id().ok_or_else(|| {
                RepoError::InvalidInput(format!("cannot update a {} without an id", T::type_name()))
            })?,
            WriteMode::Create | WriteMode::Upsert => entity.ensure_id(),
        };
        let now = Utc::now();
        if let Some(audit) = entity.audit_metadata_mut() {
            match mode {
                WriteMode::Update => audit.stamp_modified(now),
                WriteMode::Create | WriteMode::Upsert => audit.stamp_created(now),
            }
        }

        let operation = mode.operation();
        let partition_key = entity.partition_key();
        let record = to_record(&entity)?;
        let response = match mode {
            WriteMode::Create => self.store.create(self.container(), record, &partition_key).await,
            WriteMode::Update => {
                self.store
                    .replace(self.container(), &id.to_string(), record, &partition_key)
                    .await
            }
            WriteMode::Upsert => self.store.upsert(self.container(), record, &partition_key).await,
        }
        .map_err(|e| self.fault(operation, e))?;
        self.charge(operation, response.request_charge);
        debug!(target: "docrepo::repo", container = %self.container(), %id, operation, "saved");
        Ok((id, entity))
    }

    async fn delete(&self, id: Uuid, partition_key: &str, force: bool) -> RepoResult<()> {
        if force {
            self.hard_delete(id, partition_key).await
        } else {
            self.soft_delete(id, partition_key).await
        }
    }

    async fn patch<P>(&self, id: Uuid, partition_key: &str, operations: &P) -> RepoResult<()>
    where
        P: PatchOperationCollection<T> + Sync,
    {
        let mut rendered: Vec<DocumentPatch> = operations.render()?;
        if rendered.is_empty() {
            debug!(target: "docrepo::repo", container = %self.container(), %id, "empty patch skipped");
            return Ok(());
        }
        if T::AUDITABLE {
            rendered.push(DocumentPatch::Set {
                path: AuditMetadata::modified_path(),
                value: serde_json::to_value(Utc::now())?,
            });
        }

        let count = rendered.len();
        let response = self
            .store
            .patch(self.container(), &id.to_string(), partition_key, rendered)
            .await
            .map_err(|e| self.fault("patch", e))?;
        self.charge("patch", response.request_charge);
        debug!(
            target: "docrepo::repo",
            container = %self.container(),
            %id,
            operations = count,
            "patched"
        );
        Ok(())
    }

    async fn count(&self, filter: Filter, partition_key: Option<&str>) -> RepoResult<usize> {
        self.executor
            .count(T::type_name(), filter, partition_key)
            .await
    }
}
