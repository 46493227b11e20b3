//! Paged, partition-aware query execution
//!
//! [`QueryExecutor::execute`] assembles one logical page from as many store
//! batches as it takes. Per call it moves through
//!
//! ```text
//! Init -> FirstBatch -> [AccumulatingPage]* -> Returned
//! ```
//!
//! 1. Init: decode the inbound token into the store-native cursor, scope the
//!    filter to the target type (and the active flag when requested), pick
//!    the partition or warn about a cross-partition scan, apply ordering. A
//!    token-less call computes the total first when totals are enabled.
//! 2. FirstBatch: read one batch sized to the page.
//! 3. AccumulatingPage: while the page is short and the store reports more
//!    data, resume from the latest cursor asking only for what is missing.
//! 4. Returned: wrap the last cursor into the outbound token, empty once the
//!    store is exhausted.
//!
//! Batches are fetched sequentially. Store faults are logged and propagated;
//! nothing is retried here.

use crate::config::RepositoryConfig;
use crate::cost::{self, CostObserver};
use crate::diagnostics;
use crate::store::{ContainerRef, Document, DocumentStore, FeedPage, OrderBy, QuerySpec};
use crate::token;
use docrepo_core::{
    Filter, RepoError, RepoResult, SearchModel, SearchResult, ACTIVE_FIELD, ITEM_TYPE_FIELD,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Runs queries for one container
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    container: ContainerRef,
    config: Arc<RepositoryConfig>,
    observer: Option<Arc<dyn CostObserver>>,
}

impl QueryExecutor {
    /// Create an executor bound to a container
    pub fn new(
        store: Arc<dyn DocumentStore>,
        container: ContainerRef,
        config: Arc<RepositoryConfig>,
    ) -> Self {
        QueryExecutor {
            store,
            container,
            config,
            observer: None,
        }
    }

    /// Forward cost signals to an observer
    pub fn with_observer(mut self, observer: Arc<dyn CostObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Bound container
    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    /// Restrict `filter` to records labeled `type_name`, and optionally on
    /// the active flag
    pub fn scoped_filter(type_name: &str, filter: Filter, active: Option<bool>) -> Filter {
        let scoped = Filter::contains(ITEM_TYPE_FIELD, type_name).and(filter);
        match active {
            Some(active) => scoped.and(Filter::eq(ACTIVE_FIELD, active)),
            None => scoped,
        }
    }

    /// Query shape for an unpaged lookup of `type_name` records
    pub fn lookup_spec(&self, type_name: &str, filter: Filter, partition_key: Option<&str>) -> QuerySpec {
        QuerySpec {
            populate_index_metrics: self.index_metrics_enabled(),
            ..QuerySpec::new(Self::scoped_filter(type_name, filter, None))
                .in_partition(partition_key.filter(|pk| !pk.is_empty()))
        }
    }

    fn index_metrics_enabled(&self) -> bool {
        self.config.populate_index_metrics || diagnostics::current().index_metrics
    }

    fn record_batch(&self, operation: &str, page: &FeedPage) {
        cost::report(self.observer.as_deref(), operation, page.request_charge);
        if let Some(metrics) = &page.index_metrics {
            warn!(
                target: "docrepo::query",
                container = %self.container,
                operation,
                metrics = %metrics,
                "index metrics"
            );
        }
    }

    fn fault(&self, operation: &str, err: RepoError) -> RepoError {
        if err.is_not_found() {
            debug!(target: "docrepo::query", container = %self.container, operation, "not found");
        } else {
            error!(
                target: "docrepo::query",
                container = %self.container,
                operation,
                error = %err,
                "store call failed"
            );
        }
        err
    }

    // =========================================================================
    // Paged execution
    // =========================================================================

    /// Return one page of `type_name` records matching `filter`
    pub async fn execute(
        &self,
        type_name: &str,
        filter: Filter,
        search: SearchModel,
    ) -> RepoResult<SearchResult<Document>> {
        let page_size = search.page_size.max(1);

        // Init
        let mut cursor = match search.inbound_token() {
            Some(inbound) => token::decode(inbound)?,
            None => None,
        };
        let resuming = cursor.is_some();

        let partition_key = search.partition_scope().map(str::to_string);
        if partition_key.is_none() {
            warn!(
                target: "docrepo::query",
                container = %self.container,
                type_name,
                "enabling cross-partition query"
            );
        }

        let order_by = search
            .sort_by_field
            .as_ref()
            .filter(|field| !field.is_empty())
            .map(|field| OrderBy {
                field: field.clone(),
                ascending: search.sort_ascending,
            });

        let mut spec = QuerySpec {
            filter: Self::scoped_filter(type_name, filter, search.active),
            partition_key,
            order_by,
            offset: None,
            limit: None,
            max_item_count: Some(page_size),
            populate_index_metrics: self.index_metrics_enabled(),
        };
        debug!(
            target: "docrepo::query",
            container = %self.container,
            filter = %spec.filter,
            page_size,
            resuming,
            "executing query"
        );

        let include_total = search
            .include_total_results
            .unwrap_or(self.config.include_total_results_by_default);
        let mut total_results = 0;
        if !resuming && include_total {
            let counted = self
                .store
                .count(&self.container, &spec)
                .await
                .map_err(|e| self.fault("count", e))?;
            cost::report(self.observer.as_deref(), "count", counted.request_charge);
            total_results = counted.resource;
            if total_results > self.config.large_result_warning {
                warn!(
                    target: "docrepo::query",
                    container = %self.container,
                    total = total_results,
                    "large result set: query matched {} records",
                    total_results
                );
            }
        }

        if search.offset > 0 {
            spec.offset = Some(search.offset);
            spec.limit = Some(page_size);
        }

        // FirstBatch, then AccumulatingPage until full or exhausted
        let mut results: Vec<Document> = Vec::with_capacity(page_size);
        loop {
            spec.max_item_count = Some(page_size - results.len());
            let mut feed = self
                .store
                .query(&self.container, spec.clone(), cursor.take())
                .await
                .map_err(|e| self.fault("query", e))?;
            let batch = feed
                .read_next()
                .await
                .map_err(|e| self.fault("query", e))?;
            self.record_batch("query", &batch);

            results.extend(batch.items);
            cursor = batch.continuation;
            if results.len() >= page_size || cursor.is_none() {
                break;
            }
        }

        // Returned
        Ok(SearchResult {
            page_size,
            total_results,
            results,
            continuation_token: token::encode(cursor.as_deref()),
        })
    }

    // =========================================================================
    // Unpaged helpers
    // =========================================================================

    /// Read every batch of a query
    pub async fn drain(&self, spec: QuerySpec) -> RepoResult<Vec<Document>> {
        let mut feed = self
            .store
            .query(&self.container, spec, None)
            .await
            .map_err(|e| self.fault("drain", e))?;
        let mut items = Vec::new();
        while feed.has_more_results() {
            let batch = feed
                .read_next()
                .await
                .map_err(|e| self.fault("drain", e))?;
            self.record_batch("drain", &batch);
            items.extend(batch.items);
        }
        Ok(items)
    }

    /// First matching record, reading batches only until one is found
    pub async fn first_or_default(&self, spec: QuerySpec) -> RepoResult<Option<Document>> {
        let mut feed = self
            .store
            .query(&self.container, spec, None)
            .await
            .map_err(|e| self.fault("first", e))?;
        while feed.has_more_results() {
            let batch = feed
                .read_next()
                .await
                .map_err(|e| self.fault("first", e))?;
            self.record_batch("first", &batch);
            if let Some(first) = batch.items.into_iter().next() {
                return Ok(Some(first));
            }
        }
        Ok(None)
    }

    /// The only matching record
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::NotUnique`] when more than one record matches.
    pub async fn single_or_default(&self, spec: QuerySpec) -> RepoResult<Option<Document>> {
        let mut items = self.drain(spec).await?;
        match items.len() {
            0 => Ok(None),
            1 => Ok(items.pop()),
            count => Err(RepoError::NotUnique { count }),
        }
    }

    /// Count `type_name` records matching `filter`
    pub async fn count(
        &self,
        type_name: &str,
        filter: Filter,
        partition_key: Option<&str>,
    ) -> RepoResult<usize> {
        let spec = self.lookup_spec(type_name, filter, partition_key);
        let counted = self
            .store
            .count(&self.container, &spec)
            .await
            .map_err(|e| self.fault("count", e))?;
        cost::report(self.observer.as_deref(), "count", counted.request_charge);
        Ok(counted.resource)
    }
}
