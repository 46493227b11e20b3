//! Paged search request and result types

use serde::{Deserialize, Serialize};

/// Page size used when a request does not set one
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Parameters of one paged query call
///
/// Built per call and consumed by it. An empty `partition_key` means the
/// query fans out across every partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchModel {
    /// Maximum number of results in the returned page
    pub page_size: usize,
    /// Records to skip before the page starts
    pub offset: usize,
    /// Sort direction, used only with `sort_by_field`
    pub sort_ascending: bool,
    /// Dotted path of the field to sort by
    pub sort_by_field: Option<String>,
    /// Partition to scope the query to
    pub partition_key: Option<String>,
    /// Token returned by the previous page
    pub continuation_token: Option<String>,
    /// Restrict to active (or inactive) records
    pub active: Option<bool>,
    /// Override the configured default for computing totals
    pub include_total_results: Option<bool>,
}

impl Default for SearchModel {
    fn default() -> Self {
        SearchModel {
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
            sort_ascending: false,
            sort_by_field: None,
            partition_key: None,
            continuation_token: None,
            active: None,
            include_total_results: None,
        }
    }
}

impl SearchModel {
    /// Request with the given page size
    pub fn with_page_size(page_size: usize) -> Self {
        SearchModel {
            page_size,
            ..Self::default()
        }
    }

    /// Scope to a partition
    pub fn partition(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    /// Resume from a previous page
    pub fn continue_from(mut self, token: impl Into<String>) -> Self {
        self.continuation_token = Some(token.into());
        self
    }

    /// Order by a dotted field path
    pub fn sort_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.sort_by_field = Some(field.into());
        self.sort_ascending = ascending;
        self
    }

    /// Skip records before the page starts
    pub fn skip(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Restrict on the active flag
    pub fn active_only(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Force totals on or off for this call
    pub fn include_totals(mut self, include: bool) -> Self {
        self.include_total_results = Some(include);
        self
    }

    /// Partition key, treating the empty string as absent
    pub fn partition_scope(&self) -> Option<&str> {
        self.partition_key.as_deref().filter(|pk| !pk.is_empty())
    }

    /// Inbound token, treating the empty string as absent
    pub fn inbound_token(&self) -> Option<&str> {
        self.continuation_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResult<T> {
    /// Page size that was requested
    pub page_size: usize,
    /// Total matches, only meaningful when totals were computed
    pub total_results: usize,
    /// Matches in this page
    pub results: Vec<T>,
    /// Token for the next page, empty once exhausted
    pub continuation_token: String,
}

impl<T> SearchResult<T> {
    /// Empty, exhausted result
    pub fn empty(page_size: usize) -> Self {
        SearchResult {
            page_size,
            total_results: 0,
            results: Vec::new(),
            continuation_token: String::new(),
        }
    }

    /// Whether no further pages exist
    pub fn is_exhausted(&self) -> bool {
        self.continuation_token.is_empty()
    }

    /// Convert every result, keeping the paging fields
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<SearchResult<U>, E> {
        Ok(SearchResult {
            page_size: self.page_size,
            total_results: self.total_results,
            results: self.results.into_iter().map(f).collect::<Result<_, _>>()?,
            continuation_token: self.continuation_token,
        })
    }
}
