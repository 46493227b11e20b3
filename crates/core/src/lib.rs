//! Core types for docrepo
//!
//! This crate defines the vocabulary shared by the store, the repository and
//! the caching layer:
//! - Error: `RepoError` taxonomy and `RepoResult`
//! - Entity: `StorableEntity`, `EntityHeader`, `AuditMetadata`, record layout
//! - Search: `SearchModel`, `SearchResult`
//! - Path: typed field selectors and the slash/dot path compiler
//! - Patch: patch operations, document and index patch sets
//! - Document: applying slash-dialect patches to JSON documents
//! - Filter: bounded record predicates with a small text grammar

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod entity;
pub mod error;
pub mod filter;
pub mod patch;
pub mod path;
pub mod search;

pub use document::{apply_patch, PointerError};
pub use entity::{
    from_record, has_type_label, to_record, AuditMetadata, EntityHeader, StorableEntity,
    ACTIVE_FIELD, ID_FIELD, ITEM_TYPE_FIELD, NO_EXPIRY, PARTITION_KEY_FIELD, TTL_FIELD,
};
pub use error::{BackendFault, BackendStatus, RepoError, RepoResult};
pub use filter::{Comparison, FieldRef, Filter};
pub use patch::{
    DocumentPatch, DocumentPatchSet, IndexFieldUpdate, IndexPatchSet, OperationRepresentation,
    PatchOperation, PatchOperationCollection, PatchOperationKind,
};
pub use path::{Dialect, Field, Segment, Selector};
pub use search::{SearchModel, SearchResult, DEFAULT_PAGE_SIZE};
