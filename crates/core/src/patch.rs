//! Patch operations and patch operation sets
//!
//! A patch request is an ordered, append-only list of [`PatchOperation`]s
//! built through a [`PatchOperationCollection`]. Each builder call compiles a
//! typed [`Selector`] to a wire path and appends one operation.
//!
//! Two collections are provided:
//!
//! - [`DocumentPatchSet`]: slash-dialect operations for partial document
//!   updates, following JSON-Patch semantics.
//! - [`IndexPatchSet`]: field updates for a flattened search index. Every call
//!   becomes a `Set` of a dot path, and a parallel slash `Set` is appended so
//!   the same request can also be applied to the source document.
//!
//! Rendering turns operations into a concrete backend representation
//! ([`DocumentPatch`] or [`IndexFieldUpdate`]). Asking for a representation
//! an operation cannot be expressed in is a programming error reported as
//! [`RepoError::Cast`].

use crate::error::{RepoError, RepoResult};
use crate::path::{Dialect, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

const ARRAY_MANIPULATION: &str = "manipulating an array is not supported by the search index; \
     set the entire property to the new array value instead";

/// Kind of patch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperationKind {
    /// Insert or replace; appends for whole-collection paths
    Add,
    /// Remove an existing target
    Remove,
    /// Replace an existing target
    Replace,
    /// Insert or replace, including plain non-array targets
    Set,
}

impl fmt::Display for PatchOperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatchOperationKind::Add => "add",
            PatchOperationKind::Remove => "remove",
            PatchOperationKind::Replace => "replace",
            PatchOperationKind::Set => "set",
        };
        write!(f, "{}", name)
    }
}

// =============================================================================
// PatchOperation
// =============================================================================

/// One operation in a patch request
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOperation {
    kind: PatchOperationKind,
    path: String,
    value: Option<Value>,
    dialect: Dialect,
}

impl PatchOperation {
    /// Create an operation; `Remove` never carries a value
    pub fn new(
        kind: PatchOperationKind,
        path: impl Into<String>,
        value: Option<Value>,
        dialect: Dialect,
    ) -> Self {
        let value = match kind {
            PatchOperationKind::Remove => None,
            _ => value,
        };
        PatchOperation {
            kind,
            path: path.into(),
            value,
            dialect,
        }
    }

    /// Operation kind
    pub fn kind(&self) -> PatchOperationKind {
        self.kind
    }

    /// Wire path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value, `None` for removals
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Dialect the path is written in
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render into a backend representation
    pub fn to_operation<R: OperationRepresentation>(&self) -> RepoResult<R> {
        if self.dialect != R::DIALECT {
            return Err(RepoError::Cast {
                from: native_name(self.dialect),
                to: R::NAME,
            });
        }
        Ok(R::from_operation(self))
    }
}

fn native_name(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Slash => DocumentPatch::NAME,
        Dialect::Dot => IndexFieldUpdate::NAME,
    }
}

// =============================================================================
// Representations
// =============================================================================

/// A backend-specific rendering of a [`PatchOperation`]
pub trait OperationRepresentation: Sized {
    /// Dialect of operations this representation can express
    const DIALECT: Dialect;
    /// Name used in cast errors
    const NAME: &'static str;

    /// Build from an operation already known to be in [`Self::DIALECT`]
    fn from_operation(op: &PatchOperation) -> Self;
}

/// Partial document update operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum DocumentPatch {
    /// Insert or replace, `-` appends
    Add {
        /// Slash path
        path: String,
        /// New value
        value: Value,
    },
    /// Remove an existing target
    Remove {
        /// Slash path
        path: String,
    },
    /// Replace an existing target
    Replace {
        /// Slash path
        path: String,
        /// New value
        value: Value,
    },
    /// Insert or replace
    Set {
        /// Slash path
        path: String,
        /// New value
        value: Value,
    },
}

impl DocumentPatch {
    /// Target path
    pub fn path(&self) -> &str {
        match self {
            DocumentPatch::Add { path, .. }
            | DocumentPatch::Remove { path }
            | DocumentPatch::Replace { path, .. }
            | DocumentPatch::Set { path, .. } => path,
        }
    }

    /// Operation kind
    pub fn kind(&self) -> PatchOperationKind {
        match self {
            DocumentPatch::Add { .. } => PatchOperationKind::Add,
            DocumentPatch::Remove { .. } => PatchOperationKind::Remove,
            DocumentPatch::Replace { .. } => PatchOperationKind::Replace,
            DocumentPatch::Set { .. } => PatchOperationKind::Set,
        }
    }
}

impl OperationRepresentation for DocumentPatch {
    const DIALECT: Dialect = Dialect::Slash;
    const NAME: &'static str = "DocumentPatch";

    fn from_operation(op: &PatchOperation) -> Self {
        let path = op.path.clone();
        let value = op.value.clone().unwrap_or(Value::Null);
        match op.kind {
            PatchOperationKind::Add => DocumentPatch::Add { path, value },
            PatchOperationKind::Remove => DocumentPatch::Remove { path },
            PatchOperationKind::Replace => DocumentPatch::Replace { path, value },
            PatchOperationKind::Set => DocumentPatch::Set { path, value },
        }
    }
}

/// Search-index field assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexFieldUpdate {
    /// Dotted field name
    pub field: String,
    /// New value
    pub value: Value,
}

impl OperationRepresentation for IndexFieldUpdate {
    const DIALECT: Dialect = Dialect::Dot;
    const NAME: &'static str = "IndexFieldUpdate";

    fn from_operation(op: &PatchOperation) -> Self {
        IndexFieldUpdate {
            field: op.path.clone(),
            value: op.value.clone().unwrap_or(Value::Null),
        }
    }
}

// =============================================================================
// Collections
// =============================================================================

/// Ordered, append-only set of patch operations targeting entities of type `E`
pub trait PatchOperationCollection<E> {
    /// Insert or replace the value at `selector`
    ///
    /// A whole-collection selector targets the collection itself (`/Tags`).
    fn set<V: Serialize>(&mut self, selector: &Selector<E, V>, value: V) -> RepoResult<&mut Self>;

    /// Insert or replace; whole-collection selectors append `value` as one element
    fn add<V: Serialize>(&mut self, selector: &Selector<E, V>, value: V) -> RepoResult<&mut Self>;

    /// Append one element to a collection, or insert at a fixed index
    fn add_item<I: Serialize>(
        &mut self,
        selector: &Selector<E, Vec<I>>,
        item: I,
    ) -> RepoResult<&mut Self>;

    /// Replace an existing value
    ///
    /// A whole-collection selector replaces the collection itself (`/Tags`).
    fn replace<V: Serialize>(
        &mut self,
        selector: &Selector<E, V>,
        value: V,
    ) -> RepoResult<&mut Self>;

    /// Remove an existing value
    ///
    /// A whole-collection selector removes the collection itself (`/Tags`).
    fn remove<V>(&mut self, selector: &Selector<E, V>) -> RepoResult<&mut Self>;

    /// Operations in insertion order
    fn operations(&self) -> &[PatchOperation];

    /// Render every operation into `R`
    fn render<R: OperationRepresentation>(&self) -> RepoResult<Vec<R>> {
        self.operations()
            .iter()
            .map(PatchOperation::to_operation::<R>)
            .collect()
    }

    /// Number of operations
    fn len(&self) -> usize {
        self.operations().len()
    }

    /// Whether no operation was added
    fn is_empty(&self) -> bool {
        self.operations().is_empty()
    }
}

/// Slash-dialect patch set for partial document updates
pub struct DocumentPatchSet<E> {
    operations: Vec<PatchOperation>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> DocumentPatchSet<E> {
    /// Empty set
    pub fn new() -> Self {
        DocumentPatchSet {
            operations: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Build from an RFC 6902 style JSON array
    ///
    /// `add`, `remove` and `replace` keep their meaning. Any other op name
    /// becomes a `Set`.
    pub fn from_json_patch(document: &Value) -> RepoResult<Self> {
        let entries = document
            .as_array()
            .ok_or_else(|| RepoError::InvalidInput("JSON patch must be an array".to_string()))?;

        let mut set = Self::new();
        for (i, entry) in entries.iter().enumerate() {
            let op = entry.get("op").and_then(Value::as_str).ok_or_else(|| {
                RepoError::InvalidInput(format!("JSON patch entry {} has no 'op'", i))
            })?;
            let path = entry.get("path").and_then(Value::as_str).ok_or_else(|| {
                RepoError::InvalidInput(format!("JSON patch entry {} has no 'path'", i))
            })?;
            let kind = match op {
                "add" => PatchOperationKind::Add,
                "remove" => PatchOperationKind::Remove,
                "replace" => PatchOperationKind::Replace,
                _ => PatchOperationKind::Set,
            };
            set.push(kind, path.to_string(), entry.get("value").cloned());
        }
        Ok(set)
    }

    fn push(&mut self, kind: PatchOperationKind, path: String, value: Option<Value>) {
        self.operations
            .push(PatchOperation::new(kind, path, value, Dialect::Slash));
    }

    fn push_value<V: Serialize>(
        &mut self,
        kind: PatchOperationKind,
        path: String,
        value: V,
    ) -> RepoResult<&mut Self> {
        let value = serde_json::to_value(value)?;
        self.push(kind, path, Some(value));
        Ok(self)
    }
}

impl<E> Default for DocumentPatchSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for DocumentPatchSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.operations).finish()
    }
}

impl<E> PatchOperationCollection<E> for DocumentPatchSet<E> {
    fn set<V: Serialize>(&mut self, selector: &Selector<E, V>, value: V) -> RepoResult<&mut Self> {
        let path = selector.compile_member(Dialect::Slash)?;
        self.push_value(PatchOperationKind::Set, path, value)
    }

    fn add<V: Serialize>(&mut self, selector: &Selector<E, V>, value: V) -> RepoResult<&mut Self> {
        let path = selector.slash_path()?;
        self.push_value(PatchOperationKind::Add, path, value)
    }

    fn add_item<I: Serialize>(
        &mut self,
        selector: &Selector<E, Vec<I>>,
        item: I,
    ) -> RepoResult<&mut Self> {
        let path = selector.slash_path()?;
        self.push_value(PatchOperationKind::Add, path, item)
    }

    fn replace<V: Serialize>(
        &mut self,
        selector: &Selector<E, V>,
        value: V,
    ) -> RepoResult<&mut Self> {
        let path = selector.compile_member(Dialect::Slash)?;
        self.push_value(PatchOperationKind::Replace, path, value)
    }

    fn remove<V>(&mut self, selector: &Selector<E, V>) -> RepoResult<&mut Self> {
        let path = selector.compile_member(Dialect::Slash)?;
        self.push(PatchOperationKind::Remove, path, None);
        Ok(self)
    }

    fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }
}

/// Search-index patch set
///
/// The index cannot address array elements and rejects a field assigned twice
/// in one request. Every call appends a dot-dialect `Set` and a parallel
/// slash-dialect `Set` of the same value.
pub struct IndexPatchSet<E> {
    operations: Vec<PatchOperation>,
    assigned: HashSet<String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> IndexPatchSet<E> {
    /// Empty set
    pub fn new() -> Self {
        IndexPatchSet {
            operations: Vec::new(),
            assigned: HashSet::new(),
            _entity: PhantomData,
        }
    }

    fn assign<V>(&mut self, selector: &Selector<E, V>, value: Value) -> RepoResult<&mut Self> {
        if selector.has_index() {
            return Err(RepoError::UnsupportedOperation(ARRAY_MANIPULATION.to_string()));
        }
        let field = selector.dot_path()?;
        if self.assigned.contains(&field) {
            return Err(RepoError::DuplicatePath { path: field });
        }
        let document_path = selector.compile_member(Dialect::Slash)?;

        self.assigned.insert(field.clone());
        self.operations.push(PatchOperation::new(
            PatchOperationKind::Set,
            field,
            Some(value.clone()),
            Dialect::Dot,
        ));
        self.operations.push(PatchOperation::new(
            PatchOperationKind::Set,
            document_path,
            Some(value),
            Dialect::Slash,
        ));
        Ok(self)
    }

    /// Rendered search-index assignments
    pub fn index_fields(&self) -> Vec<IndexFieldUpdate> {
        self.operations
            .iter()
            .filter(|op| op.dialect == Dialect::Dot)
            .map(IndexFieldUpdate::from_operation)
            .collect()
    }

    /// Rendered parallel document operations
    pub fn document_operations(&self) -> Vec<DocumentPatch> {
        self.operations
            .iter()
            .filter(|op| op.dialect == Dialect::Slash)
            .map(DocumentPatch::from_operation)
            .collect()
    }
}

impl<E> Default for IndexPatchSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for IndexPatchSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.operations).finish()
    }
}

impl<E> PatchOperationCollection<E> for IndexPatchSet<E> {
    fn set<V: Serialize>(&mut self, selector: &Selector<E, V>, value: V) -> RepoResult<&mut Self> {
        let value = serde_json::to_value(value)?;
        self.assign(selector, value)
    }

    fn add<V: Serialize>(&mut self, selector: &Selector<E, V>, value: V) -> RepoResult<&mut Self> {
        self.set(selector, value)
    }

    fn add_item<I: Serialize>(
        &mut self,
        _selector: &Selector<E, Vec<I>>,
        _item: I,
    ) -> RepoResult<&mut Self> {
        Err(RepoError::UnsupportedOperation(ARRAY_MANIPULATION.to_string()))
    }

    fn replace<V: Serialize>(
        &mut self,
        selector: &Selector<E, V>,
        value: V,
    ) -> RepoResult<&mut Self> {
        self.set(selector, value)
    }

    fn remove<V>(&mut self, selector: &Selector<E, V>) -> RepoResult<&mut Self> {
        self.assign(selector, Value::Null)
    }

    fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    /// Only the operations written in `R`'s dialect
    fn render<R: OperationRepresentation>(&self) -> RepoResult<Vec<R>> {
        Ok(self
            .operations
            .iter()
            .filter(|op| op.dialect == R::DIALECT)
            .map(R::from_operation)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Field;
    use serde_json::json;

    struct Doc;
    struct Child;

    const NUMBER: Field<Doc, i32> = Field::new("Number");
    const TAGS: Field<Doc, Vec<String>> = Field::list("Tags");
    const CHILD: Field<Doc, Child> = Field::new("ChildObject");
    const CHILD_NUMBER: Field<Child, i32> = Field::new("Number");

    fn number() -> Selector<Doc, i32> {
        Selector::root().field(NUMBER)
    }

    fn tags() -> Selector<Doc, Vec<String>> {
        Selector::root().field(TAGS)
    }

    #[test]
    fn test_each_call_appends_one_operation() {
        let mut set = DocumentPatchSet::<Doc>::new();
        set.replace(&number(), 7).unwrap();
        set.replace(&Selector::root().field(CHILD).field(CHILD_NUMBER), 12)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.operations()[0].path(), "/Number");
        assert_eq!(set.operations()[1].path(), "/ChildObject/Number");
        assert_eq!(set.operations()[1].value(), Some(&json!(12)));
    }

    #[test]
    fn test_add_item_appends_to_collection() {
        let mut set = DocumentPatchSet::<Doc>::new();
        set.add_item(&tags(), "Test3".to_string()).unwrap();
        let op = &set.operations()[0];
        assert_eq!(op.kind(), PatchOperationKind::Add);
        assert_eq!(op.path(), "/Tags/-");
    }

    #[test]
    fn test_remove_has_no_value() {
        let mut set = DocumentPatchSet::<Doc>::new();
        set.remove(&tags().at(0)).unwrap();
        let op = &set.operations()[0];
        assert_eq!(op.path(), "/Tags/0");
        assert!(op.value().is_none());
    }

    #[test]
    fn test_set_whole_collection_targets_member() {
        let mut set = DocumentPatchSet::<Doc>::new();
        set.set(&tags(), vec!["a".to_string()]).unwrap();
        assert_eq!(set.operations()[0].path(), "/Tags");
    }

    #[test]
    fn test_replace_and_remove_whole_collection_target_member() {
        let mut replaced = DocumentPatchSet::<Doc>::new();
        replaced.replace(&tags(), Vec::new()).unwrap();
        assert_eq!(replaced.operations()[0].path(), "/Tags");

        let mut removed = DocumentPatchSet::<Doc>::new();
        removed.remove(&tags()).unwrap();
        assert_eq!(removed.operations()[0].path(), "/Tags");

        let mut appended = DocumentPatchSet::<Doc>::new();
        appended.add_item(&tags(), "x".to_string()).unwrap();
        assert_eq!(appended.operations()[0].path(), "/Tags/-");
    }

    #[test]
    fn test_render_document_patch() {
        let mut set = DocumentPatchSet::<Doc>::new();
        set.set(&number(), 1).unwrap().remove(&tags().at(2)).unwrap();
        let rendered: Vec<DocumentPatch> = set.render().unwrap();
        assert_eq!(
            rendered,
            vec![
                DocumentPatch::Set {
                    path: "/Number".into(),
                    value: json!(1)
                },
                DocumentPatch::Remove {
                    path: "/Tags/2".into()
                },
            ]
        );
    }

    #[test]
    fn test_render_wrong_representation_is_cast_error() {
        let mut set = DocumentPatchSet::<Doc>::new();
        set.set(&number(), 1).unwrap();
        let err = set.render::<IndexFieldUpdate>().unwrap_err();
        assert_eq!(
            err,
            RepoError::Cast {
                from: "DocumentPatch",
                to: "IndexFieldUpdate"
            }
        );
    }

    #[test]
    fn test_from_json_patch_maps_unknown_ops_to_set() {
        let doc = json!([
            { "op": "add", "path": "/Tags/-", "value": "x" },
            { "op": "remove", "path": "/Number" },
            { "op": "copy", "path": "/Other", "value": 3 }
        ]);
        let set = DocumentPatchSet::<Doc>::from_json_patch(&doc).unwrap();
        let kinds: Vec<_> = set.operations().iter().map(|o| o.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                PatchOperationKind::Add,
                PatchOperationKind::Remove,
                PatchOperationKind::Set
            ]
        );
    }

    #[test]
    fn test_from_json_patch_requires_path() {
        let doc = json!([{ "op": "add", "value": 1 }]);
        assert!(matches!(
            DocumentPatchSet::<Doc>::from_json_patch(&doc),
            Err(RepoError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_document_patch_serializes_with_op_tag() {
        let patch = DocumentPatch::Replace {
            path: "/Number".into(),
            value: json!(7),
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "op": "replace", "path": "/Number", "value": 7 })
        );
    }

    #[test]
    fn test_index_set_appends_dot_and_slash() {
        let mut set = IndexPatchSet::<Doc>::new();
        set.set(&Selector::root().field(CHILD).field(CHILD_NUMBER), 3)
            .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.index_fields(),
            vec![IndexFieldUpdate {
                field: "ChildObject.Number".into(),
                value: json!(3)
            }]
        );
        assert_eq!(set.document_operations()[0].path(), "/ChildObject/Number");
    }

    #[test]
    fn test_index_set_rejects_duplicate_path() {
        let mut set = IndexPatchSet::<Doc>::new();
        set.set(&number(), 1).unwrap();
        let err = set.replace(&number(), 2).unwrap_err();
        assert_eq!(
            err,
            RepoError::DuplicatePath {
                path: "Number".into()
            }
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_index_set_rejects_array_manipulation() {
        let mut set = IndexPatchSet::<Doc>::new();
        assert!(matches!(
            set.add_item(&tags(), "x".to_string()),
            Err(RepoError::UnsupportedOperation(_))
        ));
        assert!(matches!(
            set.remove(&tags().at(1)),
            Err(RepoError::UnsupportedOperation(_))
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn test_index_remove_sets_null() {
        let mut set = IndexPatchSet::<Doc>::new();
        set.remove(&number()).unwrap();
        assert_eq!(set.index_fields()[0].value, Value::Null);
    }

    #[test]
    fn test_index_render_filters_by_dialect() {
        let mut set = IndexPatchSet::<Doc>::new();
        set.set(&number(), 1)
            .unwrap()
            .set(&tags(), vec!["a".to_string()])
            .unwrap();
        let fields: Vec<IndexFieldUpdate> = set.render().unwrap();
        let docs: Vec<DocumentPatch> = set.render().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(docs.len(), 2);
        assert_eq!(fields[1].field, "Tags");
        assert_eq!(docs[1].path(), "/Tags");
    }
}
