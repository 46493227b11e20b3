//! Typed field selectors and the wire-path compiler
//!
//! A [`Selector`] is a chain of field accesses and fixed-index element
//! accesses rooted at an entity type. Each step is checked at compile time:
//! a [`Field<Owner, Value>`] can only be applied to a selector currently
//! pointing at `Owner`, and [`Selector::at`] is only available on `Vec` values.
//!
//! Selectors compile to one of two wire dialects:
//!
//! | Dialect | Separator | Index | Whole collection | Example |
//! |---------|-----------|-------|------------------|---------|
//! | [`Dialect::Slash`] | `/` (leading) | `/N` | `/Field/-` | `/Complex/0/ChildObject/Collection/2` |
//! | [`Dialect::Dot`] | `.` | rejected | `Field` | `AuditMetadata.ModifiedDateTime` |
//!
//! The slash dialect is the document-relative addressing used by partial
//! document updates. The dot dialect addresses flattened search-index fields
//! and cannot express array positions.
//!
//! # Examples
//!
//! ```
//! use docrepo_core::path::{Field, Selector};
//!
//! struct Order;
//! struct Line;
//!
//! const LINES: Field<Order, Vec<Line>> = Field::list("Lines");
//! const SKU: Field<Line, String> = Field::new("Sku").renamed("sku");
//!
//! let sku = Selector::<Order>::root().field(LINES).at(3).field(SKU);
//! assert_eq!(sku.slash_path().unwrap(), "/Lines/3/sku");
//!
//! let all_lines = Selector::<Order>::root().field(LINES);
//! assert_eq!(all_lines.slash_path().unwrap(), "/Lines/-");
//! ```

use crate::error::{RepoError, RepoResult};
use std::fmt;
use std::marker::PhantomData;

/// Wire dialect a selector compiles to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// JSON-Pointer-like, `/A/0/B`
    Slash,
    /// Dot-delimited, `A.B`
    Dot,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Slash => write!(f, "slash"),
            Dialect::Dot => write!(f, "dot"),
        }
    }
}

// =============================================================================
// Field tags
// =============================================================================

/// A field of `O` holding a value of type `V`
///
/// Fields are declared once as constants next to the type that owns them.
/// `V` is the value type at that position; it does not have to match the
/// Rust field type exactly (an `Option<Child>` field is usually declared as
/// `Field<Owner, Child>` so selectors can navigate into it).
pub struct Field<O, V> {
    name: &'static str,
    wire_name: Option<&'static str>,
    collection: bool,
    _marker: PhantomData<fn(&O) -> &V>,
}

impl<O, V> Field<O, V> {
    /// Declare a scalar or object field
    pub const fn new(name: &'static str) -> Self {
        Field {
            name,
            wire_name: None,
            collection: false,
            _marker: PhantomData,
        }
    }

    /// Use a different name on the wire (serde rename)
    pub const fn renamed(self, wire_name: &'static str) -> Self {
        Field {
            name: self.name,
            wire_name: Some(wire_name),
            collection: self.collection,
            _marker: PhantomData,
        }
    }

    /// Field name as declared
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name used in compiled paths
    pub fn wire_name(&self) -> &'static str {
        self.wire_name.unwrap_or(self.name)
    }

    /// Whether the field holds a collection
    pub fn is_collection(&self) -> bool {
        self.collection
    }
}

impl<O, I> Field<O, Vec<I>> {
    /// Declare a collection field
    pub const fn list(name: &'static str) -> Self {
        Field {
            name,
            wire_name: None,
            collection: true,
            _marker: PhantomData,
        }
    }
}

impl<O, V> Clone for Field<O, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, V> Copy for Field<O, V> {}

impl<O, V> fmt::Debug for Field<O, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name())
            .field("collection", &self.collection)
            .finish()
    }
}

// =============================================================================
// Segments
// =============================================================================

/// One step of a selector chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Field access
    Field {
        /// Declared name
        name: &'static str,
        /// Wire name (rename or declared name)
        wire_name: &'static str,
        /// Field holds a collection
        collection: bool,
    },
    /// Fixed-index element access
    Index(usize),
    /// Element access whose index is not a constant
    DynamicIndex(String),
    /// Method invocation
    Call(String),
}

impl Segment {
    /// Field segment with no rename
    pub fn field(name: &'static str) -> Self {
        Segment::Field {
            name,
            wire_name: name,
            collection: false,
        }
    }

    /// Collection field segment with no rename
    pub fn collection(name: &'static str) -> Self {
        Segment::Field {
            name,
            wire_name: name,
            collection: true,
        }
    }
}

// =============================================================================
// Selector
// =============================================================================

/// A typed chain of accesses from `R` down to a value of type `V`
pub struct Selector<R, V = R> {
    segments: Vec<Segment>,
    _marker: PhantomData<fn(&R) -> &V>,
}

impl<R> Selector<R, R> {
    /// The entity itself
    pub fn root() -> Self {
        Selector {
            segments: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<R, V> Selector<R, V> {
    fn extend<N>(mut self, segment: Segment) -> Selector<R, N> {
        self.segments.push(segment);
        Selector {
            segments: self.segments,
            _marker: PhantomData,
        }
    }

    /// Access a field of the current value
    pub fn field<N>(self, field: Field<V, N>) -> Selector<R, N> {
        self.extend(Segment::Field {
            name: field.name,
            wire_name: field.wire_name(),
            collection: field.collection,
        })
    }

    /// Invoke a method on the current value
    ///
    /// Method calls have no wire representation; compiling a selector that
    /// contains one fails with [`RepoError::Compilation`].
    pub fn call<N>(self, method: impl Into<String>) -> Selector<R, N> {
        self.extend(Segment::Call(method.into()))
    }

    /// The raw segment chain, root first
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether any step is an element access
    pub fn has_index(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Index(_) | Segment::DynamicIndex(_)))
    }

    /// Whether the selector ends at a whole collection
    pub fn targets_collection(&self) -> bool {
        matches!(
            self.segments.last(),
            Some(Segment::Field {
                collection: true,
                ..
            })
        )
    }

    /// Compile to the given dialect
    pub fn compile(&self, dialect: Dialect) -> RepoResult<String> {
        compile(&self.segments, dialect)
    }

    /// Compile to the given dialect, addressing a whole collection itself
    /// rather than its append position
    ///
    /// A collection field in leaf position renders as `/Tags`, not
    /// `/Tags/-`. Patch sets compile Set, Replace and Remove this way, so
    /// those operations act on the whole collection value. Only Add and
    /// AddItem target the append position; use [`Selector::compile`] for
    /// that form.
    pub fn compile_member(&self, dialect: Dialect) -> RepoResult<String> {
        compile_segments(&self.segments, dialect, CollectionLeaf::Member)
    }

    /// Compile to the slash dialect
    pub fn slash_path(&self) -> RepoResult<String> {
        self.compile(Dialect::Slash)
    }

    /// Compile to the dot dialect
    pub fn dot_path(&self) -> RepoResult<String> {
        self.compile(Dialect::Dot)
    }
}

impl<R, I> Selector<R, Vec<I>> {
    /// Access the element at a fixed position
    pub fn at(self, index: usize) -> Selector<R, I> {
        self.extend(Segment::Index(index))
    }

    /// Access the element at a position only known from an expression
    ///
    /// Kept so callers can describe such selectors; compiling one fails with
    /// [`RepoError::Compilation`].
    pub fn index_by(self, expression: impl Into<String>) -> Selector<R, I> {
        self.extend(Segment::DynamicIndex(expression.into()))
    }
}

impl<R, V> Clone for Selector<R, V> {
    fn clone(&self) -> Self {
        Selector {
            segments: self.segments.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R, V> fmt::Debug for Selector<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.segments).finish()
    }
}

// =============================================================================
// Compiler
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum CollectionLeaf {
    Append,
    Member,
}

/// Compile a segment chain to a wire path
///
/// Segments are walked from the leaf back to the root and each rendered
/// segment is placed in front of what has been built so far. A collection
/// field in leaf position renders with the `-` append marker in the slash
/// dialect. The root (no segments) compiles to the empty string.
pub fn compile(segments: &[Segment], dialect: Dialect) -> RepoResult<String> {
    compile_segments(segments, dialect, CollectionLeaf::Append)
}

fn compile_segments(
    segments: &[Segment],
    dialect: Dialect,
    leaf: CollectionLeaf,
) -> RepoResult<String> {
    // Shape errors win over dialect errors so the result does not depend on
    // which dialect was requested.
    if let Some(err) = segments.iter().find_map(unsupported_shape) {
        return Err(err);
    }

    let mut parts: Vec<String> = Vec::with_capacity(segments.len() + 1);
    for (position, segment) in segments.iter().enumerate().rev() {
        let is_leaf = position + 1 == segments.len();
        match (segment, dialect) {
            (
                Segment::Field {
                    wire_name,
                    collection,
                    ..
                },
                Dialect::Slash,
            ) => {
                if *collection && is_leaf && leaf == CollectionLeaf::Append {
                    parts.push("-".to_string());
                }
                parts.push((*wire_name).to_string());
            }
            (Segment::Field { wire_name, .. }, Dialect::Dot) => {
                parts.push((*wire_name).to_string());
            }
            (Segment::Index(index), Dialect::Slash) => parts.push(index.to_string()),
            (Segment::Index(index), Dialect::Dot) => {
                return Err(RepoError::UnsupportedOperation(format!(
                    "index [{}] cannot be expressed in the dot dialect",
                    index
                )))
            }
            (other, _) => {
                if let Some(err) = unsupported_shape(other) {
                    return Err(err);
                }
            }
        }
    }
    parts.reverse();

    Ok(match dialect {
        Dialect::Slash if parts.is_empty() => String::new(),
        Dialect::Slash => format!("/{}", parts.join("/")),
        Dialect::Dot => parts.join("."),
    })
}

fn unsupported_shape(segment: &Segment) -> Option<RepoError> {
    match segment {
        Segment::DynamicIndex(expr) => Some(RepoError::compilation(format!(
            "non-static index `{}`",
            expr
        ))),
        Segment::Call(method) => Some(RepoError::compilation(format!(
            "method call `{}`",
            method
        ))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc;
    struct Child;

    const TITLE: Field<Doc, String> = Field::new("Title");
    const TAGS: Field<Doc, Vec<String>> = Field::list("Tags");
    const CHILDREN: Field<Doc, Vec<Child>> = Field::list("Children");
    const NAME: Field<Child, String> = Field::new("Name").renamed("name");

    #[test]
    fn test_root_compiles_empty() {
        let root = Selector::<Doc>::root();
        assert_eq!(root.slash_path().unwrap(), "");
        assert_eq!(root.dot_path().unwrap(), "");
    }

    #[test]
    fn test_single_field() {
        let s = Selector::<Doc>::root().field(TITLE);
        assert_eq!(s.slash_path().unwrap(), "/Title");
        assert_eq!(s.dot_path().unwrap(), "Title");
    }

    #[test]
    fn test_whole_collection_appends() {
        let s = Selector::<Doc>::root().field(TAGS);
        assert_eq!(s.slash_path().unwrap(), "/Tags/-");
        assert_eq!(s.dot_path().unwrap(), "Tags");
        assert!(s.targets_collection());
    }

    #[test]
    fn test_compile_member_drops_append_marker() {
        let s = Selector::<Doc>::root().field(TAGS);
        assert_eq!(s.compile_member(Dialect::Slash).unwrap(), "/Tags");
    }

    #[test]
    fn test_index_then_renamed_field() {
        let s = Selector::<Doc>::root().field(CHILDREN).at(4).field(NAME);
        assert_eq!(s.slash_path().unwrap(), "/Children/4/name");
        assert!(s.has_index());
    }

    #[test]
    fn test_dot_rejects_index() {
        let s = Selector::<Doc>::root().field(TAGS).at(1);
        let err = s.dot_path().unwrap_err();
        assert!(matches!(err, RepoError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_dynamic_index_is_compilation_error() {
        let s = Selector::<Doc>::root().field(TAGS).index_by("i + 1");
        match s.slash_path().unwrap_err() {
            RepoError::Compilation { shape } => assert!(shape.contains("i + 1")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_method_call_fails_in_both_dialects() {
        let s: Selector<Doc, String> = Selector::<Doc>::root().field(TITLE).call("Trim");
        assert!(matches!(
            s.slash_path(),
            Err(RepoError::Compilation { .. })
        ));
        assert!(matches!(s.dot_path(), Err(RepoError::Compilation { .. })));
    }

    #[test]
    fn test_field_wire_name() {
        assert_eq!(NAME.name(), "Name");
        assert_eq!(NAME.wire_name(), "name");
        assert_eq!(TITLE.wire_name(), "Title");
        assert!(CHILDREN.is_collection());
    }
}
