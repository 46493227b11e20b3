//! Path compiler tests
//!
//! Selectors over a small nested model, compiled to both dialects, plus a
//! property test over arbitrary field/index chains.

use docrepo_core::path::{compile, Dialect, Field, Segment, Selector};
use docrepo_core::RepoError;
use proptest::prelude::*;

// =============================================================================
// Model
// =============================================================================

struct TestObject;
struct Child;
struct Complex;
struct Complexity;
struct Audit;

const PROP1: Field<TestObject, String> = Field::new("Prop1");
const COLLECTION: Field<TestObject, Vec<String>> = Field::list("Collection");
const COMPLEX: Field<TestObject, Vec<Complex>> = Field::list("Complex");
const CHILD: Field<TestObject, Child> = Field::new("ChildObject");
const COMPLEXITIES: Field<TestObject, Vec<Complexity>> = Field::list("Complexities");
const AUDIT: Field<TestObject, Audit> = Field::new("AuditMetadata");

const CHILD_COLLECTION: Field<Child, Vec<String>> = Field::list("Collection");
const CHILD_CHILD: Field<Child, Child> = Field::new("ChildObject");

const COMPLEX_PROP1: Field<Complex, String> = Field::new("Prop1");
const COMPLEX_CHILD: Field<Complex, Child> = Field::new("ChildObject");

const COMPLEX_STRING: Field<Complexity, String> =
    Field::new("ComplexString").renamed("complexString");
const COMPLEXITY_STRING: Field<Complexity, String> =
    Field::new("Complexity_String").renamed("complexity_String");
const COMPLEXITY_COMPLEX: Field<Complexity, Vec<Complex>> = Field::list("Complex");

const MODIFIED: Field<Audit, String> = Field::new("ModifiedDateTime");

fn root() -> Selector<TestObject> {
    Selector::root()
}

// =============================================================================
// Slash dialect
// =============================================================================

#[test]
fn test_simple_property() {
    assert_eq!(root().field(PROP1).slash_path().unwrap(), "/Prop1");
}

#[test]
fn test_whole_collection_is_append_position() {
    assert_eq!(root().field(COLLECTION).slash_path().unwrap(), "/Collection/-");
}

#[test]
fn test_collection_index() {
    assert_eq!(
        root().field(COLLECTION).at(2).slash_path().unwrap(),
        "/Collection/2"
    );
    assert_eq!(root().field(COMPLEX).at(0).slash_path().unwrap(), "/Complex/0");
}

#[test]
fn test_nested_collection_append() {
    let s = root().field(CHILD).field(CHILD_COLLECTION);
    assert_eq!(s.slash_path().unwrap(), "/ChildObject/Collection/-");
}

#[test]
fn test_index_interleaves_with_fields() {
    let s = root().field(COMPLEX).at(0).field(COMPLEX_PROP1);
    assert_eq!(s.slash_path().unwrap(), "/Complex/0/Prop1");
}

#[test]
fn test_renamed_fields_use_wire_name() {
    let s = root().field(COMPLEXITIES).at(2).field(COMPLEX_STRING);
    assert_eq!(s.slash_path().unwrap(), "/Complexities/2/complexString");

    let s = root().field(COMPLEXITIES).at(2).field(COMPLEXITY_STRING);
    assert_eq!(s.slash_path().unwrap(), "/Complexities/2/complexity_String");
}

#[test]
fn test_index_in_nested_collection_of_nested_object() {
    let s = root()
        .field(COMPLEX)
        .at(0)
        .field(COMPLEX_CHILD)
        .field(CHILD_COLLECTION)
        .at(2);
    assert_eq!(s.slash_path().unwrap(), "/Complex/0/ChildObject/Collection/2");
}

#[test]
fn test_deep_chain() {
    let s = root()
        .field(COMPLEXITIES)
        .at(2)
        .field(COMPLEXITY_COMPLEX)
        .at(5)
        .field(COMPLEX_CHILD)
        .field(CHILD_CHILD)
        .field(CHILD_CHILD)
        .field(CHILD_COLLECTION);
    assert_eq!(
        s.slash_path().unwrap(),
        "/Complexities/2/Complex/5/ChildObject/ChildObject/ChildObject/Collection/-"
    );
}

// =============================================================================
// Dot dialect
// =============================================================================

#[test]
fn test_dot_nested_fields() {
    let s = root()
        .field(CHILD)
        .field(CHILD_CHILD)
        .field(CHILD_CHILD)
        .field(CHILD_COLLECTION);
    assert_eq!(
        s.dot_path().unwrap(),
        "ChildObject.ChildObject.ChildObject.Collection"
    );
}

#[test]
fn test_dot_audit_field() {
    let s = root().field(AUDIT).field(MODIFIED);
    assert_eq!(s.dot_path().unwrap(), "AuditMetadata.ModifiedDateTime");
}

#[test]
fn test_dot_rejects_index_anywhere() {
    let s = root().field(COMPLEX).at(0).field(COMPLEX_PROP1);
    assert!(matches!(
        s.dot_path(),
        Err(RepoError::UnsupportedOperation(_))
    ));
}

// =============================================================================
// Unsupported shapes
// =============================================================================

#[test]
fn test_non_static_index_names_shape() {
    let s = root().field(COMPLEX).index_by("items.Count - 1").field(COMPLEX_PROP1);
    match s.slash_path() {
        Err(RepoError::Compilation { shape }) => {
            assert!(shape.contains("non-static index"));
            assert!(shape.contains("items.Count - 1"));
        }
        other => panic!("expected compilation error, got {:?}", other),
    }
}

#[test]
fn test_method_call_names_shape() {
    let s: Selector<TestObject, String> = root().field(PROP1).call("ToUpper");
    match s.dot_path() {
        Err(RepoError::Compilation { shape }) => assert!(shape.contains("ToUpper")),
        other => panic!("expected compilation error, got {:?}", other),
    }
}

// =============================================================================
// Properties
// =============================================================================

const NAMES: [&str; 5] = ["Alpha", "Beta", "gamma", "Delta_2", "e"];

/// One generated step: a field, optionally followed by an index into it
fn step() -> impl Strategy<Value = (&'static str, bool, Option<usize>)> {
    (
        prop::sample::select(NAMES.to_vec()),
        any::<bool>(),
        prop::option::of(0usize..20),
    )
        .prop_map(|(name, collection, index)| {
            // An indexed field is a collection by construction
            (name, collection || index.is_some(), index)
        })
}

fn build(steps: &[(&'static str, bool, Option<usize>)]) -> (Vec<Segment>, String) {
    let mut segments = Vec::new();
    let mut expected = String::new();
    for (i, (name, collection, index)) in steps.iter().enumerate() {
        segments.push(if *collection {
            Segment::collection(*name)
        } else {
            Segment::field(*name)
        });
        expected.push('/');
        expected.push_str(name);
        match index {
            Some(n) => {
                segments.push(Segment::Index(*n));
                expected.push_str(&format!("/{}", n));
            }
            None if *collection && i + 1 == steps.len() => expected.push_str("/-"),
            None => {}
        }
    }
    (segments, expected)
}

proptest! {
    #[test]
    fn prop_slash_matches_segment_concatenation(steps in prop::collection::vec(step(), 1..=5)) {
        let (segments, expected) = build(&steps);
        prop_assert_eq!(compile(&segments, Dialect::Slash).unwrap(), expected);
    }

    #[test]
    fn prop_whole_collection_leaf_ends_in_append(steps in prop::collection::vec(step(), 0..=4), name in prop::sample::select(NAMES.to_vec())) {
        let (mut segments, _) = build(&steps);
        segments.push(Segment::collection(name));
        let path = compile(&segments, Dialect::Slash).unwrap();
        prop_assert!(path.ends_with("/-"));
    }

    #[test]
    fn prop_dot_never_contains_slash(steps in prop::collection::vec(step(), 1..=5)) {
        let (segments, _) = build(&steps);
        let has_index = segments.iter().any(|s| matches!(s, Segment::Index(_)));
        match compile(&segments, Dialect::Dot) {
            Ok(path) => {
                prop_assert!(!has_index);
                prop_assert!(!path.contains('/'));
            }
            Err(err) => {
                prop_assert!(has_index);
                prop_assert!(matches!(err, RepoError::UnsupportedOperation(_)), "unexpected error kind");
            }
        }
    }
}
