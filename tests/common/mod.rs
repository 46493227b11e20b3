//! Shared test models and doubles for the integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use async_trait::async_trait;
use docrepo::cache::EntryOptions;
use docrepo::core::BackendStatus;
use docrepo::engine::ContainerRef;
use docrepo::prelude::*;
use serde::{Deserialize, Serialize};

pub const DATABASE: &str = "testing";
pub const COLLECTION: &str = "Testing";

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestObject {
    #[serde(flatten)]
    pub header: EntityHeader,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Number", default)]
    pub number: i64,
    #[serde(rename = "Prop1", default)]
    pub prop1: Option<String>,
    #[serde(rename = "Collection", default)]
    pub collection: Vec<String>,
    #[serde(rename = "ChildObject", default, skip_serializing_if = "Option::is_none")]
    pub child_object: Option<Box<TestObject>>,
}

impl TestObject {
    pub const NUMBER: Field<TestObject, i64> = Field::new("Number");
    pub const PROP1: Field<TestObject, String> = Field::new("Prop1");
    pub const COLLECTION: Field<TestObject, Vec<String>> = Field::list("Collection");
    pub const CHILD_OBJECT: Field<TestObject, TestObject> = Field::new("ChildObject");

    pub fn new(key: &str) -> Self {
        TestObject {
            header: EntityHeader::default(),
            key: key.to_string(),
            number: 0,
            prop1: None,
            collection: Vec::new(),
            child_object: None,
        }
    }

    pub fn primary() -> Self {
        Self::new("Primary")
    }
}

impl StorableEntity for TestObject {
    const TYPE_LABELS: &'static [&'static str] = &["TestObject"];

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn partition_key(&self) -> String {
        self.key.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseTestObject {
    #[serde(flatten)]
    pub header: EntityHeader,
    #[serde(rename = "SomeIntValue", default, skip_serializing_if = "Option::is_none")]
    pub some_int_value: Option<i64>,
    #[serde(rename = "SomeStringProp", default, skip_serializing_if = "Option::is_none")]
    pub some_string_prop: Option<String>,
}

impl StorableEntity for BaseTestObject {
    const TYPE_LABELS: &'static [&'static str] = &["BaseTestObject"];

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn partition_key(&self) -> String {
        "BaseTestObject".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildObject1 {
    #[serde(flatten)]
    pub header: EntityHeader,
    #[serde(rename = "SomeIntValue")]
    pub some_int_value: i64,
}

impl StorableEntity for ChildObject1 {
    const TYPE_LABELS: &'static [&'static str] = &["ChildObject1", "BaseTestObject"];

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn partition_key(&self) -> String {
        "BaseTestObject".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildObject2 {
    #[serde(flatten)]
    pub header: EntityHeader,
    #[serde(rename = "SomeStringProp")]
    pub some_string_prop: String,
}

impl StorableEntity for ChildObject2 {
    const TYPE_LABELS: &'static [&'static str] = &["ChildObject2", "BaseTestObject"];

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn partition_key(&self) -> String {
        "BaseTestObject".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAuditableObject {
    #[serde(flatten)]
    pub header: EntityHeader,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Collection", default)]
    pub collection: Vec<String>,
    #[serde(rename = "ExampleProperty", default)]
    pub example_property: Option<String>,
    #[serde(rename = "AuditMetadata", default)]
    pub audit: AuditMetadata,
}

impl TestAuditableObject {
    pub const COLLECTION: Field<TestAuditableObject, Vec<String>> = Field::list("Collection");
    pub const EXAMPLE_PROPERTY: Field<TestAuditableObject, String> =
        Field::new("ExampleProperty");

    pub fn primary() -> Self {
        TestAuditableObject {
            header: EntityHeader::default(),
            key: "Primary".to_string(),
            collection: Vec::new(),
            example_property: None,
            audit: AuditMetadata::default(),
        }
    }
}

impl StorableEntity for TestAuditableObject {
    const TYPE_LABELS: &'static [&'static str] = &["TestAuditableObject"];
    const AUDITABLE: bool = true;

    fn header(&self) -> &EntityHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut EntityHeader {
        &mut self.header
    }

    fn partition_key(&self) -> String {
        self.key.clone()
    }

    fn audit_metadata_mut(&mut self) -> Option<&mut AuditMetadata> {
        Some(&mut self.audit)
    }
}

// ============================================================================
// Wiring
// ============================================================================

pub fn config() -> Arc<RepositoryConfig> {
    Arc::new(RepositoryConfig::for_database(DATABASE))
}

pub fn container() -> ContainerRef {
    ContainerRef::new(DATABASE, COLLECTION)
}

/// Repository for `T` over the shared test collection
pub fn repository<T: StorableEntity>(store: &InMemoryStore) -> GenericRepository<T> {
    GenericRepository::new(
        Arc::new(store.clone()),
        config(),
        RepositoryOptions::default().collection(COLLECTION),
    )
    .unwrap()
}

// ============================================================================
// Cache doubles
// ============================================================================

/// Cache whose every call fails
#[derive(Debug, Default)]
pub struct FailingCache;

fn cache_down() -> RepoError {
    RepoError::Cache("cache unavailable".to_string())
}

#[async_trait]
impl DistributedCache for FailingCache {
    async fn get(&self, _key: &str) -> RepoResult<Option<Vec<u8>>> {
        Err(cache_down())
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _options: EntryOptions) -> RepoResult<()> {
        Err(cache_down())
    }

    async fn refresh(&self, _key: &str) -> RepoResult<()> {
        Err(cache_down())
    }

    async fn remove(&self, _key: &str) -> RepoResult<()> {
        Err(cache_down())
    }
}

/// Backend fault status of an error, for assertions
pub fn status(err: &RepoError) -> Option<BackendStatus> {
    err.backend_status()
}
