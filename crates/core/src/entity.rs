//! Storable entities and their persisted layout
//!
//! Every persisted record is a JSON object holding the entity's own fields
//! plus two inline fields written by the repository:
//!
//! - `ItemType`: the entity's type labels, own label first, then ancestors
//! - `PartitionKey`: the value the store shards on
//!
//! Several entity types may share one physical collection. Queries restrict
//! to records whose `ItemType` contains the target type's own label, so a
//! repository bound to a base label sees every descendant while a repository
//! bound to a leaf label sees only that type.

use crate::error::{RepoError, RepoResult};
use crate::path::Field;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Wire name of the identifier field
pub const ID_FIELD: &str = "id";
/// Wire name of the type-label list
pub const ITEM_TYPE_FIELD: &str = "ItemType";
/// Wire name of the inline partition key
pub const PARTITION_KEY_FIELD: &str = "PartitionKey";
/// Wire name of the active flag
pub const ACTIVE_FIELD: &str = "IsActive";
/// Wire name of the expiration counter
pub const TTL_FIELD: &str = "ttl";

/// Expiration counter value meaning "never expires"
pub const NO_EXPIRY: i32 = -1;

// =============================================================================
// Header
// =============================================================================

/// Fields every storable entity carries
///
/// Embed with `#[serde(flatten)]` so the fields sit at the top level of the
/// persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHeader {
    /// Unique identifier, assigned on first write when absent
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Logical-delete marker
    #[serde(rename = "IsActive", default = "default_active")]
    pub is_active: bool,
    /// Seconds until the store expires the record, `-1` for never
    #[serde(rename = "ttl", default = "default_ttl")]
    pub time_to_live: i32,
}

fn default_active() -> bool {
    true
}

fn default_ttl() -> i32 {
    NO_EXPIRY
}

impl Default for EntityHeader {
    fn default() -> Self {
        EntityHeader {
            id: None,
            is_active: true,
            time_to_live: NO_EXPIRY,
        }
    }
}

impl EntityHeader {
    /// Header with a fixed identifier
    pub fn with_id(id: Uuid) -> Self {
        EntityHeader {
            id: Some(id),
            ..Self::default()
        }
    }
}

// =============================================================================
// Audit metadata
// =============================================================================

/// Created/modified stamps for auditable entities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuditMetadata {
    /// Set once, at first persistence
    #[serde(default)]
    pub created_date_time: Option<DateTime<Utc>>,
    /// Updated on every mutation
    #[serde(default)]
    pub modified_date_time: Option<DateTime<Utc>>,
    /// Actor that created the record
    #[serde(default)]
    pub created_by: Option<Uuid>,
    /// Actor that last modified the record
    #[serde(default)]
    pub modified_by: Option<Uuid>,
}

impl AuditMetadata {
    /// Wire name of the audit block on an entity
    pub const WIRE_NAME: &'static str = "AuditMetadata";

    /// `CreatedDateTime`
    pub const CREATED_DATE_TIME: Field<AuditMetadata, Option<DateTime<Utc>>> =
        Field::new("CreatedDateTime");
    /// `ModifiedDateTime`
    pub const MODIFIED_DATE_TIME: Field<AuditMetadata, Option<DateTime<Utc>>> =
        Field::new("ModifiedDateTime");
    /// `CreatedBy`
    pub const CREATED_BY: Field<AuditMetadata, Option<Uuid>> = Field::new("CreatedBy");
    /// `ModifiedBy`
    pub const MODIFIED_BY: Field<AuditMetadata, Option<Uuid>> = Field::new("ModifiedBy");

    /// Stamp a first write: created (if still unset) and modified
    pub fn stamp_created(&mut self, now: DateTime<Utc>) {
        if self.created_date_time.is_none() {
            self.created_date_time = Some(now);
        }
        self.modified_date_time = Some(now);
    }

    /// Stamp a mutation
    pub fn stamp_modified(&mut self, now: DateTime<Utc>) {
        self.modified_date_time = Some(now);
    }

    /// Slash path of the modified stamp on an auditable entity
    pub fn modified_path() -> String {
        format!(
            "/{}/{}",
            Self::WIRE_NAME,
            Self::MODIFIED_DATE_TIME.wire_name()
        )
    }
}

// =============================================================================
// StorableEntity
// =============================================================================

/// A record type the repository can persist
///
/// Type labels are registered at compile time instead of being discovered by
/// reflection. List the type's own label first followed by the labels of every
/// modeled ancestor:
///
/// ```
/// use docrepo_core::entity::{EntityHeader, StorableEntity};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Serialize, Deserialize)]
/// struct Invoice {
///     #[serde(flatten)]
///     header: EntityHeader,
///     #[serde(rename = "Customer")]
///     customer: String,
/// }
///
/// impl StorableEntity for Invoice {
///     const TYPE_LABELS: &'static [&'static str] = &["Invoice", "Document"];
///
///     fn header(&self) -> &EntityHeader { &self.header }
///     fn header_mut(&mut self) -> &mut EntityHeader { &mut self.header }
///     fn partition_key(&self) -> String { self.customer.clone() }
/// }
///
/// assert_eq!(Invoice::type_name(), "Invoice");
/// ```
pub trait StorableEntity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Own type label followed by ancestor labels
    const TYPE_LABELS: &'static [&'static str];

    /// Whether [`StorableEntity::audit_metadata_mut`] returns a block
    const AUDITABLE: bool = false;

    /// Shared header fields
    fn header(&self) -> &EntityHeader;

    /// Shared header fields, mutably
    fn header_mut(&mut self) -> &mut EntityHeader;

    /// Value the store partitions this record by
    fn partition_key(&self) -> String;

    /// Audit block, for auditable entities
    fn audit_metadata_mut(&mut self) -> Option<&mut AuditMetadata> {
        None
    }

    /// The type's own label
    fn type_name() -> &'static str {
        match Self::TYPE_LABELS.first() {
            Some(label) => label,
            None => "",
        }
    }

    /// Identifier, if assigned
    fn id(&self) -> Option<Uuid> {
        self.header().id
    }

    /// Assign an identifier
    fn set_id(&mut self, id: Uuid) {
        self.header_mut().id = Some(id);
    }

    /// Return the identifier, assigning a fresh one first if absent
    fn ensure_id(&mut self) -> Uuid {
        match self.header().id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                self.set_id(id);
                id
            }
        }
    }

    /// Logical-delete marker
    fn is_active(&self) -> bool {
        self.header().is_active
    }

    /// Expiration counter
    fn time_to_live(&self) -> i32 {
        self.header().time_to_live
    }

    /// Set the expiration counter
    fn set_time_to_live(&mut self, seconds: i32) {
        self.header_mut().time_to_live = seconds;
    }
}

// =============================================================================
// Record conversion
// =============================================================================

/// Serialize an entity into its persisted record
pub fn to_record<E: StorableEntity>(entity: &E) -> RepoResult<Value> {
    let mut record = serde_json::to_value(entity)?;
    let object = record.as_object_mut().ok_or_else(|| {
        RepoError::Serialization(format!(
            "{} does not serialize to a JSON object",
            E::type_name()
        ))
    })?;
    object.insert(
        ITEM_TYPE_FIELD.to_string(),
        Value::from(
            E::TYPE_LABELS
                .iter()
                .map(|label| Value::from(*label))
                .collect::<Vec<_>>(),
        ),
    );
    object.insert(
        PARTITION_KEY_FIELD.to_string(),
        Value::from(entity.partition_key()),
    );
    Ok(record)
}

/// Deserialize a persisted record into an entity
pub fn from_record<E: StorableEntity>(record: Value) -> RepoResult<E> {
    Ok(serde_json::from_value(record)?)
}

/// Whether a persisted record carries the given type label
pub fn has_type_label(record: &Value, label: &str) -> bool {
    record
        .get(ITEM_TYPE_FIELD)
        .and_then(Value::as_array)
        .map(|labels| labels.iter().any(|l| l.as_str() == Some(label)))
        .unwrap_or(false)
}
