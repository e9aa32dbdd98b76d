pub mod memory;
pub mod postgres;

use std::{fmt, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::models::Entity;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Record fields as stored, without the record identifier.
pub type Document = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Named record collections. The serde names double as the collection names
/// in the backing store and in snapshot documents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Projects,
    Devices,
    Targets,
    Fertilizers,
    Measurements,
    DoseLogs,
    WaterChanges,
    Actions,
    Photos,
    Reminders,
}

impl Collection {
    /// The nine project-owned collections, in snapshot order.
    pub const DEPENDENTS: [Collection; 9] = [
        Collection::Devices,
        Collection::Targets,
        Collection::Fertilizers,
        Collection::Measurements,
        Collection::DoseLogs,
        Collection::WaterChanges,
        Collection::Actions,
        Collection::Photos,
        Collection::Reminders,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Projects => "projects",
            Collection::Devices => "devices",
            Collection::Targets => "targets",
            Collection::Fertilizers => "fertilizers",
            Collection::Measurements => "measurements",
            Collection::DoseLogs => "doseLogs",
            Collection::WaterChanges => "waterChanges",
            Collection::Actions => "actions",
            Collection::Photos => "photos",
            Collection::Reminders => "reminders",
        }
    }

    /// Listing order used by the screens for this collection.
    pub fn default_order(self) -> Option<OrderBy> {
        match self {
            Collection::Projects => Some(OrderBy::desc("createdAt", SortKind::Timestamp)),
            Collection::Devices | Collection::Fertilizers => {
                Some(OrderBy::asc("name", SortKind::Text))
            }
            Collection::Measurements
            | Collection::DoseLogs
            | Collection::WaterChanges
            | Collection::Actions
            | Collection::Photos => Some(OrderBy::desc("date", SortKind::Timestamp)),
            Collection::Reminders => Some(OrderBy::asc("nextDueDate", SortKind::Timestamp)),
            Collection::Targets => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        std::iter::once(Collection::Projects)
            .chain(Collection::DEPENDENTS)
            .find(|c| c.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown collection: {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// How a field's values compare when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Text,
    /// ISO-8601 strings compared as instants.
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: &'static str,
    pub kind: SortKind,
    pub descending: bool,
}

impl OrderBy {
    pub const fn asc(field: &'static str, kind: SortKind) -> Self {
        Self { field, kind, descending: false }
    }

    pub const fn desc(field: &'static str, kind: SortKind) -> Self {
        Self { field, kind, descending: true }
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: String,
    pub fields: Document,
}

impl StoredRecord {
    /// The record as a single JSON object with its `id` folded back in.
    pub fn into_json(self) -> Value {
        let mut fields = self.fields;
        fields.insert("id".to_owned(), Value::String(self.id));
        Value::Object(fields)
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{collection} record {id} does not exist")]
    Missing { collection: Collection, id: String },

    #[error("{collection} record {id} is malformed: {source}")]
    Malformed {
        collection: Collection,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// The backend refused the request or could not be reached.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Generic document access over the named collections.
///
/// Identifiers are opaque strings chosen by the implementation on `create`.
/// `update` merges `fields` into the stored document and fails with
/// [`RepositoryError::Missing`] when the record is absent; `delete` of an
/// absent record succeeds.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    async fn list(
        &self,
        collection: Collection,
        project_id: Option<&str>,
        order_by: Option<OrderBy>,
    ) -> Result<Vec<StoredRecord>, RepositoryError>;

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredRecord>, RepositoryError>;

    async fn create(&self, collection: Collection, fields: Document)
        -> Result<String, RepositoryError>;

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError>;
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

/// Decode a stored document into its entity type.
pub fn decode<T: Entity>(record: StoredRecord) -> Result<T, RepositoryError> {
    let id = record.id.clone();
    serde_json::from_value(record.into_json()).map_err(|source| RepositoryError::Malformed {
        collection: T::COLLECTION,
        id,
        source,
    })
}

/// Encode an entity into a storable document. The `id` field is dropped; the
/// store assigns its own.
pub fn encode<T: Entity>(entity: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(entity)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(serde::ser::Error::custom(format!(
            "{} must encode as an object, got {other}",
            T::COLLECTION
        ))),
    }
}

/// List every `T` (optionally scoped to one project) in the collection's
/// default order.
pub async fn list_all<T: Entity>(
    repo: &dyn RecordRepository,
    project_id: Option<&str>,
) -> Result<Vec<T>, RepositoryError> {
    repo.list(T::COLLECTION, project_id, T::COLLECTION.default_order())
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

pub async fn fetch<T: Entity>(
    repo: &dyn RecordRepository,
    id: &str,
) -> Result<Option<T>, RepositoryError> {
    repo.get(T::COLLECTION, id).await?.map(decode).transpose()
}

/// Store `entity` as a new record and return the identifier it was given.
pub async fn insert<T: Entity>(
    repo: &dyn RecordRepository,
    entity: &T,
) -> Result<String, RepositoryError> {
    let fields = encode(entity).map_err(|source| RepositoryError::Malformed {
        collection: T::COLLECTION,
        id: entity.id().to_owned(),
        source,
    })?;
    repo.create(T::COLLECTION, fields).await
}
