use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::{Document, StoredRecord};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Any record as a JSON object. Request bodies may omit `id` and
/// `projectId`; responses always carry `id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct RecordDocument(pub Document);

impl From<StoredRecord> for RecordDocument {
    fn from(record: StoredRecord) -> Self {
        let mut fields = record.fields;
        fields.insert("id".to_owned(), record.id.into());
        Self(fields)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub project_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeedResponse {
    /// `None` when projects already existed and nothing was created.
    pub project_id: Option<String>,
}
