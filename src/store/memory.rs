use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Collection, Document, OrderBy, RecordRepository, RepositoryError, SortKind, StoredRecord,
};

type Tables = HashMap<Collection, BTreeMap<String, Document>>;

/// Process-local record store.
///
/// Wrapped in `Arc` so clones share the same tables. Used when
/// `STORE_BACKEND=memory` and as the store behind most tests.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every table, keyed by collection then record id.
    pub async fn dump(&self) -> Tables {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl RecordRepository for MemoryRepository {
    async fn list(
        &self,
        collection: Collection,
        project_id: Option<&str>,
        order_by: Option<OrderBy>,
    ) -> Result<Vec<StoredRecord>, RepositoryError> {
        let tables = self.inner.read().await;
        let mut records: Vec<StoredRecord> = tables
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|(_, fields)| match project_id {
                Some(pid) => fields.get("projectId").and_then(Value::as_str) == Some(pid),
                None => true,
            })
            .map(|(id, fields)| StoredRecord { id: id.clone(), fields: fields.clone() })
            .collect();

        if let Some(order) = order_by {
            records.sort_by(|a, b| compare(&a.fields, &b.fields, order));
        }
        Ok(records)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredRecord>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .await
            .get(&collection)
            .and_then(|table| table.get(id))
            .map(|fields| StoredRecord { id: id.to_owned(), fields: fields.clone() }))
    }

    async fn create(
        &self,
        collection: Collection,
        mut fields: Document,
    ) -> Result<String, RepositoryError> {
        fields.remove("id");
        let id = Uuid::new_v4().to_string();
        self.inner
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id.clone(), fields);
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        fields: Document,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.inner.write().await;
        let existing = tables
            .get_mut(&collection)
            .and_then(|table| table.get_mut(id))
            .ok_or_else(|| RepositoryError::Missing { collection, id: id.to_owned() })?;

        existing.extend(fields.into_iter().filter(|(k, _)| k != "id"));
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError> {
        if let Some(table) = self.inner.write().await.get_mut(&collection) {
            table.remove(id);
        }
        Ok(())
    }
}

fn compare(a: &Document, b: &Document, order: OrderBy) -> Ordering {
    let (x, y) = (a.get(order.field), b.get(order.field));
    let ord = match order.kind {
        SortKind::Text => x.and_then(Value::as_str).cmp(&y.and_then(Value::as_str)),
        SortKind::Timestamp => timestamp(x).cmp(&timestamp(y)),
    };
    if order.descending {
        ord.reverse()
    } else {
        ord
    }
}

fn timestamp(v: Option<&Value>) -> Option<DateTime<Utc>> {
    v?.as_str()?.parse().ok()
}
