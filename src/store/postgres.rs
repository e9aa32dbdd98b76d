use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{
    Collection, Document, OrderBy, RecordRepository, RepositoryError, SortKind, StoredRecord,
};

/// Record store backed by the `records` table (see `migrations/`).
///
/// Every collection shares the table; `project_id` is lifted out of the
/// document so per-project listings can use the index.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    body: Json<Document>,
}

impl From<RecordRow> for StoredRecord {
    fn from(row: RecordRow) -> Self {
        Self { id: row.id, fields: row.body.0 }
    }
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `ORDER BY` clause for `order`; the field name is bound as `$3`.
fn order_clause(order: Option<OrderBy>) -> String {
    match order {
        None => "ORDER BY created_at ASC".to_owned(),
        Some(o) => {
            let direction = if o.descending { "DESC" } else { "ASC" };
            match o.kind {
                SortKind::Text => format!("ORDER BY body->>$3 {direction}"),
                SortKind::Timestamp => format!("ORDER BY (body->>$3)::timestamptz {direction}"),
            }
        }
    }
}

fn project_of(fields: &Document) -> Option<&str> {
    fields.get("projectId").and_then(Value::as_str)
}

#[async_trait]
impl RecordRepository for PgRepository {
    async fn list(
        &self,
        collection: Collection,
        project_id: Option<&str>,
        order_by: Option<OrderBy>,
    ) -> Result<Vec<StoredRecord>, RepositoryError> {
        let sql = format!(
            "SELECT id, body FROM records \
             WHERE collection = $1 AND ($2::text IS NULL OR project_id = $2) {}",
            order_clause(order_by)
        );
        let mut query = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(collection.as_str())
            .bind(project_id);
        if let Some(order) = order_by {
            query = query.bind(order.field);
        }

        let rows = query.fetch_all(&self.pool).await?;
        debug!(collection = %collection, project_id = ?project_id, rows = rows.len(), "Listed records");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, body FROM records WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn create(
        &self,
        collection: Collection,
        mut fields: Document,
    ) -> Result<String, RepositoryError> {
        fields.remove("id");
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO records (id, collection, project_id, body) VALUES ($1, $2, $3, $4)",
        )
        .bind(&id)
        .bind(collection.as_str())
        .bind(project_of(&fields))
        .bind(Json(&fields))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mut fields: Document,
    ) -> Result<(), RepositoryError> {
        fields.remove("id");

        let result = sqlx::query(
            "UPDATE records \
             SET body = body || $3, project_id = COALESCE($4, project_id) \
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(&fields))
        .bind(project_of(&fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Missing { collection, id: id.to_owned() });
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM records WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
//
// These need a reachable Postgres (`DATABASE_URL`); run with
// `cargo test -- --ignored`.
// ---------------------------------------------------------------------------
