use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use utoipa::OpenApi;

use super::{
    dto::{ImportResponse, NewProject, RecordDocument, SeedResponse},
    errors::AppError,
    AppState,
};
use crate::{
    db::models::{
        Action, Cadence, Channels, Device, DeviceRecord, DeviceType, DoseLog, Entity,
        Fertilizer, FertilizerType, Measurement, Photo, Project, Reminder, Schedule, Target,
        TargetParam, WaterChange,
    },
    photos,
    planner::{self, Bucket, CalendarView},
    seed,
    snapshot::{
        self, codec,
        importer::{ImportPhase, OperationFailure},
        ImportReport, Snapshot,
    },
    store::{self, Collection, Document, RecordRepository},
    targets::{self, RangeStatus, SeriesPoint, TargetStatus},
};

/// Actions shown on the dashboard when no `limit` is given.
const DEFAULT_UPCOMING: usize = 5;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoParams {
    pub file_name: String,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlannerParams {
    #[serde(default)]
    pub view: CalendarView,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    pub param: String,
}

// ---------------------------------------------------------------------------
// Typed record helpers
// ---------------------------------------------------------------------------

/// Run a generic `fn::<T: Entity>(..)` future for the entity type stored in
/// `$collection`.
macro_rules! with_entity {
    ($collection:expr, $func:ident($($arg:expr),* $(,)?)) => {
        match $collection {
            Collection::Projects => $func::<Project>($($arg),*).await,
            Collection::Devices => $func::<Device>($($arg),*).await,
            Collection::Targets => $func::<Target>($($arg),*).await,
            Collection::Fertilizers => $func::<Fertilizer>($($arg),*).await,
            Collection::Measurements => $func::<Measurement>($($arg),*).await,
            Collection::DoseLogs => $func::<DoseLog>($($arg),*).await,
            Collection::WaterChanges => $func::<WaterChange>($($arg),*).await,
            Collection::Actions => $func::<Action>($($arg),*).await,
            Collection::Photos => $func::<Photo>($($arg),*).await,
            Collection::Reminders => $func::<Reminder>($($arg),*).await,
        }
    };
}

fn not_found(collection: Collection, id: &str) -> AppError {
    AppError::NotFound(format!("{collection} record {id} not found"))
}

fn parse_collection(raw: &str) -> Result<Collection, AppError> {
    raw.parse::<Collection>()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// A collection whose records belong to a project.
fn owned_collection(raw: &str) -> Result<Collection, AppError> {
    match parse_collection(raw)? {
        Collection::Projects => Err(AppError::BadRequest(
            "projects are not owned by a project; use /projects".into(),
        )),
        collection => Ok(collection),
    }
}

async fn require_project(repo: &dyn RecordRepository, id: &str) -> Result<Project, AppError> {
    store::fetch::<Project>(repo, id)
        .await?
        .ok_or_else(|| not_found(Collection::Projects, id))
}

fn decode_body<T: Entity>(fields: Document) -> Result<T, AppError> {
    let entity: T = serde_json::from_value(Value::Object(fields)).map_err(|e| {
        AppError::BadRequest(format!("invalid {} record: {e}", T::COLLECTION))
    })?;
    entity.validate()?;
    Ok(entity)
}

fn to_document<T: Entity>(entity: &T) -> Result<RecordDocument, AppError> {
    match serde_json::to_value(entity).map_err(|e| AppError::Internal(e.into()))? {
        Value::Object(fields) => Ok(RecordDocument(fields)),
        other => Err(AppError::Internal(anyhow::anyhow!(
            "{} encoded as {other}, expected an object",
            T::COLLECTION
        ))),
    }
}

async fn create_as<T: Entity>(
    repo: &dyn RecordRepository,
    fields: Document,
) -> Result<RecordDocument, AppError> {
    let mut entity = decode_body::<T>(fields)?;
    let id = store::insert(repo, &entity).await?;
    entity.set_id(id);
    to_document(&entity)
}

/// Check that `patch` applied to the stored record still decodes, then store
/// only the patched fields.
async fn update_as<T: Entity>(
    repo: &dyn RecordRepository,
    id: &str,
    patch: Document,
) -> Result<RecordDocument, AppError> {
    let current = repo
        .get(T::COLLECTION, id)
        .await?
        .ok_or_else(|| not_found(T::COLLECTION, id))?;

    let mut merged = current.fields;
    merged.extend(patch.clone());
    merged.insert("id".to_owned(), Value::String(id.to_owned()));
    let entity = decode_body::<T>(merged)?;

    repo.update(T::COLLECTION, id, patch).await?;
    to_document(&entity)
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// List all projects, newest first.
#[utoipa::path(
    get,
    path = "/projects",
    responses(
        (status = 200, description = "All projects", body = Vec<Project>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "projects"
)]
pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, AppError> {
    Ok(Json(store::list_all::<Project>(state.repo.as_ref(), None).await?))
}

#[utoipa::path(
    post,
    path = "/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Empty project name"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "projects"
)]
pub async fn create_project(
    State(state): State<AppState>,
    Json(body): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("project name must not be empty".into()));
    }

    let mut project = Project {
        id: String::new(),
        name: body.name,
        description: body.description,
        created_at: Utc::now(),
    };
    project.id = store::insert(state.repo.as_ref(), &project).await?;

    info!(project_id = %project.id, name = %project.name, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "The project", body = Project),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "projects"
)]
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Project>, AppError> {
    Ok(Json(require_project(state.repo.as_ref(), &project_id).await?))
}

/// Delete the project record only. Records it owns are left in place.
#[utoipa::path(
    delete,
    path = "/projects/{project_id}",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "projects"
)]
pub async fn delete_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;
    repo.delete(Collection::Projects, &project_id).await?;

    info!(project_id = %project_id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// List a project's records of one collection in that collection's display
/// order.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/records/{collection}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("collection" = Collection, Path, description = "Project-owned collection"),
    ),
    responses(
        (status = 200, description = "Records", body = Vec<RecordDocument>),
        (status = 400, description = "Unknown collection"),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "records"
)]
pub async fn list_records(
    State(state): State<AppState>,
    Path((project_id, collection)): Path<(String, String)>,
) -> Result<Json<Vec<RecordDocument>>, AppError> {
    let collection = owned_collection(&collection)?;
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let records = repo
        .list(collection, Some(project_id.as_str()), collection.default_order())
        .await?;
    debug!(project_id = %project_id, collection = %collection, count = records.len(), "Listed records");
    Ok(Json(records.into_iter().map(RecordDocument::from).collect()))
}

/// Create a record owned by the project. Any `id` or `projectId` in the body
/// is ignored.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/records/{collection}",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("collection" = Collection, Path, description = "Project-owned collection"),
    ),
    request_body = RecordDocument,
    responses(
        (status = 201, description = "Record created", body = RecordDocument),
        (status = 400, description = "Unknown collection or invalid record"),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "records"
)]
pub async fn create_record(
    State(state): State<AppState>,
    Path((project_id, collection)): Path<(String, String)>,
    Json(body): Json<RecordDocument>,
) -> Result<(StatusCode, Json<RecordDocument>), AppError> {
    let collection = owned_collection(&collection)?;
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let mut fields = body.0;
    fields.remove("id");
    fields.insert("projectId".to_owned(), Value::String(project_id.clone()));

    let created = with_entity!(collection, create_as(repo, fields))?;
    debug!(project_id = %project_id, collection = %collection, "Record created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Merge the body into an existing record.
#[utoipa::path(
    patch,
    path = "/records/{collection}/{id}",
    params(
        ("collection" = Collection, Path, description = "Collection"),
        ("id" = String, Path, description = "Record ID"),
    ),
    request_body = RecordDocument,
    responses(
        (status = 200, description = "Updated record", body = RecordDocument),
        (status = 400, description = "Unknown collection or invalid result"),
        (status = 404, description = "No such record"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "records"
)]
pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<RecordDocument>,
) -> Result<Json<RecordDocument>, AppError> {
    let collection = parse_collection(&collection)?;
    let mut patch = body.0;
    patch.remove("id");

    let updated = with_entity!(collection, update_as(state.repo.as_ref(), &id, patch))?;
    debug!(collection = %collection, id = %id, "Record updated");
    Ok(Json(updated))
}

/// Delete one record. Deleting a photo also removes its stored image.
#[utoipa::path(
    delete,
    path = "/records/{collection}/{id}",
    params(
        ("collection" = Collection, Path, description = "Collection"),
        ("id" = String, Path, description = "Record ID"),
    ),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 400, description = "Unknown collection"),
        (status = 404, description = "No such record"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "records"
)]
pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let collection = parse_collection(&collection)?;
    let repo = state.repo.as_ref();

    if collection == Collection::Photos {
        photos::remove_photo(repo, state.storage.as_ref(), &id).await?;
    } else {
        if repo.get(collection, &id).await?.is_none() {
            return Err(not_found(collection, &id));
        }
        repo.delete(collection, &id).await?;
    }

    debug!(collection = %collection, id = %id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

/// Upload an image (raw request body) and record it as a project photo.
#[utoipa::path(
    post,
    path = "/projects/{project_id}/photos",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("fileName" = String, Query, description = "Client-side file name"),
        ("date" = Option<DateTime<Utc>>, Query, description = "When the photo was taken (RFC3339); defaults to now"),
        ("notes" = Option<String>, Query, description = "Free-text notes"),
    ),
    request_body(content = Vec<u8>, description = "Image bytes", content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Photo stored", body = Photo),
        (status = 400, description = "Empty body"),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "photos"
)]
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<PhotoParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<Photo>), AppError> {
    if body.is_empty() {
        return Err(AppError::BadRequest("photo body is empty".into()));
    }
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let photo = photos::upload_photo(
        repo,
        state.storage.as_ref(),
        &project_id,
        &params.file_name,
        &body,
        params.date.unwrap_or_else(Utc::now),
        params.notes,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// Download the project and everything it owns as a JSON attachment.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/export",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Snapshot document", body = Snapshot),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "snapshots"
)]
pub async fn export_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = snapshot::build_snapshot(state.repo.as_ref(), &project_id).await?;
    let body = codec::encode(&snapshot)?;
    let file_name = codec::export_file_name(&project_id, snapshot.exported_at);

    info!(project_id = %project_id, file_name = %file_name, "Project exported");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

/// Import a snapshot document as a new project, or over the project with the
/// same name when `replace=true`.
#[utoipa::path(
    post,
    path = "/import",
    params(
        ("replace" = Option<bool>, Query, description = "Overwrite a same-named project"),
    ),
    request_body(content = Snapshot, content_type = "application/json"),
    responses(
        (status = 201, description = "Imported", body = ImportResponse),
        (status = 400, description = "Malformed snapshot"),
        (status = 409, description = "A project with this name exists"),
        (status = 500, description = "Import failed part-way; body carries the report", body = ImportReport),
    ),
    tag = "snapshots"
)]
pub async fn import_project(
    State(state): State<AppState>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Result<(StatusCode, Json<ImportResponse>), AppError> {
    let snapshot = codec::decode(&body)?;
    let project_id =
        snapshot::import_snapshot(state.repo.as_ref(), &snapshot, params.replace).await?;
    Ok((StatusCode::CREATED, Json(ImportResponse { project_id })))
}

/// Load the demo project if the store has no projects yet.
#[utoipa::path(
    post,
    path = "/seed",
    responses(
        (status = 200, description = "Seed result", body = SeedResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "snapshots"
)]
pub async fn seed_default_data(
    State(state): State<AppState>,
) -> Result<Json<SeedResponse>, AppError> {
    let project_id = seed::preload_default_data(state.repo.as_ref()).await?;
    Ok(Json(SeedResponse { project_id }))
}

// ---------------------------------------------------------------------------
// Planner and targets
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/projects/{project_id}/planner",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("view" = Option<CalendarView>, Query, description = "day, week (default), month or year"),
        ("date" = Option<NaiveDate>, Query, description = "Anchor date; defaults to today (UTC)"),
    ),
    responses(
        (status = 200, description = "Actions grouped per day, or per month in the year view", body = Vec<Bucket>),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "planner"
)]
pub async fn get_planner(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<PlannerParams>,
) -> Result<Json<Vec<Bucket>>, AppError> {
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let actions = store::list_all::<Action>(repo, Some(project_id.as_str())).await?;
    let anchor = params.date.unwrap_or_else(|| Utc::now().date_naive());
    Ok(Json(planner::bucket(&actions, params.view, anchor)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/planner/upcoming",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("limit" = Option<usize>, Query, description = "Maximum number of actions (default 5)"),
    ),
    responses(
        (status = 200, description = "Open actions from now on, soonest first", body = Vec<Action>),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "planner"
)]
pub async fn get_upcoming_actions(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<UpcomingParams>,
) -> Result<Json<Vec<Action>>, AppError> {
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let actions = store::list_all::<Action>(repo, Some(project_id.as_str())).await?;
    let limit = params.limit.unwrap_or(DEFAULT_UPCOMING);
    Ok(Json(planner::upcoming(&actions, Utc::now(), limit)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/targets/status",
    params(("project_id" = String, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Each target with its latest measurement", body = Vec<TargetStatus>),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "targets"
)]
pub async fn get_target_status(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<TargetStatus>>, AppError> {
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let (targets, measurements) = tokio::try_join!(
        store::list_all::<Target>(repo, Some(project_id.as_str())),
        store::list_all::<Measurement>(repo, Some(project_id.as_str())),
    )?;
    Ok(Json(targets::status_report(&targets, &measurements)))
}

#[utoipa::path(
    get,
    path = "/projects/{project_id}/measurements/series",
    params(
        ("project_id" = String, Path, description = "Project ID"),
        ("param" = String, Query, description = "Parameter label, e.g. NO3"),
    ),
    responses(
        (status = 200, description = "Readings of one parameter, oldest first", body = Vec<SeriesPoint>),
        (status = 400, description = "Missing parameter"),
        (status = 404, description = "No such project"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "targets"
)]
pub async fn get_measurement_series(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<Vec<SeriesPoint>>, AppError> {
    let repo = state.repo.as_ref();
    require_project(repo, &project_id).await?;

    let param = TargetParam::from(params.param);
    let measurements = store::list_all::<Measurement>(repo, Some(project_id.as_str())).await?;
    let series = targets::measurement_series(&measurements, &param);
    debug!(project_id = %project_id, param = %param, points = series.len(), "Measurement series built");
    Ok(Json(series))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        list_projects, create_project, get_project, delete_project,
        list_records, create_record, update_record, delete_record,
        upload_photo, export_project, import_project, seed_default_data,
        get_planner, get_upcoming_actions, get_target_status, get_measurement_series, health,
    ),
    components(schemas(
        Project, NewProject, RecordDocument, Collection,
        DeviceRecord, DeviceType, Channels,
        Target, Measurement, Fertilizer, FertilizerType, Schedule,
        DoseLog, WaterChange, Action, Photo, Reminder, Cadence,
        Snapshot, ImportResponse, ImportReport, OperationFailure, ImportPhase,
        SeedResponse, CalendarView, Bucket, TargetStatus, RangeStatus, SeriesPoint,
    )),
    tags(
        (name = "projects",  description = "Aquarium projects"),
        (name = "records",   description = "Generic access to project-owned records"),
        (name = "photos",    description = "Photo uploads"),
        (name = "snapshots", description = "Project export, import and demo data"),
        (name = "planner",   description = "Maintenance calendar"),
        (name = "targets",   description = "Water parameter targets"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Aquarium Tracker API",
        version = "0.1.0",
        description = "REST API for planted-aquarium records, snapshots and planning"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Bytes, http::StatusCode};
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use crate::{
        api::{router, AppState},
        object_store::LocalObjectStorage,
        store::MemoryRepository,
    };

    fn test_server() -> (TestServer, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Arc::new(MemoryRepository::new()),
            Arc::new(LocalObjectStorage::new(dir.path(), "/files")),
        );
        (TestServer::new(router(state)).unwrap(), dir)
    }

    async fn create_project(server: &TestServer, name: &str) -> String {
        let resp = server.post("/projects").json(&json!({ "name": name })).await;
        resp.assert_status(StatusCode::CREATED);
        resp.json::<Value>()["id"].as_str().unwrap().to_owned()
    }

    async fn create_record(server: &TestServer, pid: &str, collection: &str, body: Value) -> Value {
        let resp = server
            .post(&format!("/projects/{pid}/records/{collection}"))
            .json(&body)
            .await;
        resp.assert_status(StatusCode::CREATED);
        resp.json()
    }

    // -----------------------------------------------------------------------
    // System
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_is_ok() {
        let (server, _dir) = test_server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        assert_eq!(resp.json::<Value>(), json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let (server, _dir) = test_server();
        let body: Value = server.get("/api-docs/openapi.json").await.json();
        assert!(body["paths"]["/projects/{project_id}/export"].is_object());
        assert!(body["paths"]["/import"].is_object());
        assert!(body["paths"]["/projects/{project_id}/measurements/series"].is_object());
        assert_eq!(body["components"]["schemas"]["RecordDocument"]["type"], "object");
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn create_then_fetch_project() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank A").await;

        let resp = server.get(&format!("/projects/{pid}")).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["name"], "Tank A");
        assert!(body["createdAt"].is_string());

        let list: Vec<Value> = server.get("/projects").await.json();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn blank_project_name_is_rejected() {
        let (server, _dir) = test_server();
        let resp = server.post("/projects").json(&json!({ "name": "  " })).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(resp.json::<Value>()["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_project_is_404() {
        let (server, _dir) = test_server();
        server.get("/projects/nope").await.assert_status(StatusCode::NOT_FOUND);
        server.delete("/projects/nope").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn deleting_a_project_leaves_its_records() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;
        let action = create_record(
            &server,
            &pid,
            "actions",
            json!({ "type": "pruning", "date": "2024-05-01T10:00:00Z" }),
        )
        .await;

        server
            .delete(&format!("/projects/{pid}"))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let id = action["id"].as_str().unwrap();
        server
            .patch(&format!("/records/actions/{id}"))
            .json(&json!({ "done": true }))
            .await
            .assert_status_ok();
    }

    // -----------------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn created_records_are_owned_and_listed() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;

        let created = create_record(
            &server,
            &pid,
            "measurements",
            json!({
                "id": "client-chosen",
                "projectId": "someone-else",
                "param": "NO3",
                "value": 12.5,
                "unit": "ppm",
                "date": "2024-05-02T10:00:00Z"
            }),
        )
        .await;

        assert_ne!(created["id"], "client-chosen");
        assert_eq!(created["projectId"], pid.as_str());

        let list: Vec<Value> = server
            .get(&format!("/projects/{pid}/records/measurements"))
            .await
            .json();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["id"], created["id"]);
        assert_eq!(list[0]["value"], 12.5);
    }

    #[tokio::test]
    async fn invalid_records_are_rejected() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;

        let resp = server
            .post(&format!("/projects/{pid}/records/waterChanges"))
            .json(&json!({ "date": "2024-05-02T10:00:00Z", "percent": 150 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server
            .post(&format!("/projects/{pid}/records/devices"))
            .json(&json!({ "type": "filter", "name": "Canister", "settings": { "channels": { "W": 10 } } }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server.get(&format!("/projects/{pid}/records/logs")).await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        let resp = server.get(&format!("/projects/{pid}/records/projects")).await;
        resp.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn free_text_records_are_accepted() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;

        let device = create_record(
            &server,
            &pid,
            "devices",
            json!({ "type": "filter", "name": "Canister", "settings": { "intensityPercent": 60.0 } }),
        )
        .await;
        assert_eq!(device["settings"]["intensityPercent"], 60.0);

        let action = create_record(
            &server,
            &pid,
            "actions",
            json!({ "type": "Water change", "date": "2024-05-01T10:00:00Z" }),
        )
        .await;
        assert_eq!(action["type"], "Water change");

        let target = create_record(
            &server,
            &pid,
            "targets",
            json!({ "param": "NO₃", "min": 10.0, "max": 20.0, "unit": "ppm" }),
        )
        .await;
        assert_eq!(target["param"], "NO₃");
    }

    #[tokio::test]
    async fn patch_merges_fields() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;
        let action = create_record(
            &server,
            &pid,
            "actions",
            json!({ "type": "glassCleaning", "date": "2024-05-01T10:00:00Z", "notes": "front pane" }),
        )
        .await;
        let id = action["id"].as_str().unwrap();

        let resp = server
            .patch(&format!("/records/actions/{id}"))
            .json(&json!({ "done": true }))
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["done"], true);
        assert_eq!(body["notes"], "front pane");

        let resp = server
            .patch(&format!("/records/actions/{id}"))
            .json(&json!({ "type": 42 }))
            .await;
        resp.assert_status(StatusCode::BAD_REQUEST);

        server
            .patch("/records/actions/missing")
            .json(&json!({ "done": true }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_record_then_404() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;
        let target = create_record(
            &server,
            &pid,
            "targets",
            json!({ "param": "K", "min": 10, "max": 15, "unit": "ppm" }),
        )
        .await;
        let path = format!("/records/targets/{}", target["id"].as_str().unwrap());

        server.delete(&path).await.assert_status(StatusCode::NO_CONTENT);
        server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // Photos
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn photo_upload_and_delete() {
        let (server, dir) = test_server();
        let pid = create_project(&server, "Tank").await;

        let resp = server
            .post(&format!("/projects/{pid}/photos"))
            .add_query_param("fileName", "front.jpg")
            .add_query_param("notes", "week 3")
            .bytes(Bytes::from_static(b"jpeg-bytes"))
            .await;
        resp.assert_status(StatusCode::CREATED);
        let photo: Value = resp.json();
        assert_eq!(photo["notes"], "week 3");

        let url = photo["url"].as_str().unwrap();
        let on_disk = dir.path().join(url.trim_start_matches("/files/"));
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"jpeg-bytes");

        let id = photo["id"].as_str().unwrap();
        server
            .delete(&format!("/records/photos/{id}"))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn photo_upload_requires_a_body_and_a_project() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;

        server
            .post(&format!("/projects/{pid}/photos"))
            .add_query_param("fileName", "a.jpg")
            .bytes(Bytes::new())
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post("/projects/nope/photos")
            .add_query_param("fileName", "a.jpg")
            .bytes(Bytes::from_static(b"x"))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    // -----------------------------------------------------------------------
    // Export / import / seed
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn export_is_an_attachment() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank A").await;
        create_record(
            &server,
            &pid,
            "reminders",
            json!({ "title": "Water change", "cadence": "weekly", "nextDueDate": "2024-05-08T08:00:00Z" }),
        )
        .await;

        let resp = server.get(&format!("/projects/{pid}/export")).await;
        resp.assert_status_ok();

        let disposition = resp.header("content-disposition");
        let disposition = disposition.to_str().unwrap();
        assert!(disposition.starts_with(&format!("attachment; filename=\"aquarium-export-{pid}-")));

        let body: Value = resp.json();
        assert_eq!(body["project"]["name"], "Tank A");
        assert_eq!(body["reminders"].as_array().unwrap().len(), 1);
        assert!(body["exportedAt"].is_string());
    }

    #[tokio::test]
    async fn export_unknown_project_is_404() {
        let (server, _dir) = test_server();
        server.get("/projects/nope/export").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn import_round_trip_conflict_and_replace() {
        let (source, _a) = test_server();
        let pid = create_project(&source, "Tank A").await;
        create_record(
            &source,
            &pid,
            "fertilizers",
            json!({
                "name": "Dennerle NPK Booster", "type": "macro",
                "recommendedDose": "1 ml/day", "schedule": "daily", "targetEffect": "NO3"
            }),
        )
        .await;
        let exported = source.get(&format!("/projects/{pid}/export")).await.text();

        let (dest, _b) = test_server();
        let resp = dest.post("/import").text(exported.clone()).await;
        resp.assert_status(StatusCode::CREATED);
        let new_pid = resp.json::<Value>()["projectId"].as_str().unwrap().to_owned();

        let ferts: Vec<Value> = dest
            .get(&format!("/projects/{new_pid}/records/fertilizers"))
            .await
            .json();
        assert_eq!(ferts.len(), 1);
        assert_eq!(ferts[0]["projectId"], new_pid.as_str());

        let resp = dest.post("/import").text(exported.clone()).await;
        resp.assert_status(StatusCode::CONFLICT);

        let resp = dest
            .post("/import")
            .add_query_param("replace", true)
            .text(exported)
            .await;
        resp.assert_status(StatusCode::CREATED);
        assert_eq!(resp.json::<Value>()["projectId"], new_pid.as_str());

        let ferts: Vec<Value> = dest
            .get(&format!("/projects/{new_pid}/records/fertilizers"))
            .await
            .json();
        assert_eq!(ferts.len(), 1);
    }

    #[tokio::test]
    async fn malformed_import_is_400() {
        let (server, _dir) = test_server();
        let resp = server.post("/import").text("{ not json").await;
        resp.assert_status(StatusCode::BAD_REQUEST);
        assert!(resp.json::<Value>()["error"].as_str().unwrap().contains("malformed"));
        assert!(server.get("/projects").await.json::<Vec<Value>>().is_empty());
    }

    #[tokio::test]
    async fn seed_runs_once() {
        let (server, _dir) = test_server();

        let first: Value = server.post("/seed").await.json();
        assert!(first["projectId"].is_string());

        let second: Value = server.post("/seed").await.json();
        assert!(second["projectId"].is_null());
    }

    // -----------------------------------------------------------------------
    // Planner and targets
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn planner_week_buckets() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;
        create_record(
            &server,
            &pid,
            "actions",
            json!({ "type": "waterChange", "date": "2024-05-13T09:00:00Z", "done": true }),
        )
        .await;

        let resp = server
            .get(&format!("/projects/{pid}/planner"))
            .add_query_param("view", "week")
            .add_query_param("date", "2024-05-15")
            .await;
        resp.assert_status_ok();
        let buckets: Vec<Value> = resp.json();
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0]["start"], "2024-05-12");
        assert_eq!(buckets[1]["total"], 1);
        assert_eq!(buckets[1]["completed"], 1);
    }

    #[tokio::test]
    async fn upcoming_lists_open_future_actions() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;
        for (date, done) in [
            ("2000-01-01T00:00:00Z", false),
            ("2999-01-02T00:00:00Z", false),
            ("2999-01-01T00:00:00Z", false),
            ("2999-01-03T00:00:00Z", true),
        ] {
            create_record(
                &server,
                &pid,
                "actions",
                json!({ "type": "co2Check", "date": date, "done": done }),
            )
            .await;
        }

        let actions: Vec<Value> = server
            .get(&format!("/projects/{pid}/planner/upcoming"))
            .await
            .json();
        let dates: Vec<&str> = actions.iter().map(|a| a["date"].as_str().unwrap()).collect();
        assert_eq!(dates, ["2999-01-01T00:00:00Z", "2999-01-02T00:00:00Z"]);
    }

    #[tokio::test]
    async fn target_status_after_seed() {
        let (server, _dir) = test_server();
        let seeded: Value = server.post("/seed").await.json();
        let pid = seeded["projectId"].as_str().unwrap().to_owned();
        create_record(
            &server,
            &pid,
            "measurements",
            json!({ "param": "NO3", "value": 25, "unit": "ppm", "date": "2024-05-02T10:00:00Z" }),
        )
        .await;

        let report: Vec<Value> = server
            .get(&format!("/projects/{pid}/targets/status"))
            .await
            .json();
        assert_eq!(report.len(), 4);

        let status_of = |param: &str| {
            report
                .iter()
                .find(|s| s["target"]["param"] == param)
                .map(|s| s["status"].clone())
                .unwrap()
        };
        assert_eq!(status_of("NO3"), "above");
        assert_eq!(status_of("Fe"), "noData");
    }

    #[tokio::test]
    async fn measurement_series_by_param() {
        let (server, _dir) = test_server();
        let pid = create_project(&server, "Tank").await;
        for (param, value, date) in [
            ("NO₃", 14.0, "2024-05-09T10:00:00Z"),
            ("PO4", 0.8, "2024-05-05T10:00:00Z"),
            ("NO₃", 11.0, "2024-05-02T10:00:00Z"),
        ] {
            create_record(
                &server,
                &pid,
                "measurements",
                json!({ "param": param, "value": value, "unit": "ppm", "date": date }),
            )
            .await;
        }

        let resp = server
            .get(&format!("/projects/{pid}/measurements/series"))
            .add_query_param("param", "NO₃")
            .await;
        resp.assert_status_ok();
        let series: Vec<Value> = resp.json();
        let values: Vec<f64> = series.iter().map(|p| p["value"].as_f64().unwrap()).collect();
        assert_eq!(values, [11.0, 14.0]);

        server
            .get(&format!("/projects/{pid}/measurements/series"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .get("/projects/missing/measurements/series")
            .add_query_param("param", "NO3")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
