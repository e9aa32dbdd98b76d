pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{object_store::ObjectStorage, store::RecordRepository};
use handlers::ApiDoc;

/// Photo uploads arrive as a single raw body.
const MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn RecordRepository>,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(repo: Arc<dyn RecordRepository>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { repo, storage }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/projects/{project_id}",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route(
            "/projects/{project_id}/records/{collection}",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/records/{collection}/{id}",
            patch(handlers::update_record).delete(handlers::delete_record),
        )
        .route("/projects/{project_id}/photos", post(handlers::upload_photo))
        .route("/projects/{project_id}/export", get(handlers::export_project))
        .route("/import", post(handlers::import_project))
        .route("/seed", post(handlers::seed_default_data))
        .route("/projects/{project_id}/planner", get(handlers::get_planner))
        .route(
            "/projects/{project_id}/planner/upcoming",
            get(handlers::get_upcoming_actions),
        )
        .route(
            "/projects/{project_id}/targets/status",
            get(handlers::get_target_status),
        )
        .route(
            "/projects/{project_id}/measurements/series",
            get(handlers::get_measurement_series),
        )
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
