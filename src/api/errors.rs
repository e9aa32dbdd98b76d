use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{
    db::models::ValidationError,
    object_store::StorageError,
    photos::PhotoError,
    snapshot::{ImportReport, SnapshotError},
    store::RepositoryError,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("import into project {} failed; rolled back: {}", .0.project_id, .0.rolled_back)]
    PartialImport(ImportReport),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PartialImport(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = match &self {
            AppError::PartialImport(report) => {
                json!({ "error": self.to_string(), "report": report })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Missing { .. } => AppError::NotFound(e.to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<SnapshotError> for AppError {
    fn from(e: SnapshotError) -> Self {
        match e {
            SnapshotError::NotFound(_) => AppError::NotFound(e.to_string()),
            SnapshotError::Conflict(_) => AppError::Conflict(e.to_string()),
            SnapshotError::Decode(_) => AppError::BadRequest(e.to_string()),
            SnapshotError::PartialImport(report) => AppError::PartialImport(report),
            SnapshotError::Repository(inner) => inner.into(),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidPath(_) => AppError::BadRequest(e.to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<PhotoError> for AppError {
    fn from(e: PhotoError) -> Self {
        match e {
            PhotoError::NotFound(_) => AppError::NotFound(e.to_string()),
            PhotoError::Storage(inner) => inner.into(),
            PhotoError::Repository(inner) => inner.into(),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}
