use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    db::models::Photo,
    object_store::{photo_object_path, ObjectStorage, StorageError},
    store::{self, Collection, RecordRepository, RepositoryError},
};

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("photo {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Upload `bytes` and record them as a photo of `project_id`.
///
/// If the record cannot be written the uploaded object is removed again.
pub async fn upload_photo(
    repo: &dyn RecordRepository,
    storage: &dyn ObjectStorage,
    project_id: &str,
    file_name: &str,
    bytes: &[u8],
    date: DateTime<Utc>,
    notes: Option<String>,
) -> Result<Photo, PhotoError> {
    let path = photo_object_path(project_id, file_name, Utc::now());
    let url = storage.upload(bytes, &path).await?;

    let mut photo = Photo {
        id: String::new(),
        project_id: project_id.to_owned(),
        url,
        date,
        notes,
    };

    match store::insert(repo, &photo).await {
        Ok(id) => photo.id = id,
        Err(e) => {
            if let Err(cleanup) = storage.delete_by_url(&photo.url).await {
                warn!(url = %photo.url, error = %cleanup, "Failed to remove orphaned photo object");
            }
            return Err(e.into());
        }
    }

    info!(project_id = %project_id, photo_id = %photo.id, bytes = bytes.len(), "Photo uploaded");
    Ok(photo)
}

/// Delete a photo record and, best-effort, the object behind it.
///
/// A storage failure is logged and does not keep the record alive.
pub async fn remove_photo(
    repo: &dyn RecordRepository,
    storage: &dyn ObjectStorage,
    photo_id: &str,
) -> Result<(), PhotoError> {
    let photo = store::fetch::<Photo>(repo, photo_id)
        .await?
        .ok_or_else(|| PhotoError::NotFound(photo_id.to_owned()))?;

    if let Err(e) = storage.delete_by_url(&photo.url).await {
        warn!(photo_id = %photo_id, url = %photo.url, error = %e, "Photo object not deleted");
    }

    repo.delete(Collection::Photos, photo_id).await?;
    info!(photo_id = %photo_id, "Photo removed");
    Ok(())
}
