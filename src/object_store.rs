//! Binary object storage for photo uploads.
//!
//! `LocalObjectStorage` writes objects under a root directory and hands out
//! URLs below a public base URL that is expected to serve that directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object storage io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("url {0:?} does not belong to this object storage")]
    ForeignUrl(String),

    #[error("invalid object path {0:?}")]
    InvalidPath(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` and return the URL it is reachable under.
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StorageError>;

    /// Remove the object a previous `upload` returned `url` for.
    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError>;
}

/// `photos/{project_id}/{unix_millis}_{file_name}`
///
/// Only the last component of `file_name` is kept, so client-supplied names
/// cannot escape the project directory.
pub fn photo_object_path(project_id: &str, file_name: &str, at: DateTime<Utc>) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    format!("photos/{project_id}/{}_{base}", at.timestamp_millis())
}

#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Resolve a relative object path below the root, rejecting anything that
    /// would leave it.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if clean {
            Ok(self.root.join(relative))
        } else {
            Err(StorageError::InvalidPath(path.to_owned()))
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String, StorageError> {
        let target = self.resolve(path)?;

        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::Io { path: dir.to_owned(), source })?;
        }
        fs::write(&target, bytes)
            .await
            .map_err(|source| StorageError::Io { path: target.clone(), source })?;

        debug!(path = %target.display(), bytes = bytes.len(), "object_store: saved");
        Ok(format!("{}/{path}", self.public_base_url))
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), StorageError> {
        let path = url
            .strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::ForeignUrl(url.to_owned()))?;
        let target = self.resolve(path)?;

        fs::remove_file(&target)
            .await
            .map_err(|source| StorageError::Io { path: target.clone(), source })?;

        debug!(path = %target.display(), "object_store: deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn photo_path_keeps_only_the_file_name() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(
            photo_object_path("p1", "../../etc/tank.jpg", at),
            "photos/p1/1700000000000_tank.jpg"
        );
        assert_eq!(photo_object_path("p1", "", at), "photos/p1/1700000000000_upload");
    }

    #[tokio::test]
    async fn upload_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "http://cdn.local/files/");

        let url = storage.upload(b"jpeg", "photos/p1/1_a.jpg").await.unwrap();
        assert_eq!(url, "http://cdn.local/files/photos/p1/1_a.jpg");
        let on_disk = dir.path().join("photos/p1/1_a.jpg");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"jpeg");

        storage.delete_by_url(&url).await.unwrap();
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn rejects_paths_leaving_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/files");

        let err = storage.upload(b"x", "../escape.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
        let err = storage.upload(b"x", "/abs.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[tokio::test]
    async fn foreign_urls_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/files");

        let err = storage
            .delete_by_url("https://elsewhere.example/photos/a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ForeignUrl(_)));
    }

    #[tokio::test]
    async fn deleting_a_missing_object_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "/files");

        let err = storage.delete_by_url("/files/photos/gone.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
