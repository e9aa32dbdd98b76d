use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::error::Category;
use tokio::fs;
use tracing::{debug, info};

use super::{Snapshot, SnapshotError};

/// Pretty-printed JSON, the format users download and upload.
pub fn encode(snapshot: &Snapshot) -> Result<String, SnapshotError> {
    serde_json::to_string_pretty(snapshot).map_err(SnapshotError::Encode)
}

/// Parse and validate a snapshot document.
pub fn decode(text: &str) -> Result<Snapshot, SnapshotError> {
    let snapshot: Snapshot = serde_json::from_str(text).map_err(|e| {
        let what = match e.classify() {
            Category::Syntax | Category::Eof => "not well-formed JSON",
            Category::Data => "does not match the snapshot shape",
            Category::Io => "could not be read",
        };
        SnapshotError::Decode(format!("{what}: {e}"))
    })?;

    snapshot
        .validate()
        .map_err(|e| SnapshotError::Decode(e.to_string()))?;
    Ok(snapshot)
}

/// `aquarium-export-<projectId>-<unixMillis>.json`
pub fn export_file_name(project_id: &str, at: DateTime<Utc>) -> String {
    format!("aquarium-export-{project_id}-{}.json", at.timestamp_millis())
}

/// Write `snapshot` into `dir` under its export file name and return the path.
pub async fn save_to_dir(snapshot: &Snapshot, dir: &Path) -> Result<PathBuf, SnapshotError> {
    let json = encode(snapshot)?;
    let path = dir.join(export_file_name(&snapshot.project.id, Utc::now()));

    fs::create_dir_all(dir)
        .await
        .map_err(|source| SnapshotError::Io { path: dir.to_owned(), source })?;
    fs::write(&path, json.as_bytes())
        .await
        .map_err(|source| SnapshotError::Io { path: path.clone(), source })?;

    info!(path = %path.display(), bytes = json.len(), "Snapshot saved");
    Ok(path)
}

/// Read a whole snapshot file and decode it.
pub async fn load_from_file(path: &Path) -> Result<Snapshot, SnapshotError> {
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| SnapshotError::Io { path: path.to_owned(), source })?;
    debug!(path = %path.display(), bytes = text.len(), "Snapshot file read");
    decode(&text)
}
