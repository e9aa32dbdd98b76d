//! Whole-project snapshots: gather every record a project owns into one
//! document, write it out as JSON, and replay it into a store.

pub mod builder;
pub mod codec;
pub mod importer;

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    db::models::{
        Action, Device, DeviceRecord, DoseLog, Entity, Fertilizer, Measurement, Photo, Project,
        Reminder, Target, ValidationError, WaterChange,
    },
    store::{Collection, RepositoryError},
};

pub use builder::build_snapshot;
pub use importer::{import_snapshot, ImportPlan, ImportReport};

/// A project and everything it owns, as exported.
///
/// Record identifiers are kept so the document is a faithful copy, but they
/// are discarded on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub project: Project,
    #[schema(value_type = Vec<DeviceRecord>)]
    pub devices: Vec<Device>,
    pub targets: Vec<Target>,
    pub fertilizers: Vec<Fertilizer>,
    pub measurements: Vec<Measurement>,
    pub dose_logs: Vec<DoseLog>,
    pub water_changes: Vec<WaterChange>,
    pub actions: Vec<Action>,
    pub photos: Vec<Photo>,
    pub reminders: Vec<Reminder>,
    pub exported_at: DateTime<Utc>,
}

impl Snapshot {
    /// Number of records per dependent collection.
    pub fn record_counts(&self) -> BTreeMap<Collection, usize> {
        BTreeMap::from([
            (Collection::Devices, self.devices.len()),
            (Collection::Targets, self.targets.len()),
            (Collection::Fertilizers, self.fertilizers.len()),
            (Collection::Measurements, self.measurements.len()),
            (Collection::DoseLogs, self.dose_logs.len()),
            (Collection::WaterChanges, self.water_changes.len()),
            (Collection::Actions, self.actions.len()),
            (Collection::Photos, self.photos.len()),
            (Collection::Reminders, self.reminders.len()),
        ])
    }

    pub fn record_count(&self) -> usize {
        self.record_counts().values().sum()
    }

    /// Run every record's own range checks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        fn all<T: Entity>(records: &[T]) -> Result<(), ValidationError> {
            records.iter().try_for_each(Entity::validate)
        }

        self.project.validate()?;
        all(&self.devices)?;
        all(&self.targets)?;
        all(&self.fertilizers)?;
        all(&self.measurements)?;
        all(&self.dose_logs)?;
        all(&self.water_changes)?;
        all(&self.actions)?;
        all(&self.photos)?;
        all(&self.reminders)
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("project {0} not found")]
    NotFound(String),

    #[error("project with name {0:?} already exists; use replace mode to overwrite")]
    Conflict(String),

    #[error("malformed snapshot: {0}")]
    Decode(String),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("snapshot file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(
        "import into project {} stopped after {} failed operation(s)",
        .0.project_id,
        .0.failures.len()
    )]
    PartialImport(ImportReport),
}
