use chrono::Utc;
use tracing::{debug, info};

use super::{Snapshot, SnapshotError};
use crate::{
    db::models::{
        Action, Device, DoseLog, Fertilizer, Measurement, Photo, Project, Reminder, Target,
        WaterChange,
    },
    store::{self, RecordRepository},
};

/// Gather `project_id` and all nine dependent collections into one snapshot.
///
/// The ten reads are issued together; the project's existence is checked only
/// once they have all returned. `exported_at` is stamped after assembly.
pub async fn build_snapshot(
    repo: &dyn RecordRepository,
    project_id: &str,
) -> Result<Snapshot, SnapshotError> {
    debug!(project_id = %project_id, "Building snapshot");

    let (
        project,
        devices,
        targets,
        fertilizers,
        measurements,
        dose_logs,
        water_changes,
        actions,
        photos,
        reminders,
    ) = tokio::try_join!(
        store::fetch::<Project>(repo, project_id),
        store::list_all::<Device>(repo, Some(project_id)),
        store::list_all::<Target>(repo, Some(project_id)),
        store::list_all::<Fertilizer>(repo, Some(project_id)),
        store::list_all::<Measurement>(repo, Some(project_id)),
        store::list_all::<DoseLog>(repo, Some(project_id)),
        store::list_all::<WaterChange>(repo, Some(project_id)),
        store::list_all::<Action>(repo, Some(project_id)),
        store::list_all::<Photo>(repo, Some(project_id)),
        store::list_all::<Reminder>(repo, Some(project_id)),
    )?;

    let project = project.ok_or_else(|| SnapshotError::NotFound(project_id.to_owned()))?;

    let snapshot = Snapshot {
        project,
        devices,
        targets,
        fertilizers,
        measurements,
        dose_logs,
        water_changes,
        actions,
        photos,
        reminders,
        exported_at: Utc::now(),
    };

    info!(
        project_id = %project_id,
        records = snapshot.record_count(),
        "Snapshot built"
    );
    Ok(snapshot)
}
