//! Replays a [`Snapshot`] into a record store.
//!
//! Import runs in two phases. [`plan`] only reads: it resolves the name
//! collision, lists what replace mode would delete, and encodes every record
//! that will be created. [`execute`] then applies the plan: all deletes
//! concurrently, and only if every delete succeeded, all creates
//! concurrently. When a create fails, the records created in this run (and the
//! project, if this run created it) are deleted again and the caller gets an
//! [`ImportReport`] listing every failed operation. Records removed by the
//! delete phase are not restored.
//!
//! Cross-record references such as `DoseLog::fertilizer_id` are copied as-is;
//! they keep pointing at the identifiers from the exported store.
//!
//! Devices are stamped with the import time as `createdAt`, whether or not the
//! file carries one; the exported value is discarded. The web app's own
//! importer keeps it, so a file round-tripped through this service loses the
//! original device creation times. Every other record keeps its timestamps.

use std::path::Path;

use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::{codec, Snapshot, SnapshotError};
use crate::{
    db::models::{Entity, Project},
    store::{self, Collection, Document, RecordRepository, RepositoryError},
};

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Where imported records end up.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectTarget {
    /// Replace mode: reuse the project that already has the snapshot's name.
    Existing(String),
    /// No project of that name exists yet.
    New {
        name: String,
        description: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDelete {
    pub collection: Collection,
    pub id: String,
}

/// A record to create. `projectId` is filled in at execution time, once the
/// project identifier is known.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCreate {
    pub collection: Collection,
    pub fields: Document,
}

#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub target: ProjectTarget,
    pub deletes: Vec<PlannedDelete>,
    pub creates: Vec<PlannedCreate>,
}

/// Build the import plan for `snapshot` without writing anything.
///
/// Fails with [`SnapshotError::Conflict`] when a project with the same name
/// exists and `replace_existing` is false. Names match exactly; if several
/// projects share the name the first one listed wins.
pub async fn plan(
    repo: &dyn RecordRepository,
    snapshot: &Snapshot,
    replace_existing: bool,
) -> Result<ImportPlan, SnapshotError> {
    let name = &snapshot.project.name;
    let existing = store::list_all::<Project>(repo, None)
        .await?
        .into_iter()
        .find(|p| &p.name == name);

    let (target, deletes) = match existing {
        Some(_) if !replace_existing => return Err(SnapshotError::Conflict(name.clone())),
        Some(project) => {
            let deletes = owned_records(repo, &project.id).await?;
            (ProjectTarget::Existing(project.id), deletes)
        }
        None => (
            ProjectTarget::New {
                name: name.clone(),
                description: snapshot.project.description.clone(),
            },
            Vec::new(),
        ),
    };

    let creates = planned_creates(snapshot, Utc::now())?;
    Ok(ImportPlan { target, deletes, creates })
}

/// Every record in the nine dependent collections owned by `project_id`.
async fn owned_records(
    repo: &dyn RecordRepository,
    project_id: &str,
) -> Result<Vec<PlannedDelete>, RepositoryError> {
    let listings = try_join_all(
        Collection::DEPENDENTS
            .iter()
            .map(|&collection| repo.list(collection, Some(project_id), None)),
    )
    .await?;

    Ok(Collection::DEPENDENTS
        .into_iter()
        .zip(listings)
        .flat_map(|(collection, records)| {
            records.into_iter().map(move |r| PlannedDelete { collection, id: r.id })
        })
        .collect())
}

fn planned_creates(
    snapshot: &Snapshot,
    imported_at: DateTime<Utc>,
) -> Result<Vec<PlannedCreate>, SnapshotError> {
    fn push<T: Entity>(out: &mut Vec<PlannedCreate>, records: &[T]) -> Result<(), SnapshotError> {
        for record in records {
            let fields = store::encode(record).map_err(SnapshotError::Encode)?;
            out.push(PlannedCreate { collection: T::COLLECTION, fields });
        }
        Ok(())
    }

    let mut creates = Vec::with_capacity(snapshot.record_count());
    push(&mut creates, &snapshot.devices)?;
    push(&mut creates, &snapshot.targets)?;
    push(&mut creates, &snapshot.fertilizers)?;
    push(&mut creates, &snapshot.measurements)?;
    push(&mut creates, &snapshot.dose_logs)?;
    push(&mut creates, &snapshot.water_changes)?;
    push(&mut creates, &snapshot.actions)?;
    push(&mut creates, &snapshot.photos)?;
    push(&mut creates, &snapshot.reminders)?;

    // Devices get a fresh creation time rather than the exported one.
    for create in creates.iter_mut().filter(|c| c.collection == Collection::Devices) {
        create.fields.insert("createdAt".to_owned(), json!(imported_at));
    }
    Ok(creates)
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum ImportPhase {
    Delete,
    Create,
    Rollback,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    pub phase: ImportPhase,
    pub collection: Collection,
    /// Absent for creates, which never received an identifier.
    pub id: Option<String>,
    pub error: String,
}

/// Outcome of an import that did not complete.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub project_id: String,
    pub deleted: usize,
    pub created: usize,
    pub failures: Vec<OperationFailure>,
    /// True when every record created by this run was removed again.
    pub rolled_back: bool,
}

impl ImportReport {
    fn new(project_id: &str) -> Self {
        Self {
            project_id: project_id.to_owned(),
            deleted: 0,
            created: 0,
            failures: Vec::new(),
            rolled_back: false,
        }
    }

    fn fail(
        &mut self,
        phase: ImportPhase,
        collection: Collection,
        id: Option<&str>,
        error: &RepositoryError,
    ) {
        warn!(
            phase = ?phase,
            collection = %collection,
            id = ?id,
            error = %error,
            "Import operation failed"
        );
        self.failures.push(OperationFailure {
            phase,
            collection,
            id: id.map(str::to_owned),
            error: error.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

/// Apply `plan` and return the project identifier the records now belong to.
pub async fn execute(
    repo: &dyn RecordRepository,
    plan: ImportPlan,
) -> Result<String, SnapshotError> {
    let (project_id, created_project) = match plan.target {
        ProjectTarget::Existing(id) => (id, false),
        ProjectTarget::New { name, description } => {
            let project = Project { id: String::new(), name, description, created_at: Utc::now() };
            (store::insert(repo, &project).await?, true)
        }
    };
    let mut report = ImportReport::new(&project_id);

    // Phase 1: clear the replaced project.
    let results = join_all(plan.deletes.iter().map(|d| async move {
        (d, repo.delete(d.collection, &d.id).await)
    }))
    .await;
    for (d, result) in results {
        match result {
            Ok(()) => report.deleted += 1,
            Err(e) => report.fail(ImportPhase::Delete, d.collection, Some(d.id.as_str()), &e),
        }
    }
    if !report.failures.is_empty() {
        return Err(SnapshotError::PartialImport(report));
    }
    debug!(project_id = %project_id, deleted = report.deleted, "Delete phase complete");

    // Phase 2: recreate every snapshot record under the resolved project.
    let owner = Value::String(project_id.clone());
    let results = join_all(plan.creates.into_iter().map(|mut create| {
        create.fields.insert("projectId".to_owned(), owner.clone());
        async move {
            let result = repo.create(create.collection, create.fields).await;
            (create.collection, result)
        }
    }))
    .await;

    let mut created = Vec::new();
    for (collection, result) in results {
        match result {
            Ok(id) => created.push((collection, id)),
            Err(e) => report.fail(ImportPhase::Create, collection, None, &e),
        }
    }
    report.created = created.len();

    if report.failures.is_empty() {
        info!(
            project_id = %project_id,
            deleted = report.deleted,
            created = report.created,
            "Snapshot imported"
        );
        return Ok(project_id);
    }

    rollback(repo, &mut report, created, created_project.then_some(project_id.as_str())).await;
    Err(SnapshotError::PartialImport(report))
}

/// Delete what this run created: records first, then the project.
async fn rollback(
    repo: &dyn RecordRepository,
    report: &mut ImportReport,
    created: Vec<(Collection, String)>,
    created_project: Option<&str>,
) {
    warn!(
        project_id = %report.project_id,
        records = created.len(),
        "Rolling back partial import"
    );
    let before = report.failures.len();

    let results = join_all(created.iter().map(|(collection, id)| async move {
        (*collection, id, repo.delete(*collection, id).await)
    }))
    .await;
    for (collection, id, result) in results {
        if let Err(e) = result {
            report.fail(ImportPhase::Rollback, collection, Some(id.as_str()), &e);
        }
    }

    if let Some(project_id) = created_project {
        if let Err(e) = repo.delete(Collection::Projects, project_id).await {
            report.fail(ImportPhase::Rollback, Collection::Projects, Some(project_id), &e);
        }
    }

    report.rolled_back = report.failures.len() == before;
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Plan and execute an import of `snapshot`.
pub async fn import_snapshot(
    repo: &dyn RecordRepository,
    snapshot: &Snapshot,
    replace_existing: bool,
) -> Result<String, SnapshotError> {
    let plan = plan(repo, snapshot, replace_existing).await?;
    info!(
        project = %snapshot.project.name,
        replace = matches!(plan.target, ProjectTarget::Existing(_)),
        deletes = plan.deletes.len(),
        creates = plan.creates.len(),
        "Import planned"
    );
    execute(repo, plan).await
}

/// Read a snapshot file and import it.
pub async fn import_from_file(
    repo: &dyn RecordRepository,
    path: &Path,
    replace_existing: bool,
) -> Result<String, SnapshotError> {
    let snapshot = codec::load_from_file(path).await?;
    import_snapshot(repo, &snapshot, replace_existing).await
}
