//! Demo project loaded into an empty store.

use chrono::Utc;
use tracing::info;

use crate::{
    db::models::{
        Channels, Device, DeviceConfig, Equipment, Fertilizer, FertilizerType, LampSettings,
        Project, Schedule, Target, TargetParam,
    },
    store::{self, RecordRepository, RepositoryError},
};

const TARGETS: [(TargetParam, f64, f64); 4] = [
    (TargetParam::No3, 10.0, 20.0),
    (TargetParam::Po4, 0.5, 1.0),
    (TargetParam::K, 10.0, 15.0),
    (TargetParam::Fe, 0.05, 0.1),
];

const FERTILIZERS: [(&str, FertilizerType, &str, Schedule, &str); 4] = [
    (
        "Dennerle NPK Booster",
        FertilizerType::Macro,
        "1–1.5 ml/day",
        Schedule::Daily,
        "NO3 10–20 ppm, PO4 0.5–1 ppm, K 10–15 ppm",
    ),
    (
        "Dennerle Scaper's Green",
        FertilizerType::Micro,
        "0.5 ml/day",
        Schedule::Daily,
        "Fe ≈ 0.05 ppm, trace elements",
    ),
    (
        "Dennerle V30 Complete",
        FertilizerType::Micro,
        "3 ml/week",
        Schedule::Weekly,
        "Replenish micro/trace after water change",
    ),
    (
        "Dennerle E15 FerActiv",
        FertilizerType::Iron,
        "½ tablet / 2 weeks",
        Schedule::Biweekly,
        "Iron boost for red plants",
    ),
];

/// Create the "Aquarium" demo project with a lamp, four nutrient targets and
/// four fertilizers. Does nothing and returns `None` if any project exists.
pub async fn preload_default_data(
    repo: &dyn RecordRepository,
) -> Result<Option<String>, RepositoryError> {
    if !store::list_all::<Project>(repo, None).await?.is_empty() {
        info!("Projects already exist, skipping seed data");
        return Ok(None);
    }

    let now = Utc::now();
    let project_id = store::insert(
        repo,
        &Project {
            id: String::new(),
            name: "Aquarium".into(),
            description: Some("Main tank".into()),
            created_at: now,
        },
    )
    .await?;

    let lamp = Device {
        id: String::new(),
        project_id: project_id.clone(),
        name: "Chihiros WRGB II Pro 60".into(),
        config: DeviceConfig::Lamp(LampSettings {
            equipment: Equipment {
                brand: Some("Chihiros".into()),
                model: Some("WRGB II Pro 60".into()),
                intensity_percent: Some(70.0),
                extra: Default::default(),
            },
            channels: Some(Channels {
                w: Some(50.0),
                r: Some(90.0),
                g: Some(65.0),
                b: Some(70.0),
            }),
        }),
        created_at: Some(now),
    };
    store::insert(repo, &lamp).await?;

    for (param, min, max) in TARGETS {
        let target = Target {
            id: String::new(),
            project_id: project_id.clone(),
            param,
            min: Some(min),
            max: Some(max),
            unit: "ppm".into(),
            notes: None,
        };
        store::insert(repo, &target).await?;
    }

    for (name, kind, dose, schedule, effect) in FERTILIZERS {
        let fertilizer = Fertilizer {
            id: String::new(),
            project_id: project_id.clone(),
            name: name.into(),
            kind,
            recommended_dose: dose.into(),
            schedule,
            target_effect: effect.into(),
        };
        store::insert(repo, &fertilizer).await?;
    }

    info!(project_id = %project_id, "Preloaded default data");
    Ok(Some(project_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;

    #[tokio::test]
    async fn seeds_an_empty_store() {
        let repo = MemoryRepository::new();

        let pid = preload_default_data(&repo).await.unwrap().unwrap();

        let projects = store::list_all::<Project>(&repo, None).await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Aquarium");
        assert_eq!(projects[0].description.as_deref(), Some("Main tank"));

        let devices = store::list_all::<Device>(&repo, Some(pid.as_str())).await.unwrap();
        let [lamp] = devices.as_slice() else {
            panic!("expected one device, got {devices:?}");
        };
        let DeviceConfig::Lamp(settings) = &lamp.config else {
            panic!("seeded device should be a lamp");
        };
        assert_eq!(settings.equipment.intensity_percent, Some(70.0));
        assert_eq!(settings.channels.as_ref().and_then(|c| c.g), Some(65.0));

        let targets = store::list_all::<Target>(&repo, Some(pid.as_str())).await.unwrap();
        assert_eq!(targets.len(), 4);
        let fe = targets.iter().find(|t| t.param == TargetParam::Fe).unwrap();
        assert_eq!((fe.min, fe.max), (Some(0.05), Some(0.1)));

        let fertilizers = store::list_all::<Fertilizer>(&repo, Some(pid.as_str())).await.unwrap();
        let names: Vec<_> = fertilizers.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Dennerle E15 FerActiv",
                "Dennerle NPK Booster",
                "Dennerle Scaper's Green",
                "Dennerle V30 Complete",
            ]
        );
    }

    #[tokio::test]
    async fn skips_when_a_project_exists() {
        let repo = MemoryRepository::new();
        preload_default_data(&repo).await.unwrap();
        let before = repo.dump().await;

        assert_eq!(preload_default_data(&repo).await.unwrap(), None);
        assert_eq!(repo.dump().await, before);
    }
}
