use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::{Collection, Document};

/// Opaque record identifier assigned by the store.
pub type RecordId = String;

/// A record kind living in one [`Collection`].
///
/// Identifiers travel inside the records (`id`) so snapshots can carry them,
/// but the store never trusts them: `store::encode` drops `id` and `create`
/// assigns a fresh one.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: RecordId);

    /// `None` only for projects.
    fn project_id(&self) -> Option<&str>;

    /// Range checks that the wire format alone cannot express.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be within 0..=100, got {value}")]
    PercentOutOfRange { field: &'static str, value: f64 },

    #[error("{kind} devices cannot carry lamp channels")]
    ChannelsOnNonLamp { kind: DeviceType },
}

pub(crate) fn check_percent(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::PercentOutOfRange { field, value })
    }
}

macro_rules! owned_entity {
    ($ty:ty, $collection:expr) => {
        impl Entity for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> &str {
                &self.id
            }

            fn set_id(&mut self, id: RecordId) {
                self.id = id;
            }

            fn project_id(&self) -> Option<&str> {
                Some(self.project_id.as_str())
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Project {
    const COLLECTION: Collection = Collection::Projects;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn project_id(&self) -> Option<&str> {
        None
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Lamp,
    Filter,
    Co2,
    Heater,
    Other,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceType::Lamp => "lamp",
            DeviceType::Filter => "filter",
            DeviceType::Co2 => "co2",
            DeviceType::Heater => "heater",
            DeviceType::Other => "other",
        };
        f.write_str(s)
    }
}

/// Settings meaningful for every device type. Keys not modelled here are
/// kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Equipment {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub intensity_percent: Option<f64>,
    pub extra: Document,
}

/// Per-channel output levels, each `0..=100`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Channels {
    #[serde(rename = "W", default, skip_serializing_if = "Option::is_none")]
    pub w: Option<f64>,
    #[serde(rename = "R", default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(rename = "G", default, skip_serializing_if = "Option::is_none")]
    pub g: Option<f64>,
    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LampSettings {
    pub equipment: Equipment,
    pub channels: Option<Channels>,
}

/// Type-specific device configuration. Only lamps carry channel levels.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceConfig {
    Lamp(LampSettings),
    Filter(Equipment),
    Co2(Equipment),
    Heater(Equipment),
    Other(Equipment),
}

impl DeviceConfig {
    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceConfig::Lamp(_) => DeviceType::Lamp,
            DeviceConfig::Filter(_) => DeviceType::Filter,
            DeviceConfig::Co2(_) => DeviceType::Co2,
            DeviceConfig::Heater(_) => DeviceType::Heater,
            DeviceConfig::Other(_) => DeviceType::Other,
        }
    }

    pub fn equipment(&self) -> &Equipment {
        match self {
            DeviceConfig::Lamp(lamp) => &lamp.equipment,
            DeviceConfig::Filter(e)
            | DeviceConfig::Co2(e)
            | DeviceConfig::Heater(e)
            | DeviceConfig::Other(e) => e,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DeviceRecord", into = "DeviceRecord")]
pub struct Device {
    pub id: RecordId,
    pub project_id: RecordId,
    pub name: String,
    pub config: DeviceConfig,
    pub created_at: Option<DateTime<Utc>>,
}

owned_entity!(Device, Collection::Devices);

/// Wire layout of a device: a `type` tag plus one optional settings bag.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    #[serde(rename = "type")]
    pub kind: DeviceType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub settings: Option<DeviceSettingsRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSettingsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<Channels>,
    #[serde(flatten)]
    pub extra: Document,
}

impl TryFrom<DeviceRecord> for Device {
    type Error = ValidationError;

    fn try_from(raw: DeviceRecord) -> Result<Self, Self::Error> {
        let settings = raw.settings.unwrap_or_default();
        let equipment = Equipment {
            brand: settings.brand,
            model: settings.model,
            intensity_percent: settings.intensity_percent,
            extra: settings.extra,
        };

        let config = match (raw.kind, settings.channels) {
            (DeviceType::Lamp, channels) => DeviceConfig::Lamp(LampSettings { equipment, channels }),
            (kind, Some(_)) => return Err(ValidationError::ChannelsOnNonLamp { kind }),
            (DeviceType::Filter, None) => DeviceConfig::Filter(equipment),
            (DeviceType::Co2, None) => DeviceConfig::Co2(equipment),
            (DeviceType::Heater, None) => DeviceConfig::Heater(equipment),
            (DeviceType::Other, None) => DeviceConfig::Other(equipment),
        };

        let device = Device {
            id: raw.id,
            project_id: raw.project_id,
            name: raw.name,
            config,
            created_at: raw.created_at,
        };
        device.validate_settings()?;
        Ok(device)
    }
}

impl From<Device> for DeviceRecord {
    fn from(device: Device) -> Self {
        let kind = device.config.device_type();
        let (equipment, channels) = match device.config {
            DeviceConfig::Lamp(lamp) => (lamp.equipment, lamp.channels),
            DeviceConfig::Filter(e)
            | DeviceConfig::Co2(e)
            | DeviceConfig::Heater(e)
            | DeviceConfig::Other(e) => (e, None),
        };
        let settings = DeviceSettingsRecord {
            brand: equipment.brand,
            model: equipment.model,
            intensity_percent: equipment.intensity_percent,
            channels,
            extra: equipment.extra,
        };

        DeviceRecord {
            id: device.id,
            project_id: device.project_id,
            kind,
            name: device.name,
            settings: (settings != DeviceSettingsRecord::default()).then_some(settings),
            created_at: device.created_at,
        }
    }
}

impl Device {
    fn validate_settings(&self) -> Result<(), ValidationError> {
        if let Some(v) = self.config.equipment().intensity_percent {
            check_percent("intensityPercent", v)?;
        }
        if let DeviceConfig::Lamp(LampSettings { channels: Some(ch), .. }) = &self.config {
            for (field, value) in [("W", ch.w), ("R", ch.r), ("G", ch.g), ("B", ch.b)] {
                if let Some(v) = value {
                    check_percent(field, v)?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Targets and measurements
// ---------------------------------------------------------------------------

/// A water parameter that can be targeted and measured. The common
/// chemistry names have their own variant; any other label (`"NO₃"`,
/// `"Ammonia"`) is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetParam {
    No3,
    Po4,
    K,
    Fe,
    Ph,
    Kh,
    Gh,
    Temp,
    Co2,
    LightIntensity,
    Other(String),
}

impl TargetParam {
    pub fn as_str(&self) -> &str {
        match self {
            TargetParam::No3 => "NO3",
            TargetParam::Po4 => "PO4",
            TargetParam::K => "K",
            TargetParam::Fe => "Fe",
            TargetParam::Ph => "pH",
            TargetParam::Kh => "KH",
            TargetParam::Gh => "GH",
            TargetParam::Temp => "Temp",
            TargetParam::Co2 => "CO2",
            TargetParam::LightIntensity => "LightIntensity",
            TargetParam::Other(label) => label.as_str(),
        }
    }
}

impl From<String> for TargetParam {
    fn from(label: String) -> Self {
        match label.as_str() {
            "NO3" => TargetParam::No3,
            "PO4" => TargetParam::Po4,
            "K" => TargetParam::K,
            "Fe" => TargetParam::Fe,
            "pH" => TargetParam::Ph,
            "KH" => TargetParam::Kh,
            "GH" => TargetParam::Gh,
            "Temp" => TargetParam::Temp,
            "CO2" => TargetParam::Co2,
            "LightIntensity" => TargetParam::LightIntensity,
            _ => TargetParam::Other(label),
        }
    }
}

impl From<TargetParam> for String {
    fn from(param: TargetParam) -> Self {
        match param {
            TargetParam::Other(label) => label,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for TargetParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    #[schema(value_type = String)]
    pub param: TargetParam,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

owned_entity!(Target, Collection::Targets);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    #[schema(value_type = String)]
    pub param: TargetParam,
    pub value: f64,
    pub unit: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

owned_entity!(Measurement, Collection::Measurements);

// ---------------------------------------------------------------------------
// Fertilization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FertilizerType {
    Macro,
    Micro,
    Iron,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fertilizer {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FertilizerType,
    /// Free text, e.g. `"1–1.5 ml/day"`.
    pub recommended_dose: String,
    pub schedule: Schedule,
    pub target_effect: String,
}

owned_entity!(Fertilizer, Collection::Fertilizers);

/// One application of a [`Fertilizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoseLog {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    pub fertilizer_id: RecordId,
    pub date: DateTime<Utc>,
    pub amount_ml: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

owned_entity!(DoseLog, Collection::DoseLogs);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WaterChange {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    pub date: DateTime<Utc>,
    pub percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for WaterChange {
    const COLLECTION: Collection = Collection::WaterChanges;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }

    fn project_id(&self) -> Option<&str> {
        Some(self.project_id.as_str())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        check_percent("percent", self.percent)
    }
}

// ---------------------------------------------------------------------------
// Planner, photos, reminders
// ---------------------------------------------------------------------------

/// What an [`Action`] is about. Free-text task names (`"Water change"`)
/// land in `Custom` and keep their spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    Fertilization,
    WaterChange,
    Pruning,
    GlassCleaning,
    FilterMaintenance,
    Co2Check,
    LightingAdjust,
    Other,
    Custom(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Fertilization => "fertilization",
            ActionType::WaterChange => "waterChange",
            ActionType::Pruning => "pruning",
            ActionType::GlassCleaning => "glassCleaning",
            ActionType::FilterMaintenance => "filterMaintenance",
            ActionType::Co2Check => "co2Check",
            ActionType::LightingAdjust => "lightingAdjust",
            ActionType::Other => "other",
            ActionType::Custom(name) => name.as_str(),
        }
    }
}

impl From<String> for ActionType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "fertilization" => ActionType::Fertilization,
            "waterChange" => ActionType::WaterChange,
            "pruning" => ActionType::Pruning,
            "glassCleaning" => ActionType::GlassCleaning,
            "filterMaintenance" => ActionType::FilterMaintenance,
            "co2Check" => ActionType::Co2Check,
            "lightingAdjust" => ActionType::LightingAdjust,
            "other" => ActionType::Other,
            _ => ActionType::Custom(name),
        }
    }
}

impl From<ActionType> for String {
    fn from(kind: ActionType) -> Self {
        match kind {
            ActionType::Custom(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

/// A schedulable unit of work. `done` is its only status field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub kind: ActionType,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

owned_entity!(Action, Collection::Actions);

/// `url` points at the stored image; see `photos::remove_photo` for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    pub url: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

owned_entity!(Photo, Collection::Photos);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(default)]
    pub id: RecordId,
    #[serde(default)]
    pub project_id: RecordId,
    pub title: String,
    pub cadence: Cadence,
    pub next_due_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_done_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist: Option<Vec<String>>,
}

owned_entity!(Reminder, Collection::Reminders);
