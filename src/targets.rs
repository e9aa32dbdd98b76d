use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{Measurement, Target, TargetParam};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum RangeStatus {
    Below,
    InRange,
    Above,
    NoData,
}

/// Where `value` falls relative to the target range. Bounds are inclusive; a
/// missing bound is open.
pub fn evaluate(target: &Target, value: f64) -> RangeStatus {
    match (target.min, target.max) {
        (Some(min), _) if value < min => RangeStatus::Below,
        (_, Some(max)) if value > max => RangeStatus::Above,
        _ => RangeStatus::InRange,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    pub target: Target,
    pub latest: Option<Measurement>,
    pub status: RangeStatus,
}

/// Pair every target with the most recent measurement of its parameter.
pub fn status_report(targets: &[Target], measurements: &[Measurement]) -> Vec<TargetStatus> {
    targets
        .iter()
        .map(|target| {
            let latest = measurements
                .iter()
                .filter(|m| m.param == target.param)
                .max_by_key(|m| m.date)
                .cloned();
            let status = latest
                .as_ref()
                .map_or(RangeStatus::NoData, |m| evaluate(target, m.value));
            TargetStatus { target: target.clone(), latest, status }
        })
        .collect()
}

/// One reading in a parameter's history.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub measurement_id: String,
    pub date: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
}

/// Every measurement of `param`, oldest first. Readings taken at the same
/// instant keep their input order.
pub fn measurement_series(measurements: &[Measurement], param: &TargetParam) -> Vec<SeriesPoint> {
    let mut points: Vec<SeriesPoint> = measurements
        .iter()
        .filter(|m| &m.param == param)
        .map(|m| SeriesPoint {
            measurement_id: m.id.clone(),
            date: m.date,
            value: m.value,
            unit: m.unit.clone(),
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}
