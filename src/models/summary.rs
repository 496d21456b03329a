// Composed read-path output: timelines, per-entity summaries, the overview.

use serde::{Deserialize, Serialize};

/// One chart point, floored to its minute. At most one point per minute per
/// entity; later-processed samples win within a minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    /// Minute boundary (epoch seconds, multiple of 60).
    pub timestamp: i64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_mb: f64,
    pub memory_used_mb: f64,
}

/// Per-entity rollup returned to callers. Recomputed on every query; never
/// persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub entity_id: String,
    pub total_points: usize,
    pub current_cpu: f64,
    pub current_memory: f64,
    pub avg_cpu: f64,
    pub avg_memory: f64,
    pub max_cpu: f64,
    pub max_memory: f64,
    pub first_seen: Option<f64>,
    /// 0.0 when the entity has no data.
    pub last_seen: f64,
    pub is_online: bool,
    /// Set when part of the window could not be read (failed scan units,
    /// query timeout). Partial data is preferred over no data.
    pub degraded: bool,
    /// Records skipped by the decoder within this window.
    pub dropped_records: u64,
    pub timeline: Vec<TimelinePoint>,
}

impl EntitySummary {
    /// Zeroed summary for an entity with no readable data.
    pub fn empty(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            total_points: 0,
            current_cpu: 0.0,
            current_memory: 0.0,
            avg_cpu: 0.0,
            avg_memory: 0.0,
            max_cpu: 0.0,
            max_memory: 0.0,
            first_seen: None,
            last_seen: 0.0,
            is_online: false,
            degraded: false,
            dropped_records: 0,
            timeline: vec![],
        }
    }
}

/// Dashboard overview across the known entity set, ordered by recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub total_entities: usize,
    pub total_points: usize,
    pub summaries: Vec<EntitySummary>,
}
