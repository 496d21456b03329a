// One instant's system metrics for an entity.

use serde::{Deserialize, Serialize};
use wincode::{SchemaRead, SchemaWrite};

/// A single decoded metrics sample. Immutable once decoded; timestamps are
/// epoch seconds (fractional).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SchemaRead, SchemaWrite)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub entity_id: String,
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_mb: f64,
    pub memory_used_mb: f64,
    #[serde(default)]
    pub load_avg_1m: Option<f64>,
    #[serde(default)]
    pub load_avg_5m: Option<f64>,
    #[serde(default)]
    pub load_avg_15m: Option<f64>,
}

impl Sample {
    /// Total memory derived from the two reported halves.
    pub fn memory_total_mb(&self) -> f64 {
        self.memory_available_mb + self.memory_used_mb
    }
}
