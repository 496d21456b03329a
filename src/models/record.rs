// Stored units: record batches, latest-state markers, first-seen metadata.

use serde::{Deserialize, Serialize};

/// The on-disk unit: one producer batch of samples. The payload holds a
/// version-prefixed encoded `Vec<Sample>` (see `codec`), optionally
/// compressed. Read-only from this subsystem's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    pub id: String,
    pub entity_id: String,
    /// Batch timestamp (epoch seconds); the producer guarantees it falls
    /// within the hour implied by the record's partition key.
    pub timestamp: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub batch_size: u32,
    #[serde(skip)]
    pub payload: Vec<u8>,
    pub compressed: bool,
}

/// Fast-path pointer to an entity's most recent known state, stored at a
/// hash-derived key. A hint, never ground truth: clock skew and producer
/// retries can violate monotonicity, so readers reconcile against scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestMarker {
    pub entity_id: String,
    pub latest_timestamp: f64,
    pub latest_record_id: String,
}

/// Per-entity metadata row. `first_seen` is write-once-minimum: it only ever
/// decreases when an earlier-timestamped sample surfaces out of order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstSeenRecord {
    pub entity_id: String,
    pub first_seen: f64,
    pub last_updated: f64,
    pub total_records: u64,
}
