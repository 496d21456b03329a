// Hour-bucket partition keys and the minute sort key.
// Every record for an entity lives in the partition of its hour; the sort
// key is the sample timestamp floored to the minute.

use chrono::{DateTime, Utc};

/// Seconds per partition bucket.
pub const BUCKET_SECS: i64 = 3600;

/// One hour-aligned partition for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub entity_id: String,
    /// `floor(timestamp / 3600)`.
    pub hour_bucket: i64,
}

impl PartitionKey {
    /// Storage rendering: `entity#YYYY-MM-DD-HH` (UTC, fixed width).
    pub fn render(&self) -> String {
        let dt = DateTime::<Utc>::from_timestamp(self.hour_bucket * BUCKET_SECS, 0)
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());
        format!("{}#{}", self.entity_id, dt.format("%Y-%m-%d-%H"))
    }
}

/// Partition key for (entity, timestamp). Pure and deterministic.
/// Negative or NaN timestamps are a caller contract violation.
pub fn bucket_key(entity_id: &str, timestamp: f64) -> PartitionKey {
    PartitionKey {
        entity_id: entity_id.to_string(),
        hour_bucket: (timestamp as i64).div_euclid(BUCKET_SECS),
    }
}

/// Ordered hour buckets covering `[start_ts, end_ts]`, inclusive of partial
/// boundary hours. Strictly increasing, gap-free; empty when end < start.
pub fn enumerate_buckets(entity_id: &str, start_ts: f64, end_ts: f64) -> Vec<PartitionKey> {
    if end_ts < start_ts {
        return vec![];
    }
    let first = (start_ts as i64).div_euclid(BUCKET_SECS);
    let last = (end_ts as i64).div_euclid(BUCKET_SECS);
    (first..=last)
        .map(|hour_bucket| PartitionKey {
            entity_id: entity_id.to_string(),
            hour_bucket,
        })
        .collect()
}

/// Sort-key rounding: `floor(ts / 60) * 60`.
pub fn minute_floor(timestamp: f64) -> i64 {
    (timestamp as i64).div_euclid(60) * 60
}
