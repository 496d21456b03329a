// Shared test helpers

#![allow(dead_code)]

use perfview::codec;
use perfview::models::{Sample, StoredRecord};
use perfview::store::SqliteStore;
use std::sync::Arc;
use tempfile::TempDir;

pub fn sample(entity_id: &str, timestamp: f64, cpu: f64, memory: f64) -> Sample {
    Sample {
        entity_id: entity_id.to_string(),
        timestamp,
        cpu_percent: cpu,
        memory_percent: memory,
        memory_available_mb: 2048.0,
        memory_used_mb: 2048.0,
        load_avg_1m: Some(0.5),
        load_avg_5m: Some(0.4),
        load_avg_15m: Some(0.3),
    }
}

pub fn record(
    id: &str,
    entity_id: &str,
    timestamp: f64,
    samples: &[Sample],
    compressed: bool,
) -> StoredRecord {
    let payload = codec::encode_batch(samples, compressed).unwrap();
    StoredRecord {
        id: id.to_string(),
        entity_id: entity_id.to_string(),
        timestamp,
        start_time: samples.first().map(|s| s.timestamp).unwrap_or(timestamp),
        end_time: samples.last().map(|s| s.timestamp).unwrap_or(timestamp),
        batch_size: samples.len() as u32,
        payload,
        compressed,
    }
}

/// Record whose payload cannot decode; batch_size stays non-zero so the
/// decoder counts it as dropped.
pub fn corrupt_record(id: &str, entity_id: &str, timestamp: f64) -> StoredRecord {
    StoredRecord {
        id: id.to_string(),
        entity_id: entity_id.to_string(),
        timestamp,
        start_time: timestamp,
        end_time: timestamp,
        batch_size: 1,
        payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
        compressed: true,
    }
}

pub async fn open_store(dir: &TempDir) -> Arc<SqliteStore> {
    open_store_with_index(dir, true).await
}

pub async fn open_store_with_index(dir: &TempDir, secondary_index: bool) -> Arc<SqliteStore> {
    let path = dir.path().join("metrics.db");
    let store = SqliteStore::connect(path.to_str().unwrap(), 5, secondary_index)
        .await
        .unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

pub fn epoch_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs_f64()
}

/// Epoch seconds of the most recent hour boundary at or before `ts`.
pub fn hour_start(ts: f64) -> f64 {
    (ts as i64 - (ts as i64).rem_euclid(3600)) as f64
}
