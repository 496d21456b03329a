// Read-path tests: partition scans, segmented fallback, first-seen tiers

mod common;

use common::{epoch_now, hour_start, open_store, open_store_with_index, record, sample};
use perfview::cache::{CacheConfig, TieredCache};
use perfview::read_path::{
    FirstSeenResolver, PartitionScanner, ReadPathConfig, ReadPathStrategy,
};
use perfview::store::MetricStore;
use std::sync::Arc;
use tempfile::TempDir;

fn scanner(store: Arc<dyn MetricStore>, strategy: ReadPathStrategy) -> PartitionScanner {
    let config = ReadPathConfig {
        strategy,
        scan_segments: 4,
        page_size: 3,
        ..ReadPathConfig::default()
    };
    PartitionScanner::new(store, config)
}

async fn seed_minutes(store: &dyn MetricStore, entity: &str, base: f64, count: usize) {
    for i in 0..count {
        let ts = base + (i as f64) * 60.0;
        let samples = vec![sample(entity, ts, (i as f64) * 10.0, 50.0)];
        store
            .put_record(&record(&format!("{entity}-{i}"), entity, ts, &samples, false))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn optimized_scan_crosses_hour_boundaries() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    let h0 = hour_start(1_755_000_000.0);

    for (id, ts) in [("r-1", h0 + 100.0), ("r-2", h0 + 3700.0)] {
        let samples = vec![sample("web-1", ts, 1.0, 1.0)];
        store.put_record(&record(id, "web-1", ts, &samples, false)).await.unwrap();
    }

    let scanner = scanner(store, ReadPathStrategy::Optimized);
    let outcome = scanner.scan("web-1", h0, h0 + 4000.0, None).await;
    assert!(!outcome.degraded());
    assert_eq!(outcome.total_units, 2);
    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r-1", "r-2"]);

    // Narrower window skips the first hour's bucket entirely.
    let outcome = scanner.scan("web-1", h0 + 3600.0, h0 + 4000.0, None).await;
    let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r-2"]);
}

#[tokio::test]
async fn legacy_scan_matches_optimized_scan() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    let h0 = hour_start(1_755_000_000.0);
    seed_minutes(store.as_ref(), "web-1", h0 + 30.0, 10).await;

    let optimized = scanner(Arc::clone(&store), ReadPathStrategy::Optimized)
        .scan("web-1", h0, h0 + 3600.0, None)
        .await;
    let legacy = scanner(store, ReadPathStrategy::Legacy)
        .scan("web-1", h0, h0 + 3600.0, None)
        .await;

    assert_eq!(optimized.records.len(), 10);
    let optimized_ids: Vec<&str> = optimized.records.iter().map(|r| r.id.as_str()).collect();
    let legacy_ids: Vec<&str> = legacy.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(optimized_ids, legacy_ids);
}

#[tokio::test]
async fn segmented_scan_filters_client_side() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    seed_minutes(store.as_ref(), "web-1", 1000.0, 5).await;
    seed_minutes(store.as_ref(), "web-2", 1000.0, 5).await;

    let scanner = scanner(store, ReadPathStrategy::Legacy);

    // Entity filter.
    let outcome = scanner.segmented_scan(Some("web-1"), 0.0, None).await;
    assert_eq!(outcome.records.len(), 5);
    assert!(outcome.records.iter().all(|r| r.entity_id == "web-1"));

    // Time filter, applied after collection.
    let outcome = scanner.segmented_scan(Some("web-1"), 1150.0, None).await;
    let timestamps: Vec<f64> = outcome.records.iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![1180.0, 1240.0]);

    // No filter sees both entities.
    let outcome = scanner.segmented_scan(None, 0.0, None).await;
    assert_eq!(outcome.records.len(), 10);
    assert_eq!(outcome.total_units, 4);
    assert_eq!(outcome.failed_units, 0);
}

#[tokio::test]
async fn segmented_scan_budget_bounds_raw_reads() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    seed_minutes(store.as_ref(), "web-1", 1000.0, 30).await;

    let scanner = scanner(store, ReadPathStrategy::Legacy);
    // Budget 8 over 4 segments: each segment stops after 2 raw records.
    let outcome = scanner.segmented_scan(Some("web-1"), 0.0, Some(8)).await;
    assert!(!outcome.records.is_empty());
    assert!(outcome.records.len() <= 8);
}

#[tokio::test]
async fn latest_record_probes_current_then_previous_hour() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    let now = epoch_now();

    // web-1 has a record in the current hour, web-2 only in the previous one.
    let ts_current = now - 1.0;
    let samples = vec![sample("web-1", ts_current, 1.0, 1.0)];
    store.put_record(&record("r-cur", "web-1", ts_current, &samples, false)).await.unwrap();

    let ts_prev = hour_start(now) - 100.0;
    let samples = vec![sample("web-2", ts_prev, 1.0, 1.0)];
    store.put_record(&record("r-prev", "web-2", ts_prev, &samples, false)).await.unwrap();

    let scanner = scanner(store, ReadPathStrategy::Optimized);
    assert_eq!(scanner.latest_record("web-1", now).await.unwrap().id, "r-cur");
    assert_eq!(scanner.latest_record("web-2", now).await.unwrap().id, "r-prev");
    assert!(scanner.latest_record("ghost", now).await.is_none());
}

fn resolver(store: Arc<dyn MetricStore>) -> FirstSeenResolver {
    let scan = Arc::new(scanner(Arc::clone(&store), ReadPathStrategy::Legacy));
    let cache = Arc::new(TieredCache::new(CacheConfig::default()));
    FirstSeenResolver::new(store, scan, cache)
}

#[tokio::test]
async fn first_seen_prefers_metadata_table() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    store.put_first_seen_if_lower("web-1", 12_345.0).await.unwrap();
    // Records start later; the metadata minimum wins.
    seed_minutes(store.as_ref(), "web-1", 50_000.0, 2).await;

    let resolver = resolver(store);
    assert_eq!(resolver.resolve("web-1").await, Some(12_345.0));
    // Warm cache returns the identical value.
    assert_eq!(resolver.resolve("web-1").await, Some(12_345.0));
}

#[tokio::test]
async fn first_seen_falls_back_to_index() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    seed_minutes(store.as_ref(), "web-1", 500.0, 3).await;

    let resolver = resolver(store);
    assert_eq!(resolver.resolve("web-1").await, Some(500.0));
}

#[tokio::test]
async fn first_seen_scans_when_index_is_missing() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store_with_index(&dir, false).await;
    seed_minutes(store.as_ref(), "web-1", 700.0, 3).await;

    let resolver = resolver(store);
    assert_eq!(resolver.resolve("web-1").await, Some(700.0));
}

#[tokio::test]
async fn first_seen_unknown_entity_is_none() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    let resolver = resolver(store);
    assert_eq!(resolver.resolve("ghost").await, None);
}

#[tokio::test]
async fn first_seen_cached_value_survives_later_writes() {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn MetricStore> = open_store(&dir).await;
    seed_minutes(store.as_ref(), "web-1", 1000.0, 1).await;

    let resolver = resolver(Arc::clone(&store));
    assert_eq!(resolver.resolve("web-1").await, Some(1000.0));

    // An earlier record lands after the value is cached; the warm resolver
    // keeps its answer, a cold one observes the new minimum.
    let samples = vec![sample("web-1", 400.0, 1.0, 1.0)];
    store.put_record(&record("r-early", "web-1", 400.0, &samples, false)).await.unwrap();

    assert_eq!(resolver.resolve("web-1").await, Some(1000.0));
    let cold = self::resolver(store);
    assert_eq!(cold.resolve("web-1").await, Some(400.0));
}
