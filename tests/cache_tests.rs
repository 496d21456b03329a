// Tiered cache tests: TTL expiry, replacement, entity invalidation

use perfview::cache::{CacheConfig, CacheValue, TieredCache, keys};
use perfview::models::TimelinePoint;
use std::time::Duration;

fn points(minutes: &[i64]) -> Vec<TimelinePoint> {
    minutes
        .iter()
        .map(|&m| TimelinePoint {
            timestamp: m,
            cpu_percent: 1.0,
            memory_percent: 1.0,
            memory_available_mb: 0.0,
            memory_used_mb: 0.0,
        })
        .collect()
}

#[tokio::test]
async fn set_and_get_round_trip() {
    let cache = TieredCache::new(CacheConfig::default());
    cache.set(
        &keys::timeline("web-1"),
        CacheValue::Timeline(points(&[0, 60])),
        Duration::from_secs(60),
    );
    match cache.get(&keys::timeline("web-1")) {
        Some(CacheValue::Timeline(p)) => assert_eq!(p.len(), 2),
        _ => panic!("expected timeline value"),
    }
}

#[tokio::test]
async fn miss_on_unknown_key() {
    let cache = TieredCache::new(CacheConfig::default());
    assert!(cache.get("timeline:ghost").is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn expired_entry_is_dropped_on_access() {
    let cache = TieredCache::new(CacheConfig::default());
    cache.set(
        &keys::first_seen("web-1"),
        CacheValue::FirstSeen(Some(100.0)),
        Duration::ZERO,
    );
    assert!(cache.get(&keys::first_seen("web-1")).is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn set_replaces_existing_entry() {
    let cache = TieredCache::new(CacheConfig::default());
    let key = keys::first_seen("web-1");
    cache.set(&key, CacheValue::FirstSeen(Some(100.0)), Duration::from_secs(60));
    cache.set(&key, CacheValue::FirstSeen(Some(50.0)), Duration::from_secs(60));
    match cache.get(&key) {
        Some(CacheValue::FirstSeen(ts)) => assert_eq!(ts, Some(50.0)),
        _ => panic!("expected first_seen value"),
    }
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn delete_removes_entry() {
    let cache = TieredCache::new(CacheConfig::default());
    let key = keys::timeline("web-1");
    cache.set(&key, CacheValue::Timeline(points(&[0])), Duration::from_secs(60));
    cache.delete(&key);
    assert!(cache.get(&key).is_none());
}

#[tokio::test]
async fn invalidate_entity_drops_its_keys_and_the_overview() {
    let cache = TieredCache::new(CacheConfig::default());
    let ttl = Duration::from_secs(60);
    cache.set(&keys::timeline("web-1"), CacheValue::Timeline(points(&[0])), ttl);
    cache.set(&keys::first_seen("web-1"), CacheValue::FirstSeen(Some(1.0)), ttl);
    cache.set(&keys::timeline("web-2"), CacheValue::Timeline(points(&[0])), ttl);
    cache.set(keys::OVERVIEW, CacheValue::Overview(vec![]), ttl);

    cache.invalidate_entity("web-1");

    assert!(cache.get(&keys::timeline("web-1")).is_none());
    assert!(cache.get(&keys::first_seen("web-1")).is_none());
    assert!(cache.get(keys::OVERVIEW).is_none());
    assert!(cache.get(&keys::timeline("web-2")).is_some());
}

#[tokio::test]
async fn invalidate_does_not_match_prefix_entities() {
    let cache = TieredCache::new(CacheConfig::default());
    let ttl = Duration::from_secs(60);
    cache.set(&keys::timeline("web-1"), CacheValue::Timeline(points(&[0])), ttl);
    cache.set(&keys::timeline("web-11"), CacheValue::Timeline(points(&[0])), ttl);

    cache.invalidate_entity("web-1");

    assert!(cache.get(&keys::timeline("web-1")).is_none());
    assert!(cache.get(&keys::timeline("web-11")).is_some());
}

#[tokio::test]
async fn invalidate_matches_exact_entity_keys_only() {
    // Entity ids may contain the key separator (IPv6 hosts); invalidating
    // one must not drop entries whose id merely ends with it.
    let cache = TieredCache::new(CacheConfig::default());
    let ttl = Duration::from_secs(60);
    cache.set(&keys::timeline("fe80::1"), CacheValue::Timeline(points(&[0])), ttl);
    cache.set(&keys::first_seen("fe80::1"), CacheValue::FirstSeen(Some(1.0)), ttl);
    cache.set(&keys::timeline("node:fe80::1"), CacheValue::Timeline(points(&[0])), ttl);

    cache.invalidate_entity("fe80::1");

    assert!(cache.get(&keys::timeline("fe80::1")).is_none());
    assert!(cache.get(&keys::first_seen("fe80::1")).is_none());
    assert!(cache.get(&keys::timeline("node:fe80::1")).is_some());
}

#[test]
fn config_defaults_match_documented_tiers() {
    let config = CacheConfig::default();
    assert_eq!(config.fresh_window_secs, 600);
    assert_eq!(config.hot_ttl_secs, 180);
    assert_eq!(config.cold_ttl_secs, 86_400);
    assert_eq!(config.first_seen_ttl_secs, 2_592_000);
    assert_eq!(config.negative_ttl_secs, 3_600);
    assert_eq!(config.error_ttl_secs, 300);
}
