// Tiered in-process cache. Two populations: a volatile recent window that is
// never cached (always recomputed from a live scan) and stable values cached
// with long TTLs (historical timeline segments, first-seen results, the
// composed overview). Entries are immutable once written and replacement is
// idempotent, so concurrent misses cost redundant recomputation at worst.
//
// Constructed once at process start and shared by Arc across query handlers;
// there is no ambient global instance.

use crate::models::{EntitySummary, TimelinePoint};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Data younger than this (seconds) is never cached.
    #[serde(default = "default_fresh_window")]
    pub fresh_window_secs: u64,
    /// Composed overview TTL.
    #[serde(default = "default_hot_ttl")]
    pub hot_ttl_secs: u64,
    /// Historical timeline segment TTL (considered immutable).
    #[serde(default = "default_cold_ttl")]
    pub cold_ttl_secs: u64,
    /// First-seen is immutable once established.
    #[serde(default = "default_first_seen_ttl")]
    pub first_seen_ttl_secs: u64,
    /// Not-found results; short enough to notice late-arriving records.
    #[serde(default = "default_negative_ttl")]
    pub negative_ttl_secs: u64,
    /// Failed lookups; allows quick retry without hammering a failing tier.
    #[serde(default = "default_error_ttl")]
    pub error_ttl_secs: u64,
}

fn default_fresh_window() -> u64 {
    600
}
fn default_hot_ttl() -> u64 {
    180
}
fn default_cold_ttl() -> u64 {
    86_400
}
fn default_first_seen_ttl() -> u64 {
    2_592_000
}
fn default_negative_ttl() -> u64 {
    3_600
}
fn default_error_ttl() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fresh_window_secs: default_fresh_window(),
            hot_ttl_secs: default_hot_ttl(),
            cold_ttl_secs: default_cold_ttl(),
            first_seen_ttl_secs: default_first_seen_ttl(),
            negative_ttl_secs: default_negative_ttl(),
            error_ttl_secs: default_error_ttl(),
        }
    }
}

/// The value kinds this subsystem caches.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Timeline(Vec<TimelinePoint>),
    FirstSeen(Option<f64>),
    Overview(Vec<EntitySummary>),
}

struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
}

pub struct TieredCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    config: CacheConfig,
}

impl TieredCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn fresh_window(&self) -> Duration {
        Duration::from_secs(self.config.fresh_window_secs)
    }

    /// Unexpired value for `key`, if any. Expired entries are dropped on
    /// access.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Replace the entry at `key`. Entries are never mutated in place.
    pub fn set(&self, key: &str, value: CacheValue, ttl: Duration) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Drop all entries for an entity plus the composed overview. Used when
    /// an external signal indicates a cache-busting event. Removes the exact
    /// per-entity keys; entity ids may themselves contain the key separator
    /// (IPv6 hosts), so no suffix matching.
    pub fn invalidate_entity(&self, entity_id: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&keys::timeline(entity_id));
        entries.remove(&keys::first_seen(entity_id));
        entries.remove(keys::OVERVIEW);
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key construction, kept in one place so invalidation stays in sync.
pub mod keys {
    pub const OVERVIEW: &str = "dashboard:overview";

    pub fn first_seen(entity_id: &str) -> String {
        format!("first_seen:{}", entity_id)
    }

    pub fn timeline(entity_id: &str) -> String {
        format!("timeline:{}", entity_id)
    }
}
