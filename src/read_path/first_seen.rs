// Layered first-seen resolution: cache, metadata table, secondary index,
// full scan. First success wins. Each outcome is cached with a lifetime
// proportional to its volatility: a found value is immutable (30 days), a
// not-found result must notice late arrivals (1 hour), and an error should
// retry soon without hammering a failing tier (5 minutes).
//
// The resolver only reads. Lowering a stale stored minimum after an
// out-of-order discovery is the ingestion-side updater's job
// (`MetricStore::put_first_seen_if_lower`).

use super::PartitionScanner;
use crate::cache::{CacheValue, TieredCache, keys};
use crate::store::{MetricStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct FirstSeenResolver {
    store: Arc<dyn MetricStore>,
    scanner: Arc<PartitionScanner>,
    cache: Arc<TieredCache>,
}

impl FirstSeenResolver {
    pub fn new(
        store: Arc<dyn MetricStore>,
        scanner: Arc<PartitionScanner>,
        cache: Arc<TieredCache>,
    ) -> Self {
        Self {
            store,
            scanner,
            cache,
        }
    }

    /// Immutable first-observed timestamp for an entity, or None when the
    /// entity has no history. Warm-cache calls return the identical value.
    #[instrument(skip(self), fields(repo = "first_seen", operation = "resolve"))]
    pub async fn resolve(&self, entity_id: &str) -> Option<f64> {
        let cache_key = keys::first_seen(entity_id);
        if let Some(CacheValue::FirstSeen(cached)) = self.cache.get(&cache_key) {
            tracing::debug!(entity_id, "first_seen cache hit");
            return cached;
        }

        // Tier 2: dedicated metadata table, O(1).
        match self.store.get_first_seen(entity_id).await {
            Ok(Some(record)) => {
                self.cache_found(&cache_key, record.first_seen);
                return Some(record.first_seen);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "metadata lookup failed, trying index");
            }
        }

        // Tier 3: secondary index ordered by timestamp, limit 1.
        match self.store.earliest_for_entity(entity_id).await {
            Ok(Some(ts)) => {
                self.cache_found(&cache_key, ts);
                return Some(ts);
            }
            Ok(None) => {
                // Index answered and found nothing; the scan below still
                // runs as a freshness double-check.
            }
            Err(StoreError::MissingIndex(_)) => {
                // Permanent condition for this deployment, not a retry loop.
                tracing::warn!(entity_id, "no secondary index, falling back to table scan");
            }
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "index lookup failed");
                self.cache_error(&cache_key);
                return None;
            }
        }

        // Tier 4: full scan, client-side minimum. Last resort.
        let outcome = self.scanner.segmented_scan(Some(entity_id), 0.0, None).await;
        if outcome.total_units > 0 && outcome.failed_units == outcome.total_units {
            tracing::warn!(entity_id, "first_seen scan failed on every segment");
            self.cache_error(&cache_key);
            return None;
        }
        let first_seen = outcome
            .records
            .iter()
            .map(|r| r.timestamp)
            .fold(None, |min: Option<f64>, ts| match min {
                Some(m) if m <= ts => Some(m),
                _ => Some(ts),
            });
        match first_seen {
            Some(ts) => self.cache_found(&cache_key, ts),
            None => self.cache.set(
                &cache_key,
                CacheValue::FirstSeen(None),
                Duration::from_secs(self.cache.config().negative_ttl_secs),
            ),
        }
        first_seen
    }

    fn cache_found(&self, cache_key: &str, ts: f64) {
        self.cache.set(
            cache_key,
            CacheValue::FirstSeen(Some(ts)),
            Duration::from_secs(self.cache.config().first_seen_ttl_secs),
        );
    }

    fn cache_error(&self, cache_key: &str) {
        self.cache.set(
            cache_key,
            CacheValue::FirstSeen(None),
            Duration::from_secs(self.cache.config().error_ttl_secs),
        );
    }
}
