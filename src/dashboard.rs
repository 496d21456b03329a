// Dashboard composition: per-entity tiered reads fanned out across the
// known entity set, ordered by recency, tolerant of individual failures.

use crate::aggregate::{self, build_timeline, merge_timelines, summarize_timeline};
use crate::cache::{CacheValue, TieredCache, keys};
use crate::codec;
use crate::marker::MarkerReader;
use crate::models::{DashboardOverview, EntitySummary, TimelinePoint};
use crate::read_path::{FirstSeenResolver, PartitionScanner, ReadPathConfig};
use crate::store::{MetricStore, StoreError};
use futures_util::StreamExt;
use futures_util::stream;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::instrument;

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    /// An entity is online when its last sample is younger than this.
    #[serde(default = "default_online_threshold")]
    pub online_threshold_secs: u64,
    #[serde(default = "default_max_entities")]
    pub max_entities: usize,
}

fn default_window_hours() -> u32 {
    24
}
fn default_online_threshold() -> u64 {
    360
}
fn default_max_entities() -> usize {
    100
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            online_threshold_secs: default_online_threshold(),
            max_entities: default_max_entities(),
        }
    }
}

pub struct Dashboard {
    store: Arc<dyn MetricStore>,
    scanner: Arc<PartitionScanner>,
    resolver: FirstSeenResolver,
    marker: MarkerReader,
    cache: Arc<TieredCache>,
    config: DashboardConfig,
    max_concurrent: usize,
    scan_limit: u32,
    query_timeout: Duration,
}

impl Dashboard {
    pub fn new(
        store: Arc<dyn MetricStore>,
        cache: Arc<TieredCache>,
        read_config: ReadPathConfig,
        config: DashboardConfig,
    ) -> Self {
        let scanner = Arc::new(PartitionScanner::new(
            Arc::clone(&store),
            read_config.clone(),
        ));
        let resolver = FirstSeenResolver::new(
            Arc::clone(&store),
            Arc::clone(&scanner),
            Arc::clone(&cache),
        );
        let marker = MarkerReader::new(Arc::clone(&store));
        Self {
            store,
            scanner,
            resolver,
            marker,
            cache,
            config,
            max_concurrent: read_config.max_concurrent,
            scan_limit: read_config.scan_limit,
            query_timeout: Duration::from_secs(read_config.query_timeout_secs),
        }
    }

    /// Tiered per-entity read: cached historical timeline plus a fresh scan
    /// of the recent window (the full window on a cache miss), merged with
    /// fresh points winning per minute. "No data" is a valid zeroed summary,
    /// never an error; unreadable portions set the degraded flag.
    #[instrument(skip(self), fields(repo = "dashboard", operation = "entity_summary"))]
    pub async fn entity_summary(&self, entity_id: &str) -> EntitySummary {
        let now = epoch_now();
        let window_start = now - (self.config.window_hours as f64) * 3600.0;
        let boundary = now - self.cache.fresh_window().as_secs_f64();
        let timeline_key = keys::timeline(entity_id);

        let cached_historical: Option<Vec<TimelinePoint>> =
            match self.cache.get(&timeline_key) {
                Some(CacheValue::Timeline(points)) => Some(
                    points
                        .into_iter()
                        .filter(|p| (p.timestamp as f64) >= window_start)
                        .collect(),
                ),
                _ => None,
            };
        // Resume where cached coverage ends. The cache never holds points
        // newer than the boundary at write-back time, so scanning from the
        // boundary alone would skip any minutes that have aged out of the
        // fresh window since the entry was written.
        let scan_since = match cached_historical.as_ref().and_then(|points| points.last()) {
            Some(last) => ((last.timestamp + 60) as f64).min(boundary).max(window_start),
            None => window_start,
        };

        let outcome = self
            .scanner
            .scan(entity_id, scan_since, now, Some(self.scan_limit))
            .await;
        let (samples, dropped) = codec::decode_records(&outcome.records);

        let fresh = build_timeline(&samples);
        let merged = merge_timelines(cached_historical.unwrap_or_default(), fresh);
        let mut summary = summarize_timeline(
            entity_id,
            merged,
            now,
            self.config.online_threshold_secs as f64,
        );

        // Minute flooring loses sub-minute recency; restore current values
        // from the newest raw sample.
        if let Some(latest) = aggregate::latest_sample(&samples)
            && latest.timestamp >= summary.last_seen
        {
            summary.current_cpu = latest.cpu_percent;
            summary.current_memory = latest.memory_percent;
            summary.last_seen = latest.timestamp;
            summary.is_online =
                (now - latest.timestamp) < self.config.online_threshold_secs as f64;
        }

        summary.degraded = outcome.degraded();
        summary.dropped_records = dropped;
        summary.first_seen = self.resolver.resolve(entity_id).await;

        // Marker hint: cheap online/offline signal, reconciled against the
        // scan rather than trusted outright.
        if let Some(marker) = self.marker.get_latest(entity_id).await
            && marker.latest_timestamp > summary.last_seen
        {
            summary.last_seen = marker.latest_timestamp;
            summary.is_online =
                (now - marker.latest_timestamp) < self.config.online_threshold_secs as f64;
        }

        // Write back the stable portion; points inside the fresh window are
        // recomputed on every query.
        let historical: Vec<TimelinePoint> = summary
            .timeline
            .iter()
            .filter(|p| (p.timestamp as f64) < boundary)
            .cloned()
            .collect();
        if !historical.is_empty() {
            self.cache.set(
                &timeline_key,
                CacheValue::Timeline(historical),
                Duration::from_secs(self.cache.config().cold_ttl_secs),
            );
        }

        summary
    }

    /// Fan out aggregation across entities with bounded concurrency under a
    /// single query deadline. One entity failing yields a zeroed degraded
    /// summary for it; entities still outstanding when the deadline expires
    /// come back zeroed and degraded too, with their in-flight store calls
    /// cancelled. Result is ordered by last_seen descending, entities with
    /// no data last.
    #[instrument(skip(self, entity_ids), fields(repo = "dashboard", operation = "compose", entities = entity_ids.len()))]
    pub async fn compose(&self, entity_ids: &[String]) -> Vec<EntitySummary> {
        let deadline = Instant::now() + self.query_timeout;
        let mut summaries: Vec<EntitySummary> = stream::iter(entity_ids.to_vec())
            .map(|entity_id| async move {
                match timeout_at(deadline, self.entity_summary(&entity_id)).await {
                    Ok(summary) => summary,
                    Err(_) => {
                        tracing::warn!(entity_id, "query deadline expired, returning degraded");
                        let mut summary = EntitySummary::empty(&entity_id);
                        summary.degraded = true;
                        summary
                    }
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
        summaries.sort_by(|a, b| b.last_seen.total_cmp(&a.last_seen));
        summaries
    }

    /// Overview across the known entity set, hot-cached. Entity discovery
    /// failure is the one query-level error: "the backend could not be
    /// reached at all" is distinct from "no data".
    #[instrument(skip(self), fields(repo = "dashboard", operation = "overview"))]
    pub async fn overview(&self) -> Result<DashboardOverview, StoreError> {
        if let Some(CacheValue::Overview(summaries)) = self.cache.get(keys::OVERVIEW) {
            tracing::debug!("overview cache hit");
            return Ok(overview_from(summaries));
        }

        let mut entities = self.store.known_entities().await?;
        entities.truncate(self.config.max_entities);
        let summaries = self.compose(&entities).await;

        self.cache.set(
            keys::OVERVIEW,
            CacheValue::Overview(summaries.clone()),
            Duration::from_secs(self.cache.config().hot_ttl_secs),
        );
        Ok(overview_from(summaries))
    }

    /// Drop cached state for an entity (and the composed overview).
    pub fn invalidate(&self, entity_id: &str) {
        self.cache.invalidate_entity(entity_id);
        tracing::info!(entity_id, "cache invalidated");
    }
}

fn overview_from(summaries: Vec<EntitySummary>) -> DashboardOverview {
    DashboardOverview {
        total_entities: summaries.len(),
        total_points: summaries.iter().map(|s| s.total_points).sum(),
        summaries,
    }
}

fn epoch_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
