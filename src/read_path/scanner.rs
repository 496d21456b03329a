// Partition scanner with a segmented-scan fallback.
//
// The optimized path enumerates hour buckets and issues one range read per
// bucket; buckets are disjoint time ranges, so the merge is an ordered
// concatenation. The legacy path slices the table into fixed segments and
// scans them independently: physically distributed shards settle into a
// consistent read path at different times, so touching every segment within
// one call raises the chance of observing fresh writes. That is a heuristic
// with no proven staleness bound; callers see coverage through the
// failed/total unit counts and must not assume completeness.

use super::{ReadPathConfig, ReadPathStrategy};
use crate::models::StoredRecord;
use crate::partition::{self, BUCKET_SECS, PartitionKey};
use crate::store::MetricStore;
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::instrument;

/// Scan result plus coverage accounting. `failed_units` counts buckets or
/// segments that errored or timed out and were skipped.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub records: Vec<StoredRecord>,
    pub failed_units: u32,
    pub total_units: u32,
}

impl ScanOutcome {
    pub fn degraded(&self) -> bool {
        self.failed_units > 0
    }
}

pub struct PartitionScanner {
    store: Arc<dyn MetricStore>,
    config: ReadPathConfig,
}

impl PartitionScanner {
    pub fn new(store: Arc<dyn MetricStore>, config: ReadPathConfig) -> Self {
        Self { store, config }
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs)
    }

    /// Records for `entity_id` with timestamps in `[since_ts, now]`,
    /// ascending. Failing units are skipped and logged; a scan where every
    /// unit failed comes back empty (and fully degraded), never as an error.
    #[instrument(skip(self), fields(repo = "scanner", operation = "scan"))]
    pub async fn scan(
        &self,
        entity_id: &str,
        since_ts: f64,
        now: f64,
        limit: Option<u32>,
    ) -> ScanOutcome {
        match self.config.strategy {
            ReadPathStrategy::Optimized => self.scan_partitions(entity_id, since_ts, now).await,
            ReadPathStrategy::Legacy => self.segmented_scan(Some(entity_id), since_ts, limit).await,
        }
    }

    async fn scan_partitions(&self, entity_id: &str, since_ts: f64, now: f64) -> ScanOutcome {
        let buckets = partition::enumerate_buckets(entity_id, since_ts, now);
        let since_minute = partition::minute_floor(since_ts);
        let total_units = buckets.len() as u32;
        let call_timeout = self.call_timeout();

        let results: Vec<(PartitionKey, Option<Vec<StoredRecord>>)> = stream::iter(buckets)
            .map(|key| {
                let store = Arc::clone(&self.store);
                async move {
                    let result = timeout(call_timeout, store.query_partition(&key, since_minute)).await;
                    match result {
                        Ok(Ok(records)) => (key, Some(records)),
                        Ok(Err(e)) => {
                            tracing::warn!(partition = %key.render(), error = %e, "bucket read failed, skipping");
                            (key, None)
                        }
                        Err(_) => {
                            tracing::warn!(partition = %key.render(), "bucket read timed out, skipping");
                            (key, None)
                        }
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        let mut failed_units = 0;
        let mut records = Vec::new();
        for (_, result) in results {
            match result {
                Some(batch) => records.extend(batch),
                None => failed_units += 1,
            }
        }
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        ScanOutcome {
            records,
            failed_units,
            total_units,
        }
    }

    /// Bounded, segmented full-table scan. With a `budget`, each segment
    /// reads at most its share of raw records before the client-side time
    /// filter runs — best-effort recent window, not complete history.
    #[instrument(skip(self), fields(repo = "scanner", operation = "segmented_scan"))]
    pub async fn segmented_scan(
        &self,
        entity_id: Option<&str>,
        since_ts: f64,
        budget: Option<u32>,
    ) -> ScanOutcome {
        let total_segments = self.config.scan_segments.max(1);
        let per_segment_budget = budget.map(|b| b.div_ceil(total_segments).max(1));
        let call_timeout = self.call_timeout();
        let page_size = self.config.page_size;

        let results: Vec<Option<Vec<StoredRecord>>> = stream::iter(0..total_segments)
            .map(|segment| {
                let store = Arc::clone(&self.store);
                let entity = entity_id.map(str::to_string);
                async move {
                    let mut collected: Vec<StoredRecord> = Vec::new();
                    let mut token: Option<i64> = None;
                    loop {
                        let page = match timeout(
                            call_timeout,
                            store.scan_segment(
                                segment,
                                total_segments,
                                entity.as_deref(),
                                token,
                                page_size,
                            ),
                        )
                        .await
                        {
                            Ok(Ok(page)) => page,
                            Ok(Err(e)) => {
                                tracing::warn!(segment, error = %e, "segment scan failed, skipping");
                                return None;
                            }
                            Err(_) => {
                                tracing::warn!(segment, "segment scan timed out, skipping");
                                return None;
                            }
                        };
                        collected.extend(page.records);
                        if let Some(b) = per_segment_budget
                            && collected.len() >= b as usize
                        {
                            collected.truncate(b as usize);
                            break;
                        }
                        match page.next_token {
                            Some(t) => token = Some(t),
                            None => break,
                        }
                    }
                    Some(collected)
                }
            })
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        let total_units = total_segments;
        let mut failed_units = 0;
        let mut records = Vec::new();
        for result in results {
            match result {
                Some(batch) => records.extend(batch),
                None => failed_units += 1,
            }
        }
        records.retain(|r| r.timestamp >= since_ts);
        records.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        ScanOutcome {
            records,
            failed_units,
            total_units,
        }
    }

    /// Newest record for an entity: probe the current hour partition, then
    /// the previous one. Cheap freshness check when no marker exists.
    pub async fn latest_record(&self, entity_id: &str, now: f64) -> Option<StoredRecord> {
        for hour_ts in [now, now - BUCKET_SECS as f64] {
            if hour_ts < 0.0 {
                break;
            }
            let key = partition::bucket_key(entity_id, hour_ts);
            match timeout(self.call_timeout(), self.store.query_partition(&key, 0)).await {
                Ok(Ok(records)) => {
                    if let Some(latest) = records
                        .into_iter()
                        .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
                    {
                        return Some(latest);
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(entity_id, partition = %key.render(), error = %e, "latest probe failed");
                }
                Err(_) => {
                    tracing::warn!(entity_id, partition = %key.render(), "latest probe timed out");
                }
            }
        }
        None
    }
}
