// Rollup statistics and timeline construction. Pure functions; store access
// stays in the read path.

use crate::models::{EntitySummary, Sample, TimelinePoint};
use crate::partition::minute_floor;
use std::collections::BTreeMap;

/// Chart-sized output cap: the most recent N minutes survive truncation.
pub const MAX_TIMELINE_POINTS: usize = 200;

/// Map samples to minute-deduplicated chart points. Within a minute the
/// later-processed sample wins; output is ascending by minute and truncated
/// to the most recent MAX_TIMELINE_POINTS.
pub fn build_timeline(samples: &[Sample]) -> Vec<TimelinePoint> {
    let mut by_minute: BTreeMap<i64, TimelinePoint> = BTreeMap::new();
    for s in samples {
        let minute = minute_floor(s.timestamp);
        by_minute.insert(
            minute,
            TimelinePoint {
                timestamp: minute,
                cpu_percent: s.cpu_percent,
                memory_percent: s.memory_percent,
                memory_available_mb: s.memory_available_mb,
                memory_used_mb: s.memory_used_mb,
            },
        );
    }
    truncate_recent(by_minute.into_values().collect())
}

/// Merge a cached historical timeline with freshly scanned points. Fresh
/// points win at the same minute; output is ascending and truncated.
pub fn merge_timelines(
    historical: Vec<TimelinePoint>,
    fresh: Vec<TimelinePoint>,
) -> Vec<TimelinePoint> {
    let mut by_minute: BTreeMap<i64, TimelinePoint> = BTreeMap::new();
    for p in historical.into_iter().chain(fresh) {
        by_minute.insert(p.timestamp, p);
    }
    truncate_recent(by_minute.into_values().collect())
}

/// Rollup over an already-built timeline. Empty input yields a zeroed
/// summary, not an error. `is_online` is a point-in-time boolean computed
/// against `now`, never stored.
pub fn summarize_timeline(
    entity_id: &str,
    timeline: Vec<TimelinePoint>,
    now: f64,
    online_threshold_secs: f64,
) -> EntitySummary {
    if timeline.is_empty() {
        return EntitySummary::empty(entity_id);
    }

    let cpu_values: Vec<f64> = timeline.iter().map(|p| p.cpu_percent).collect();
    let memory_values: Vec<f64> = timeline.iter().map(|p| p.memory_percent).collect();

    // Ascending order makes the last point the current one; equal-minute
    // ties were already resolved during timeline construction.
    let latest = &timeline[timeline.len() - 1];
    let last_seen = latest.timestamp as f64;

    EntitySummary {
        entity_id: entity_id.to_string(),
        total_points: timeline.len(),
        current_cpu: latest.cpu_percent,
        current_memory: latest.memory_percent,
        avg_cpu: mean_f64(&cpu_values),
        avg_memory: mean_f64(&memory_values),
        max_cpu: cpu_values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        max_memory: memory_values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max),
        first_seen: None,
        last_seen,
        is_online: (now - last_seen) < online_threshold_secs,
        degraded: false,
        dropped_records: 0,
        timeline,
    }
}

/// Full aggregation over decoded samples: timeline build plus rollup.
/// `first_seen` is left for the caller to fill in.
pub fn aggregate(
    entity_id: &str,
    samples: &[Sample],
    now: f64,
    online_threshold_secs: f64,
) -> EntitySummary {
    let mut summary =
        summarize_timeline(entity_id, build_timeline(samples), now, online_threshold_secs);
    // Current values come from the raw sample with the max timestamp, not
    // the minute-floored point, so sub-minute recency is preserved.
    if let Some(latest) = latest_sample(samples) {
        summary.current_cpu = latest.cpu_percent;
        summary.current_memory = latest.memory_percent;
        summary.last_seen = latest.timestamp;
        summary.is_online = (now - latest.timestamp) < online_threshold_secs;
    }
    summary
}

/// Sample with the maximum timestamp; ties keep the earliest-seen sample
/// (strict `>` while folding in input order) for determinism.
pub fn latest_sample(samples: &[Sample]) -> Option<&Sample> {
    samples.iter().fold(None, |best, s| match best {
        Some(b) if s.timestamp > b.timestamp => Some(s),
        None => Some(s),
        keep => keep,
    })
}

fn truncate_recent(mut points: Vec<TimelinePoint>) -> Vec<TimelinePoint> {
    if points.len() > MAX_TIMELINE_POINTS {
        points.drain(..points.len() - MAX_TIMELINE_POINTS);
    }
    points
}

fn mean_f64(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / (v.len() as f64)
}
