// Read-path strategy and tuning knobs.
//
// The storage layout went through two generations: a flat entity-keyed table
// that can only be scanned, and an hour-partitioned layout with per-bucket
// range reads. Instead of near-duplicate service implementations, one scanner
// carries both behind a strategy selected at construction.

mod first_seen;
mod scanner;

pub use first_seen::FirstSeenResolver;
pub use scanner::{PartitionScanner, ScanOutcome};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadPathStrategy {
    /// Segmented full-table scan with client-side filtering.
    Legacy,
    /// Per-hour partition range reads.
    Optimized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadPathConfig {
    #[serde(default = "default_strategy")]
    pub strategy: ReadPathStrategy,
    /// Fixed segment count for fallback scans.
    #[serde(default = "default_scan_segments")]
    pub scan_segments: u32,
    /// Raw record budget for limited scans, applied before time filtering.
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Concurrent in-flight bucket/segment reads per query.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Per store call; a unit that exceeds it is skipped, not retried.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// Per composed query; sub-operations are cancelled on expiry and the
    /// partial result is returned degraded.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_strategy() -> ReadPathStrategy {
    ReadPathStrategy::Optimized
}
fn default_scan_segments() -> u32 {
    8
}
fn default_scan_limit() -> u32 {
    300
}
fn default_page_size() -> u32 {
    100
}
fn default_max_concurrent() -> usize {
    8
}
fn default_call_timeout() -> u64 {
    5
}
fn default_query_timeout() -> u64 {
    30
}

impl Default for ReadPathConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            scan_segments: default_scan_segments(),
            scan_limit: default_scan_limit(),
            page_size: default_page_size(),
            max_concurrent: default_max_concurrent(),
            call_timeout_secs: default_call_timeout(),
            query_timeout_secs: default_query_timeout(),
        }
    }
}
