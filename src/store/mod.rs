// Backing store contract for the read path. The trait models the
// wide-column operations the engine consumes: partition range reads,
// segmented full scans with continuation tokens, single-key marker reads
// with a per-call consistency mode, and the entity metadata table.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::models::{FirstSeenRecord, LatestMarker, StoredRecord};
use crate::partition::PartitionKey;
use async_trait::async_trait;

/// Store failure taxonomy (see the error-handling policy in `read_path`):
/// transient failures are retried once for single-key reads and skipped for
/// scan units; a missing index is a permanent condition for the deployment.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("throttled: {0}")]
    Throttled(String),
    #[error("index not provisioned: {0}")]
    MissingIndex(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Transient errors are worth one retry on single-key reads.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Throttled(_))
    }
}

/// Per-call read consistency. Marker reads use `Strong`; everything else
/// defaults to `Eventual`. Backends that are always strongly consistent
/// may ignore the hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Eventual,
    Strong,
}

/// One page of a segmented scan. `next_token` is an opaque continuation
/// cursor; `None` means the segment is exhausted.
#[derive(Debug)]
pub struct ScanPage {
    pub records: Vec<StoredRecord>,
    pub next_token: Option<i64>,
}

#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Range read over one hour partition: records with a minute sort key
    /// `>= since_minute`, ascending.
    async fn query_partition(
        &self,
        key: &PartitionKey,
        since_minute: i64,
    ) -> Result<Vec<StoredRecord>, StoreError>;

    /// One page of segment `segment` of `total_segments`, optionally
    /// filtered to a single entity. Segments partition the table disjointly.
    async fn scan_segment(
        &self,
        segment: u32,
        total_segments: u32,
        entity_id: Option<&str>,
        start_token: Option<i64>,
        page_size: u32,
    ) -> Result<ScanPage, StoreError>;

    /// Single-key marker read at a precomputed hash-derived key.
    async fn get_marker(
        &self,
        marker_key: &str,
        consistency: Consistency,
    ) -> Result<Option<LatestMarker>, StoreError>;

    /// Producer-side marker write (idempotent replace).
    async fn put_marker(&self, marker_key: &str, marker: &LatestMarker)
    -> Result<(), StoreError>;

    /// Earliest record timestamp for an entity via the secondary index.
    /// `MissingIndex` when the deployment has no such index.
    async fn earliest_for_entity(&self, entity_id: &str) -> Result<Option<f64>, StoreError>;

    /// Metadata table point-get.
    async fn get_first_seen(&self, entity_id: &str)
    -> Result<Option<FirstSeenRecord>, StoreError>;

    /// Metadata upsert with update-if-lower semantics: first_seen only ever
    /// decreases, the record counter only ever increases.
    async fn put_first_seen_if_lower(&self, entity_id: &str, ts: f64) -> Result<(), StoreError>;

    /// Distinct entity ids known to the store (metadata plus record table).
    async fn known_entities(&self) -> Result<Vec<String>, StoreError>;

    /// Producer-side record append (idempotent on record id).
    async fn put_record(&self, record: &StoredRecord) -> Result<(), StoreError>;
}
