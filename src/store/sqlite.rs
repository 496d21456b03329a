// SQLite MetricStore backend. Records are keyed by a rendered partition
// string plus a minute sort key; the autoincrement seq doubles as the
// segment discriminator (seq % total_segments) and the scan continuation
// token. The secondary (entity, timestamp) index can be disabled to mirror
// deployments where it was never provisioned.

use super::{Consistency, MetricStore, ScanPage, StoreError};
use crate::models::{FirstSeenRecord, LatestMarker, StoredRecord};
use crate::partition::{self, PartitionKey};
use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct SqliteStore {
    pool: SqlitePool,
    secondary_index: bool,
}

impl SqliteStore {
    pub async fn connect(
        path: &str,
        max_pool_size: u32,
        secondary_index: bool,
    ) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self {
            pool,
            secondary_index,
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metric_records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id TEXT NOT NULL UNIQUE,
                entity_id TEXT NOT NULL,
                partition_key TEXT NOT NULL,
                minute_ts INTEGER NOT NULL,
                record_ts REAL NOT NULL,
                start_time REAL NOT NULL,
                end_time REAL NOT NULL,
                batch_size INTEGER NOT NULL,
                payload BLOB NOT NULL,
                compressed INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_records_partition ON metric_records(partition_key, minute_ts)",
        )
        .execute(&self.pool)
        .await?;

        if self.secondary_index {
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_records_entity_ts ON metric_records(entity_id, record_ts)",
            )
            .execute(&self.pool)
            .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS latest_markers (
                marker_key TEXT PRIMARY KEY,
                entity_id TEXT NOT NULL,
                latest_ts REAL NOT NULL,
                latest_record_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS entity_metadata (
                entity_id TEXT PRIMARY KEY,
                first_seen REAL NOT NULL,
                last_updated REAL NOT NULL,
                total_records INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn parse_record_row(row: &SqliteRow) -> Result<StoredRecord, StoreError> {
        let id: String = row.try_get("record_id").map_err(map_sqlx)?;
        let entity_id: String = row.try_get("entity_id").map_err(map_sqlx)?;
        let timestamp: f64 = row.try_get("record_ts").map_err(map_sqlx)?;
        let start_time: f64 = row.try_get("start_time").map_err(map_sqlx)?;
        let end_time: f64 = row.try_get("end_time").map_err(map_sqlx)?;
        let batch_size: i64 = row.try_get("batch_size").map_err(map_sqlx)?;
        let payload: Vec<u8> = row.try_get("payload").map_err(map_sqlx)?;
        let compressed: bool = row.try_get("compressed").map_err(map_sqlx)?;
        Ok(StoredRecord {
            id,
            entity_id,
            timestamp,
            start_time,
            end_time,
            batch_size: batch_size as u32,
            payload,
            compressed,
        })
    }
}

const RECORD_COLUMNS: &str = "seq, record_id, entity_id, record_ts, start_time, end_time, batch_size, payload, compressed";

#[async_trait]
impl MetricStore for SqliteStore {
    #[instrument(skip(self), fields(repo = "store", operation = "query_partition", partition = %key.render()))]
    async fn query_partition(
        &self,
        key: &PartitionKey,
        since_minute: i64,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM metric_records
             WHERE partition_key = $1 AND minute_ts >= $2 ORDER BY minute_ts ASC"
        ))
        .bind(key.render())
        .bind(since_minute)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(Self::parse_record_row).collect()
    }

    #[instrument(skip(self), fields(repo = "store", operation = "scan_segment", segment, total_segments))]
    async fn scan_segment(
        &self,
        segment: u32,
        total_segments: u32,
        entity_id: Option<&str>,
        start_token: Option<i64>,
        page_size: u32,
    ) -> Result<ScanPage, StoreError> {
        if total_segments == 0 || segment >= total_segments {
            return Err(StoreError::Backend(format!(
                "segment {} out of range for {} segments",
                segment, total_segments
            )));
        }
        let after = start_token.unwrap_or(0);
        let rows = if let Some(entity) = entity_id {
            sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM metric_records
                 WHERE seq % $1 = $2 AND seq > $3 AND entity_id = $4
                 ORDER BY seq ASC LIMIT $5"
            ))
            .bind(total_segments as i64)
            .bind(segment as i64)
            .bind(after)
            .bind(entity)
            .bind(page_size as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM metric_records
                 WHERE seq % $1 = $2 AND seq > $3
                 ORDER BY seq ASC LIMIT $4"
            ))
            .bind(total_segments as i64)
            .bind(segment as i64)
            .bind(after)
            .bind(page_size as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(map_sqlx)?;

        let next_token = if rows.len() == page_size as usize {
            match rows.last() {
                Some(row) => Some(row.try_get::<i64, _>("seq").map_err(map_sqlx)?),
                None => None,
            }
        } else {
            None
        };
        let records = rows
            .iter()
            .map(Self::parse_record_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScanPage {
            records,
            next_token,
        })
    }

    // SQLite reads are always strongly consistent; the hint is part of the
    // wide-column contract and ignored here.
    async fn get_marker(
        &self,
        marker_key: &str,
        _consistency: Consistency,
    ) -> Result<Option<LatestMarker>, StoreError> {
        let row = sqlx::query(
            "SELECT entity_id, latest_ts, latest_record_id FROM latest_markers WHERE marker_key = $1",
        )
        .bind(marker_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(LatestMarker {
            entity_id: row.try_get("entity_id").map_err(map_sqlx)?,
            latest_timestamp: row.try_get("latest_ts").map_err(map_sqlx)?,
            latest_record_id: row.try_get("latest_record_id").map_err(map_sqlx)?,
        }))
    }

    async fn put_marker(
        &self,
        marker_key: &str,
        marker: &LatestMarker,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO latest_markers (marker_key, entity_id, latest_ts, latest_record_id)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(marker_key)
        .bind(&marker.entity_id)
        .bind(marker.latest_timestamp)
        .bind(&marker.latest_record_id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn earliest_for_entity(&self, entity_id: &str) -> Result<Option<f64>, StoreError> {
        if !self.secondary_index {
            return Err(StoreError::MissingIndex(
                "entity-timestamp index not provisioned".into(),
            ));
        }
        let row = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT MIN(record_ts) FROM metric_records WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(row)
    }

    async fn get_first_seen(
        &self,
        entity_id: &str,
    ) -> Result<Option<FirstSeenRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT first_seen, last_updated, total_records FROM entity_metadata WHERE entity_id = $1",
        )
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let total_records: i64 = row.try_get("total_records").map_err(map_sqlx)?;
        Ok(Some(FirstSeenRecord {
            entity_id: entity_id.to_string(),
            first_seen: row.try_get("first_seen").map_err(map_sqlx)?,
            last_updated: row.try_get("last_updated").map_err(map_sqlx)?,
            total_records: total_records as u64,
        }))
    }

    #[instrument(skip(self), fields(repo = "store", operation = "put_first_seen_if_lower"))]
    async fn put_first_seen_if_lower(&self, entity_id: &str, ts: f64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO entity_metadata (entity_id, first_seen, last_updated, total_records)
            VALUES ($1, $2, $2, 1)
            ON CONFLICT(entity_id) DO UPDATE SET
                first_seen = MIN(first_seen, excluded.first_seen),
                last_updated = excluded.last_updated,
                total_records = total_records + 1
            "#,
        )
        .bind(entity_id)
        .bind(ts)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn known_entities(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT entity_id FROM entity_metadata
             UNION SELECT DISTINCT entity_id FROM metric_records
             ORDER BY entity_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(rows)
    }

    #[instrument(skip(self, record), fields(repo = "store", operation = "put_record", record_id = %record.id))]
    async fn put_record(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let key = partition::bucket_key(&record.entity_id, record.timestamp);
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO metric_records
            (record_id, entity_id, partition_key, minute_ts, record_ts,
             start_time, end_time, batch_size, payload, compressed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&record.id)
        .bind(&record.entity_id)
        .bind(key.render())
        .bind(partition::minute_floor(record.timestamp))
        .bind(record.timestamp)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.batch_size as i64)
        .bind(&record.payload)
        .bind(record.compressed)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable(e.to_string()),
        other => StoreError::Backend(other.to_string()),
    }
}
