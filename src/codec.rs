// Batch payload codec. [version: u8][wincode(Vec<Sample>)], whole payload
// zstd-compressed when the record's `compressed` flag is set.
// Decode failures skip the record, never fail the batch: producers may be
// mid-migration between formats.

use crate::models::{Sample, StoredRecord};

/// Payload layout version.
pub const BATCH_VERSION: u8 = 1;

/// Encode a sample batch the way the producer writes it. Used by seeding
/// and tests; the production write path lives outside this crate.
pub fn encode_batch(samples: &[Sample], compressed: bool) -> anyhow::Result<Vec<u8>> {
    let body =
        wincode::serialize(&samples.to_vec()).map_err(|e| anyhow::anyhow!("wincode: {}", e))?;
    let plain = with_version_prefix(BATCH_VERSION, body);
    if compressed {
        Ok(zstd::encode_all(plain.as_slice(), 0)?)
    } else {
        Ok(plain)
    }
}

/// Decode one stored record into its samples. Unknown versions, corrupt
/// compression frames, and malformed bodies all yield an empty vec.
pub fn decode_record(record: &StoredRecord) -> Vec<Sample> {
    let plain: Vec<u8> = if record.compressed {
        match zstd::decode_all(record.payload.as_slice()) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(record_id = %record.id, error = %e, "zstd decode failed, skipping record");
                return vec![];
            }
        }
    } else {
        record.payload.clone()
    };

    match blob_version(&plain) {
        BATCH_VERSION => {
            wincode::deserialize::<Vec<Sample>>(&plain[1..]).unwrap_or_else(|e| {
                tracing::debug!(record_id = %record.id, error = %e, "wincode deserialize failed, skipping record");
                vec![]
            })
        }
        v => {
            tracing::debug!(record_id = %record.id, version = v, "unknown payload version, skipping record");
            vec![]
        }
    }
}

/// Decode a batch of records, keeping a count of records dropped by the
/// decoder so callers can surface it.
pub fn decode_records(records: &[StoredRecord]) -> (Vec<Sample>, u64) {
    let mut samples = Vec::new();
    let mut dropped: u64 = 0;
    for record in records {
        let decoded = decode_record(record);
        if decoded.is_empty() && record.batch_size > 0 {
            dropped += 1;
        } else {
            samples.extend(decoded);
        }
    }
    (samples, dropped)
}

fn with_version_prefix(version: u8, payload: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(version);
    out.extend_from_slice(&payload);
    out
}

fn blob_version(bytes: &[u8]) -> u8 {
    if bytes.is_empty() { 0 } else { bytes[0] }
}
