// Latest-marker adapter: O(1) freshness checks at a content-addressed key.
//
// The key is a truncated Sha256 of the entity id (64 bits rendered as 16 hex
// chars). For the expected scale of at most a few thousand entities the
// collision probability is about n^2 / 2^65 — negligible, and a deliberate
// tradeoff against provisioning a real secondary index.

use crate::models::LatestMarker;
use crate::store::{Consistency, MetricStore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hash-derived storage key for an entity's marker record.
pub fn marker_key(entity_id: &str) -> String {
    let digest = Sha256::digest(entity_id.as_bytes());
    let mut truncated = [0u8; 8];
    truncated.copy_from_slice(&digest[..8]);
    format!("marker#{:016x}", u64::from_be_bytes(truncated))
}

/// Read-only marker access. Store unavailability degrades to `None`
/// (treated as a cache miss upstream), never an error.
pub struct MarkerReader {
    store: Arc<dyn MetricStore>,
    // Digest once per entity; queries hit the same few ids repeatedly.
    key_cache: Mutex<HashMap<String, String>>,
}

impl MarkerReader {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            store,
            key_cache: Mutex::new(HashMap::new()),
        }
    }

    fn key_for(&self, entity_id: &str) -> String {
        let mut cache = self.key_cache.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(entity_id.to_string())
            .or_insert_with(|| marker_key(entity_id))
            .clone()
    }

    /// Strongly-consistent single-key read with one retry on transient
    /// failure. The marker is a hint: callers reconcile it against scanned
    /// data rather than trusting it as ground truth.
    pub async fn get_latest(&self, entity_id: &str) -> Option<LatestMarker> {
        let key = self.key_for(entity_id);
        match self.store.get_marker(&key, Consistency::Strong).await {
            Ok(marker) => marker,
            Err(e) if e.is_transient() => {
                tracing::debug!(entity_id, error = %e, "marker read failed, retrying once");
                match self.store.get_marker(&key, Consistency::Strong).await {
                    Ok(marker) => marker,
                    Err(e) => {
                        tracing::warn!(entity_id, error = %e, "marker read failed after retry");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "marker read failed");
                None
            }
        }
    }
}
