use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::dashboard::DashboardConfig;
use crate::read_path::ReadPathConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub read_path: ReadPathConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: String,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    /// Whether the entity-timestamp secondary index is provisioned. When
    /// false, first-seen lookups fall back to scan-based discovery.
    #[serde(default = "default_secondary_index")]
    pub secondary_index: bool,
}

fn default_max_pool_size() -> u32 {
    10
}

fn default_secondary_index() -> bool {
    true
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.store.path.is_empty(), "store.path must be non-empty");
        anyhow::ensure!(
            self.store.max_pool_size > 0,
            "store.max_pool_size must be > 0, got {}",
            self.store.max_pool_size
        );
        anyhow::ensure!(
            self.read_path.scan_segments > 0,
            "read_path.scan_segments must be > 0, got {}",
            self.read_path.scan_segments
        );
        anyhow::ensure!(
            self.read_path.scan_limit > 0,
            "read_path.scan_limit must be > 0, got {}",
            self.read_path.scan_limit
        );
        anyhow::ensure!(
            self.read_path.page_size > 0,
            "read_path.page_size must be > 0, got {}",
            self.read_path.page_size
        );
        anyhow::ensure!(
            self.read_path.max_concurrent > 0,
            "read_path.max_concurrent must be > 0, got {}",
            self.read_path.max_concurrent
        );
        anyhow::ensure!(
            self.read_path.call_timeout_secs > 0,
            "read_path.call_timeout_secs must be > 0, got {}",
            self.read_path.call_timeout_secs
        );
        anyhow::ensure!(
            self.read_path.query_timeout_secs > 0,
            "read_path.query_timeout_secs must be > 0, got {}",
            self.read_path.query_timeout_secs
        );
        anyhow::ensure!(
            self.cache.fresh_window_secs > 0,
            "cache.fresh_window_secs must be > 0, got {}",
            self.cache.fresh_window_secs
        );
        anyhow::ensure!(
            self.cache.cold_ttl_secs > 0,
            "cache.cold_ttl_secs must be > 0, got {}",
            self.cache.cold_ttl_secs
        );
        anyhow::ensure!(
            self.dashboard.window_hours > 0,
            "dashboard.window_hours must be > 0, got {}",
            self.dashboard.window_hours
        );
        anyhow::ensure!(
            self.dashboard.online_threshold_secs > 0,
            "dashboard.online_threshold_secs must be > 0, got {}",
            self.dashboard.online_threshold_secs
        );
        anyhow::ensure!(
            self.dashboard.max_entities > 0,
            "dashboard.max_entities must be > 0, got {}",
            self.dashboard.max_entities
        );
        Ok(())
    }
}
