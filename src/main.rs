use anyhow::Result;
use perfview::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// One-shot reporter: `perfview` prints the dashboard overview as JSON,
/// `perfview <entity-id>` prints that entity's summary.
#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;

    let store = Arc::new(
        store::SqliteStore::connect(
            &app_config.store.path,
            app_config.store.max_pool_size,
            app_config.store.secondary_index,
        )
        .await?,
    );
    store.init().await?;

    let cache = Arc::new(cache::TieredCache::new(app_config.cache.clone()));
    let dashboard = dashboard::Dashboard::new(
        store,
        cache,
        app_config.read_path.clone(),
        app_config.dashboard.clone(),
    );

    let entity_arg = std::env::args().nth(1);
    match entity_arg {
        Some(entity_id) => {
            let summary = dashboard.entity_summary(&entity_id).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        None => {
            let overview = dashboard
                .overview()
                .await
                .map_err(|e| anyhow::anyhow!("dashboard overview: {}", e))?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
        }
    }

    Ok(())
}
