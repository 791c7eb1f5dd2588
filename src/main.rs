use std::sync::Arc;

use anyhow::Context as _;

use blog_core::config::Config;
use blog_core::logging;
use blog_core::services::db;
use blog_core::services::registry::{ClientRegistry, DialectorRegistry};
use blog_core::transaction::batch::{BatchClient, SqlBatchClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let config = Config::from_env();

    let pool = db::connect(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    db::ensure_schema(&pool)
        .await
        .context("Failed to apply schema")?;

    let batch_pool = if config.batch_database_url == config.database_url {
        pool.clone()
    } else {
        db::connect(&config.batch_database_url, config.max_connections)
            .await
            .context("Failed to connect to batch database")?
    };

    let dialector = DialectorRegistry::new();
    let client = ClientRegistry::new();
    dialector.initialize(pool);
    client.initialize(Arc::new(SqlBatchClient::new(batch_pool.clone())) as Arc<dyn BatchClient>);
    log::info!("registries initialized, schema up to date");

    client.invalidate();
    if let Some(pool) = dialector.invalidate() {
        pool.close().await;
    }
    batch_pool.close().await;
    log::info!("shutdown complete");
    Ok(())
}
