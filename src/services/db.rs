//! Database connection and schema utilities
//!
//! Pools are opened through sqlx's `Any` driver so the same statements run
//! against Postgres in production and SQLite in tests. Query modules write
//! positional `$N` placeholders, which both engines accept.
//!
//! # Usage Pattern
//!
//! ```ignore
//! let pool = db::connect(&config.database_url, config.max_connections).await?;
//! db::ensure_schema(&pool).await?;
//!
//! let dialector = DialectorRegistry::new();
//! dialector.initialize(pool);
//! ```

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;

use crate::error::{Error, Result};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_tags (
        article_id TEXT NOT NULL REFERENCES articles (id),
        tag_id TEXT NOT NULL REFERENCES tags (id),
        PRIMARY KEY (article_id, tag_id)
    )
    "#,
];

/// Open a connection pool for `url` (postgres:// or sqlite://)
pub async fn connect(url: &str, max_connections: u32) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    AnyPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(Error::connect)
}

/// Create the blog tables if they do not exist yet
pub async fn ensure_schema(pool: &AnyPool) -> Result<()> {
    for ddl in SCHEMA {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(Error::statement)?;
    }
    log::info!("schema ready ({} tables)", SCHEMA.len());
    Ok(())
}
