//! Shared fixtures for the unit tests

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::AnyPool;
use tempfile::TempDir;

use crate::error::BatchClientError;
use crate::services::db;
use crate::transaction::batch::{BatchClient, ParameterizedStatement};

/// Open a SQLite pool in a fresh temporary directory with the blog schema.
///
/// Keep the returned directory alive for as long as the pool is used.
pub async fn sqlite_pool() -> (AnyPool, TempDir) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("blog.db").display());
    let pool = db::connect(&url, 4).await.expect("open sqlite pool");
    // readers must not block an open write transaction's commit
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await
        .expect("enable wal");
    db::ensure_schema(&pool).await.expect("create schema");
    (pool, dir)
}

/// Count rows of `table`
pub async fn count_rows(pool: &AnyPool, table: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("count rows");
    count
}

/// Batch client that records every call and optionally fails
#[derive(Default)]
pub struct RecordingClient {
    pub name: String,
    pub calls: Mutex<Vec<Vec<ParameterizedStatement>>>,
    pub fail_with: Option<String>,
    /// How long each call takes after recording its statements
    pub delay: Option<Duration>,
}

impl RecordingClient {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<ParameterizedStatement>> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl BatchClient for RecordingClient {
    async fn execute_transaction(
        &self,
        statements: Vec<ParameterizedStatement>,
    ) -> Result<(), BatchClientError> {
        self.calls.lock().expect("calls lock").push(statements);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

pub fn recording(client: &Arc<RecordingClient>) -> Arc<dyn BatchClient> {
    Arc::clone(client) as Arc<dyn BatchClient>
}
