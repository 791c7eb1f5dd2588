//! Batch client backed by a SQL pool
//!
//! Applies a batch by running every statement inside one native
//! transaction, which gives the same all-or-nothing contract as a
//! transactional key-value store.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::{Any, AnyPool};

use crate::error::BatchClientError;

use super::{BatchClient, ParameterizedStatement};

#[derive(Debug, Clone)]
pub struct SqlBatchClient {
    pool: AnyPool,
}

impl SqlBatchClient {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchClient for SqlBatchClient {
    async fn execute_transaction(
        &self,
        statements: Vec<ParameterizedStatement>,
    ) -> Result<(), BatchClientError> {
        let mut tx = self.pool.begin().await?;

        for stmt in &statements {
            let query = stmt
                .parameters
                .iter()
                .try_fold(sqlx::query(&stmt.statement), bind_value)?;
            // dropping `tx` on error rolls the whole batch back
            query.execute(&mut *tx).await?;
        }

        tx.commit().await?;
        log::debug!("applied batch of {} statements", statements.len());
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
) -> Result<Query<'q, Any, AnyArguments<'q>>, BatchClientError> {
    let query = match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => query.bind(i),
            (None, Some(f)) if n.is_f64() => query.bind(f),
            // u64 above i64::MAX has no lossless SQL binding
            _ => return Err(format!("integer parameter out of range: {}", n).into()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    };
    Ok(query)
}
