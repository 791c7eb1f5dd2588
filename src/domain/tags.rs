//! Tag domain - statements for the tags table
//!
//! Functions build statements instead of running queries, so the caller
//! decides whether they run standalone or inside a transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::services::registry::{ClientRegistry, DialectorRegistry};
use crate::transaction::batch::{BatchStatement, ParameterizedStatement};
use crate::transaction::relational::Statement;

const INSERT_TAG: &str = "INSERT INTO tags (id, name, created_at) VALUES ($1, $2, $3)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

impl Tag {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Insert a tag
pub fn create_tag(registry: &DialectorRegistry, tag: &Tag) -> Statement {
    let tag = tag.clone();
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query(INSERT_TAG)
                .bind(tag.id)
                .bind(tag.name)
                .bind(tag.created_at)
                .execute(conn)
                .await?;
            Ok(())
        })
    })
}

/// Get a tag by ID
pub fn get_tag(registry: &DialectorRegistry, id: &str) -> Statement<Option<Tag>> {
    let id = id.to_string();
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query_as::<_, Tag>("SELECT id, name, created_at FROM tags WHERE id = $1")
                .bind(id)
                .fetch_optional(conn)
                .await
        })
    })
}

/// List tags ordered by name
pub fn list_tags(
    registry: &DialectorRegistry,
    limit: Option<i64>,
    offset: i64,
) -> Statement<Vec<Tag>> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query_as::<_, Tag>(
                r#"
                SELECT id, name, created_at
                FROM tags
                ORDER BY name ASC, id ASC
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(limit)
            .bind(offset.max(0))
            .fetch_all(conn)
            .await
        })
    })
}

/// Delete a tag and its article links, returning whether the tag existed
pub fn delete_tag(registry: &DialectorRegistry, id: &str) -> Statement<bool> {
    let id = id.to_string();
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query("DELETE FROM article_tags WHERE tag_id = $1")
                .bind(id.clone())
                .execute(&mut *conn)
                .await?;
            let result = sqlx::query("DELETE FROM tags WHERE id = $1")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    })
}

/// Insert a tag through the batch store
pub fn put_tag(registry: &ClientRegistry, tag: &Tag) -> BatchStatement {
    let statement = ParameterizedStatement::new(INSERT_TAG)
        .bind(tag.id.as_str())
        .bind(tag.name.as_str())
        .bind(tag.created_at);
    BatchStatement::new(registry.clone(), vec![statement])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::sqlite_pool;
    use crate::transaction::batch::{BatchExecuteOptions, SqlBatchClient};
    use crate::transaction::relational::ExecuteOptions;

    #[tokio::test]
    async fn create_then_get() {
        let (pool, _dir) = sqlite_pool().await;
        let registry = DialectorRegistry::with_handle(pool);
        let tag = Tag::new("rust", "Rust");

        create_tag(&registry, &tag)
            .execute(ExecuteOptions::new())
            .await
            .expect("insert");

        let mut get = get_tag(&registry, "rust");
        let found = get.result();
        get.execute(ExecuteOptions::new()).await.expect("select");
        assert_eq!(found.strict_get().expect("set"), Some(tag));

        let mut missing = get_tag(&registry, "go");
        let none = missing.result();
        missing.execute(ExecuteOptions::new()).await.expect("select");
        assert_eq!(none.strict_get().expect("set"), None);
    }

    #[tokio::test]
    async fn list_is_ordered_and_paged() {
        let (pool, _dir) = sqlite_pool().await;
        let registry = DialectorRegistry::with_handle(pool);
        for (id, name) in [("c", "Cargo"), ("a", "Async"), ("b", "Borrowing")] {
            create_tag(&registry, &Tag::new(id, name))
                .execute(ExecuteOptions::new())
                .await
                .expect("insert");
        }

        let mut page = list_tags(&registry, Some(2), 1);
        let tags = page.result();
        page.execute(ExecuteOptions::new()).await.expect("list");

        let names: Vec<String> = tags.get().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Borrowing", "Cargo"]);
    }

    #[tokio::test]
    async fn delete_reports_whether_the_tag_existed() {
        let (pool, _dir) = sqlite_pool().await;
        let registry = DialectorRegistry::with_handle(pool);
        create_tag(&registry, &Tag::new("rust", "Rust"))
            .execute(ExecuteOptions::new())
            .await
            .expect("insert");

        let mut first = delete_tag(&registry, "rust");
        let existed = first.result();
        first.execute(ExecuteOptions::new()).await.expect("delete");
        assert!(existed.get());

        let mut second = delete_tag(&registry, "rust");
        let existed = second.result();
        second.execute(ExecuteOptions::new()).await.expect("delete");
        assert!(!existed.get());
    }

    #[tokio::test]
    async fn put_tag_round_trips_through_the_batch_store() {
        let (pool, _dir) = sqlite_pool().await;
        let dialector = DialectorRegistry::with_handle(pool.clone());
        let client = ClientRegistry::with_handle(Arc::new(SqlBatchClient::new(pool)));
        let tag = Tag::new("rust", "Rust");

        put_tag(&client, &tag)
            .execute(BatchExecuteOptions::new())
            .await
            .expect("batch insert");

        let mut get = get_tag(&dialector, "rust");
        let found = get.result();
        get.execute(ExecuteOptions::new()).await.expect("select");
        assert_eq!(found.get(), Some(tag));
    }
}
