//! Article domain - statements for articles and their tag links

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::services::error::LogErr;
use crate::services::registry::DialectorRegistry;
use crate::transaction::relational::{RelationalTransactionManager, Statement};
use crate::transaction::{Context, Transaction};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub body: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

impl Article {
    pub fn new(id: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: body.into(),
            created_at: Utc::now().timestamp_millis(),
        }
    }
}

/// Insert an article
pub fn create_article(registry: &DialectorRegistry, article: &Article) -> Statement {
    let article = article.clone();
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query(
                r#"
                INSERT INTO articles (id, title, body, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(article.id)
            .bind(article.title)
            .bind(article.body)
            .bind(article.created_at)
            .execute(conn)
            .await?;
            Ok(())
        })
    })
}

/// Get an article by ID
pub fn get_article(registry: &DialectorRegistry, id: &str) -> Statement<Option<Article>> {
    let id = id.to_string();
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query_as::<_, Article>(
                "SELECT id, title, body, created_at FROM articles WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(conn)
            .await
        })
    })
}

/// Link an article to a tag
pub fn attach_tag(registry: &DialectorRegistry, article_id: &str, tag_id: &str) -> Statement {
    let (article_id, tag_id) = (article_id.to_string(), tag_id.to_string());
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query("INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2)")
                .bind(article_id)
                .bind(tag_id)
                .execute(conn)
                .await?;
            Ok(())
        })
    })
}

/// List articles carrying a tag, newest first
pub fn list_articles_by_tag(
    registry: &DialectorRegistry,
    tag_id: &str,
    limit: Option<i64>,
    offset: i64,
) -> Statement<Vec<Article>> {
    let tag_id = tag_id.to_string();
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    Statement::new(registry.clone(), move |conn| {
        Box::pin(async move {
            sqlx::query_as::<_, Article>(
                r#"
                SELECT a.id, a.title, a.body, a.created_at
                FROM articles a
                JOIN article_tags t ON t.article_id = a.id
                WHERE t.tag_id = $1
                ORDER BY a.created_at DESC, a.id ASC
                LIMIT $2 OFFSET $3
                "#,
            )
            .bind(tag_id)
            .bind(limit)
            .bind(offset.max(0))
            .fetch_all(conn)
            .await
        })
    })
}

/// Write an article and its tag links in one transaction.
///
/// Either everything is stored or nothing is; the returned error is the
/// first failure observed.
pub async fn publish_article(
    manager: &RelationalTransactionManager,
    ctx: &Context,
    article: &Article,
    tag_ids: &[String],
) -> Result<()> {
    let registry = manager.registry();
    let tx = manager.get_and_start(ctx)?;
    let errors = tx.subscribe_error()?;

    let submitted = async {
        tx.execute_statement(ctx, create_article(registry, article))
            .await?;
        for tag_id in tag_ids {
            tx.execute_statement(ctx, attach_tag(registry, &article.id, tag_id))
                .await?;
        }
        tx.commit()
    }
    .await;

    if let Err(e) = submitted {
        // already terminated if the actor aborted on the failing statement
        let _ = tx.rollback();
        let summary = errors.outcome().await;
        // a closed actor only tells us it is gone; its summary says why
        let cause = match (e, summary) {
            (Error::ActorClosed, Err(cause)) => cause,
            (e, _) => e,
        };
        return Err(cause).log_err("publish article");
    }

    errors.outcome().await.log_err("publish article commit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tags::{Tag, create_tag};
    use crate::test_support::{count_rows, sqlite_pool};
    use crate::transaction::relational::ExecuteOptions;

    async fn seed_tags(registry: &DialectorRegistry, ids: &[&str]) {
        for id in ids {
            create_tag(registry, &Tag::new(*id, id.to_uppercase()))
                .execute(ExecuteOptions::new())
                .await
                .expect("seed tag");
        }
    }

    #[tokio::test]
    async fn publish_stores_article_and_links() {
        let (pool, _dir) = sqlite_pool().await;
        let manager = RelationalTransactionManager::from_pool(pool.clone());
        seed_tags(manager.registry(), &["rust", "async"]).await;

        let article = Article::new("a1", "Actors in Rust", "Channels all the way down");
        publish_article(
            &manager,
            &Context::new(),
            &article,
            &["rust".to_string(), "async".to_string()],
        )
        .await
        .expect("publish");

        let mut get = get_article(manager.registry(), "a1");
        let found = get.result();
        get.execute(ExecuteOptions::new()).await.expect("select");
        assert_eq!(found.get(), Some(article.clone()));

        let mut by_tag = list_articles_by_tag(manager.registry(), "async", None, 0);
        let listed = by_tag.result();
        by_tag.execute(ExecuteOptions::new()).await.expect("list");
        assert_eq!(listed.get(), vec![article]);
    }

    #[tokio::test]
    async fn unknown_tag_rolls_back_the_article() {
        let (pool, _dir) = sqlite_pool().await;
        let manager = RelationalTransactionManager::from_pool(pool.clone());
        seed_tags(manager.registry(), &["rust"]).await;

        let article = Article::new("a1", "Dangling", "references a missing tag");
        let err = publish_article(
            &manager,
            &Context::new(),
            &article,
            &["rust".to_string(), "missing".to_string()],
        )
        .await
        .expect_err("foreign key violation");

        assert!(matches!(err, Error::Statement(_)));
        assert_eq!(count_rows(&pool, "articles").await, 0);
        assert_eq!(count_rows(&pool, "article_tags").await, 0);
    }

    #[tokio::test]
    async fn missing_dialector_is_reported_as_the_cause() {
        let manager = RelationalTransactionManager::new(DialectorRegistry::new());

        let err = publish_article(
            &manager,
            &Context::new(),
            &Article::new("a1", "t", "b"),
            &[],
        )
        .await
        .expect_err("no pool registered");
        assert!(matches!(err, Error::DialectorNotInitialized));
    }

    #[tokio::test]
    async fn cancelled_context_publishes_nothing() {
        let (pool, _dir) = sqlite_pool().await;
        let manager = RelationalTransactionManager::from_pool(pool.clone());
        let ctx = Context::new();
        ctx.cancel();

        let err = publish_article(&manager, &ctx, &Article::new("a1", "t", "b"), &[])
            .await
            .expect_err("cancelled");
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(count_rows(&pool, "articles").await, 0);
    }
}
