//! Relational statements
//!
//! A statement wraps a closure that runs against an `AnyConnection`. It runs
//! standalone (its own native transaction, committed or rolled back by the
//! closure's result) or inside a transaction handle supplied at execute
//! time, in which case the owner of that handle decides the outcome.

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::AnyConnection;

use crate::error::{Error, Result};
use crate::services::registry::DialectorRegistry;
use crate::transaction::{Context, StatementResult};

type Payload<T> =
    Box<dyn for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T, sqlx::Error>> + Send>;

/// Per-call options for [`Statement::execute`]
#[derive(Default)]
pub struct ExecuteOptions<'a> {
    transaction: Option<&'a mut AnyConnection>,
    context: Option<Context>,
}

impl<'a> ExecuteOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run inside an existing transaction instead of opening one
    pub fn with_transaction(mut self, conn: &'a mut AnyConnection) -> Self {
        self.transaction = Some(conn);
        self
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Unit of relational work, executed at most once
pub struct Statement<T = ()> {
    registry: DialectorRegistry,
    payload: Option<Payload<T>>,
    result: StatementResult<T>,
    context: Option<Context>,
    executed: bool,
}

impl<T: Send + Sync + 'static> Statement<T> {
    /// Build a statement from a closure.
    ///
    /// ```ignore
    /// let stmt = Statement::new(registry.clone(), move |conn| {
    ///     Box::pin(async move {
    ///         sqlx::query("DELETE FROM tags WHERE id = $1")
    ///             .bind(id)
    ///             .execute(conn)
    ///             .await?;
    ///         Ok(())
    ///     })
    /// });
    /// ```
    pub fn new<F>(registry: DialectorRegistry, payload: F) -> Self
    where
        F: for<'c> FnOnce(&'c mut AnyConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>
            + Send
            + 'static,
    {
        Self {
            registry,
            payload: Some(Box::new(payload)),
            result: StatementResult::new(),
            context: None,
            executed: false,
        }
    }

    /// Handle to the output cell; clone it before handing the statement off
    pub fn result(&self) -> StatementResult<T> {
        self.result.clone()
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub async fn execute(&mut self, options: ExecuteOptions<'_>) -> Result<()> {
        let ExecuteOptions {
            transaction,
            context,
        } = options;
        if context.is_some() {
            self.context = context;
        }

        if self.executed {
            return Err(Error::AlreadyExecuted);
        }
        self.executed = true;
        let payload = self.payload.take().ok_or(Error::AlreadyExecuted)?;

        let value = match transaction {
            Some(conn) => run(self.context.as_ref(), payload(conn)).await?,
            None => {
                let pool = self.registry.get()?;
                let mut tx = pool.begin().await.map_err(Error::begin)?;
                let outcome = run(self.context.as_ref(), payload(&mut *tx)).await;
                match outcome {
                    Ok(value) => {
                        tx.commit().await.map_err(Error::commit)?;
                        value
                    }
                    Err(e) => {
                        if let Err(rollback) = tx.rollback().await {
                            log::warn!("rollback after failed stmt: {}", rollback);
                        }
                        return Err(e);
                    }
                }
            }
        };

        self.result.set(value)
    }
}

async fn run<T>(
    context: Option<&Context>,
    work: BoxFuture<'_, Result<T, sqlx::Error>>,
) -> Result<T> {
    match context {
        Some(ctx) => tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(Error::Cancelled),
            outcome = work => outcome.map_err(Error::statement),
        },
        None => work.await.map_err(Error::statement),
    }
}

/// Type-erased statement, as queued to the transaction actor
#[async_trait]
pub(crate) trait Executable: Send {
    async fn execute_in(&mut self, conn: &mut AnyConnection, ctx: Context) -> Result<()>;
}

#[async_trait]
impl<T: Send + Sync + 'static> Executable for Statement<T> {
    async fn execute_in(&mut self, conn: &mut AnyConnection, ctx: Context) -> Result<()> {
        self.execute(
            ExecuteOptions::new()
                .with_transaction(conn)
                .with_context(ctx),
        )
        .await
    }
}
