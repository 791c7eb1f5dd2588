//! Batch statements
//!
//! A batch statement is a list of parameterized operations. Standalone, it
//! is sent to the store as one transactional call. Inside a transaction it
//! is only staged into the actor's [`Staging`] buffer and reaches the store
//! at commit.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BatchClientError, Error, Result};
use crate::services::registry::ClientRegistry;
use crate::transaction::{Context, StatementResult};

/// One parameterized operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterizedStatement {
    pub statement: String,
    pub parameters: Vec<serde_json::Value>,
}

impl ParameterizedStatement {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.push(value.into());
        self
    }
}

/// Store that applies a list of statements all-or-nothing
#[async_trait]
pub trait BatchClient: Send + Sync {
    async fn execute_transaction(
        &self,
        statements: Vec<ParameterizedStatement>,
    ) -> Result<(), BatchClientError>;
}

/// Operations staged by a batch transaction, applied together at commit
#[derive(Default)]
pub struct Staging {
    statements: Vec<ParameterizedStatement>,
    results: Vec<(StatementResult<usize>, usize)>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    fn stage(&mut self, statements: Vec<ParameterizedStatement>, result: StatementResult<usize>) {
        self.results.push((result, statements.len()));
        self.statements.extend(statements);
    }

    /// Split into the operations to send and the result cells to fill on success
    pub(crate) fn into_parts(
        self,
    ) -> (
        Vec<ParameterizedStatement>,
        Vec<(StatementResult<usize>, usize)>,
    ) {
        (self.statements, self.results)
    }
}

/// Per-call options for [`BatchStatement::execute`]
#[derive(Default)]
pub struct BatchExecuteOptions<'a> {
    staging: Option<&'a mut Staging>,
    context: Option<Context>,
}

impl<'a> BatchExecuteOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage into an open batch instead of applying immediately
    pub fn with_staging(mut self, staging: &'a mut Staging) -> Self {
        self.staging = Some(staging);
        self
    }

    pub fn with_context(mut self, ctx: Context) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Unit of batch work, executed at most once.
///
/// Its result is the number of operations applied, set only once they
/// have actually reached the store.
pub struct BatchStatement {
    registry: ClientRegistry,
    statements: Vec<ParameterizedStatement>,
    result: StatementResult<usize>,
    context: Option<Context>,
    executed: bool,
}

impl BatchStatement {
    pub fn new(registry: ClientRegistry, statements: Vec<ParameterizedStatement>) -> Self {
        Self {
            registry,
            statements,
            result: StatementResult::new(),
            context: None,
            executed: false,
        }
    }

    pub fn result(&self) -> StatementResult<usize> {
        self.result.clone()
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    pub fn statements(&self) -> &[ParameterizedStatement] {
        &self.statements
    }

    pub async fn execute(&mut self, options: BatchExecuteOptions<'_>) -> Result<()> {
        let BatchExecuteOptions { staging, context } = options;
        if context.is_some() {
            self.context = context;
        }

        if self.executed {
            return Err(Error::AlreadyExecuted);
        }
        self.executed = true;
        if self.context.as_ref().is_some_and(Context::is_cancelled) {
            return Err(Error::Cancelled);
        }

        let statements = std::mem::take(&mut self.statements);
        match staging {
            Some(staging) => {
                staging.stage(statements, self.result.clone());
                Ok(())
            }
            None => {
                let client = self.registry.get()?;
                let applied = statements.len();
                apply(client, statements, self.context.as_ref()).await?;
                self.result.set(applied)
            }
        }
    }
}

/// Send `statements` as one transactional call.
///
/// `context` is only checked before sending: once the call is out, the
/// store may apply it, so the outcome is awaited and reported as is.
pub(crate) async fn apply(
    client: Arc<dyn BatchClient>,
    statements: Vec<ParameterizedStatement>,
    context: Option<&Context>,
) -> Result<()> {
    let limit = crate::constants::MAX_BATCH_STATEMENTS;
    if statements.len() > limit {
        return Err(Error::BatchTooLarge {
            size: statements.len(),
            limit,
        });
    }
    if statements.is_empty() {
        return Ok(());
    }
    if context.is_some_and(Context::is_cancelled) {
        return Err(Error::Cancelled);
    }

    client
        .execute_transaction(statements)
        .await
        .map_err(Error::batch)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{RecordingClient, recording};

    fn put(id: &str) -> ParameterizedStatement {
        ParameterizedStatement::new("INSERT INTO tags (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(format!("tag {}", id))
            .bind(0)
    }

    #[tokio::test]
    async fn standalone_execute_sends_one_call() {
        let client = Arc::new(RecordingClient::default());
        let registry = ClientRegistry::with_handle(recording(&client));

        let mut stmt = BatchStatement::new(registry, vec![put("1"), put("2")]);
        let result = stmt.result();
        stmt.execute(BatchExecuteOptions::new()).await.expect("applied");

        assert_eq!(client.calls(), vec![vec![put("1"), put("2")]]);
        assert_eq!(result.strict_get().expect("set"), 2);
    }

    #[tokio::test]
    async fn second_execute_is_rejected() {
        let client = Arc::new(RecordingClient::default());
        let registry = ClientRegistry::with_handle(recording(&client));

        let mut stmt = BatchStatement::new(registry, vec![put("1")]);
        stmt.execute(BatchExecuteOptions::new()).await.expect("applied");
        assert!(matches!(
            stmt.execute(BatchExecuteOptions::new()).await,
            Err(Error::AlreadyExecuted)
        ));
        assert_eq!(client.calls().len(), 1);
    }

    #[tokio::test]
    async fn staging_defers_the_result() {
        let client = Arc::new(RecordingClient::default());
        let registry = ClientRegistry::with_handle(recording(&client));
        let mut staging = Staging::new();

        let mut stmt = BatchStatement::new(registry, vec![put("1")]);
        let result = stmt.result();
        stmt.execute(BatchExecuteOptions::new().with_staging(&mut staging))
            .await
            .expect("staged");

        assert_eq!(staging.len(), 1);
        assert!(client.calls().is_empty());
        assert!(!result.is_set());
    }

    #[tokio::test]
    async fn cancel_after_send_waits_for_the_store() {
        let client = Arc::new(RecordingClient::slow(Duration::from_millis(100)));
        let registry = ClientRegistry::with_handle(recording(&client));
        let ctx = Context::new();

        let mut stmt = BatchStatement::new(registry, vec![put("1")]);
        let result = stmt.result();
        let canceller = {
            let (ctx, client) = (ctx.clone(), Arc::clone(&client));
            tokio::spawn(async move {
                while client.calls().is_empty() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                ctx.cancel();
            })
        };

        stmt.execute(BatchExecuteOptions::new().with_context(ctx.clone()))
            .await
            .expect("applied despite late cancel");
        canceller.await.expect("canceller");
        assert!(ctx.is_cancelled());
        assert_eq!(result.strict_get().expect("set"), 1);
    }

    #[tokio::test]
    async fn cancelled_context_sends_nothing() {
        let client = Arc::new(RecordingClient::default());
        let registry = ClientRegistry::with_handle(recording(&client));
        let ctx = Context::new();
        ctx.cancel();

        let mut stmt = BatchStatement::new(registry, vec![put("1")]);
        assert!(matches!(
            stmt.execute(BatchExecuteOptions::new().with_context(ctx)).await,
            Err(Error::Cancelled)
        ));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_client_is_reported() {
        let mut stmt = BatchStatement::new(ClientRegistry::new(), vec![put("1")]);
        assert!(matches!(
            stmt.execute(BatchExecuteOptions::new()).await,
            Err(Error::ClientNotInitialized)
        ));
    }

    #[tokio::test]
    async fn oversized_batches_are_refused() {
        let client = Arc::new(RecordingClient::default());
        let registry = ClientRegistry::with_handle(recording(&client));
        let statements = (0..=crate::constants::MAX_BATCH_STATEMENTS)
            .map(|i| put(&i.to_string()))
            .collect();

        let mut stmt = BatchStatement::new(registry, statements);
        assert!(matches!(
            stmt.execute(BatchExecuteOptions::new()).await,
            Err(Error::BatchTooLarge { size: 101, limit: 100 })
        ));
        assert!(client.calls().is_empty());
    }
}
