//! Batch transactions over an all-or-nothing store
//!
//! The store only offers "apply these N statements atomically", so the
//! actor stages submitted statements in memory and sends them in a single
//! call at commit. Nothing is visible before that call succeeds, and a
//! rollback just discards what was staged.

mod manager;
mod sql_client;
mod statement;

pub use manager::BatchTransactionManager;
pub use sql_client::SqlBatchClient;
pub use statement::{
    BatchClient, BatchExecuteOptions, BatchStatement, ParameterizedStatement, Staging,
};

use tokio::sync::{mpsc, oneshot};

use crate::constants::STATEMENT_QUEUE_CAPACITY;
use crate::error::{Error, Result};
use crate::services::registry::ClientRegistry;
use crate::transaction::{ApplyMode, Context, Control, ErrorSubscription, Terminal, Transaction};

const KIND: &str = "batch";

struct Submission {
    statement: BatchStatement,
    /// Submitter's context; a statement cancelled before staging is skipped
    ctx: Context,
    ack: oneshot::Sender<Result<()>>,
}

/// Handle to a running batch transaction actor.
///
/// Share it behind an `Arc` to stage from several tasks. Dropping it
/// without a commit or rollback discards the staged statements.
pub struct BatchTransaction {
    statements: mpsc::Sender<Submission>,
    control: Control,
}

impl BatchTransaction {
    pub(crate) fn start(registry: ClientRegistry, ctx: Context) -> Result<Self> {
        let runtime = super::runtime()?;
        let (statements, queue) = mpsc::channel(STATEMENT_QUEUE_CAPACITY);
        let (control, terminal, reporter) = Control::new();

        runtime.spawn(async move {
            log::debug!("{} transaction starting", KIND);
            let summary = run(registry, ctx, queue, terminal).await;
            reporter.finish(KIND, summary).await;
        });

        Ok(Self {
            statements,
            control,
        })
    }

    /// Stage `statement` for the commit.
    ///
    /// Returns once the actor has accepted it. The statement is not applied
    /// yet: reads issued before the commit do not see it, and its result
    /// cell is only set after the batch succeeds.
    ///
    /// If `ctx` is cancelled before the actor stages the statement, the
    /// statement is skipped with `Cancelled`. The transaction stays open.
    pub async fn execute_statement(&self, ctx: &Context, statement: BatchStatement) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (ack, done) = oneshot::channel();
        tokio::select! {
            _ = ctx.cancelled() => return Err(Error::Cancelled),
            sent = self.statements.send(Submission { statement, ctx: ctx.clone(), ack }) => {
                sent.map_err(|_| Error::ActorClosed)?
            }
        }

        done.await.map_err(|_| Error::ActorClosed)?
    }
}

impl Transaction for BatchTransaction {
    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::Batch
    }

    fn commit(&self) -> Result<()> {
        self.control.signal(Terminal::Commit)
    }

    /// Discard everything staged so far.
    ///
    /// The store cannot undo an applied batch, so this only ever means
    /// "do not send".
    fn rollback(&self) -> Result<()> {
        self.control.signal(Terminal::Rollback)
    }

    fn subscribe_error(&self) -> Result<ErrorSubscription> {
        self.control.subscribe()
    }
}

async fn run(
    registry: ClientRegistry,
    ctx: Context,
    mut queue: mpsc::Receiver<Submission>,
    mut terminal: oneshot::Receiver<Terminal>,
) -> Result<()> {
    let client = registry.get()?;
    let mut staging = Staging::new();

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                log::debug!("{} transaction cancelled, discarding {} statements", KIND, staging.len());
                return Err(Error::Cancelled);
            }
            signal = &mut terminal => {
                return match signal {
                    Ok(Terminal::Commit) => {
                        log::debug!("{} transaction committing {} statements", KIND, staging.len());
                        let (statements, results) = staging.into_parts();
                        // the commit was accepted; a later cancel cannot recall the call
                        statement::apply(client, statements, None).await?;
                        for (result, applied) in results {
                            if let Err(e) = result.set(applied) {
                                log::warn!("staged statement result: {}", e);
                            }
                        }
                        Ok(())
                    }
                    Ok(Terminal::Rollback) => {
                        log::debug!("{} transaction discarding {} statements", KIND, staging.len());
                        Ok(())
                    }
                    Err(_) => {
                        log::warn!("{} transaction abandoned, discarding {} statements", KIND, staging.len());
                        Err(Error::Abandoned)
                    }
                };
            }
            Some(Submission { mut statement, ctx: caller, ack }) = queue.recv() => {
                if caller.is_cancelled() {
                    log::debug!("{} transaction skipping cancelled stmt", KIND);
                    let _ = ack.send(Err(Error::Cancelled));
                    continue;
                }

                let outcome = statement
                    .execute(
                        BatchExecuteOptions::new()
                            .with_staging(&mut staging)
                            .with_context(ctx.clone()),
                    )
                    .await;
                let failure = outcome.as_ref().err().cloned();
                let _ = ack.send(outcome);

                if let Some(err) = failure {
                    log::debug!("{} transaction discarding {} statements", KIND, staging.len());
                    return Err(err);
                }
            }
        }
    }
}
