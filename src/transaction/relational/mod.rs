//! Incremental transactions over a relational pool
//!
//! The actor opens one native transaction and executes each submitted
//! statement immediately inside it. The submitter waits for its own
//! statement only. A failing statement rolls back everything executed so
//! far and ends the actor.

mod manager;
mod statement;

pub use manager::RelationalTransactionManager;
pub use statement::{ExecuteOptions, Statement};

use tokio::sync::{mpsc, oneshot};

use crate::constants::STATEMENT_QUEUE_CAPACITY;
use crate::error::{Error, Result};
use crate::services::registry::DialectorRegistry;
use crate::transaction::{ApplyMode, Context, Control, ErrorSubscription, Terminal, Transaction};
use statement::Executable;

const KIND: &str = "relational";

struct Submission {
    statement: Box<dyn Executable>,
    /// Submitter's context; cancelling it aborts this statement
    ctx: Context,
    ack: oneshot::Sender<Result<()>>,
}

/// Handle to a running relational transaction actor.
///
/// Share it behind an `Arc` to submit from several tasks. Dropping it
/// without a commit or rollback rolls the transaction back.
pub struct RelationalTransaction {
    statements: mpsc::Sender<Submission>,
    control: Control,
}

impl RelationalTransaction {
    pub(crate) fn start(registry: DialectorRegistry, ctx: Context) -> Result<Self> {
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

    /// Execute `statement` inside this transaction.
    ///
    /// Returns once the actor has run it: its writes are visible to later
    /// statements of the same transaction, and its result cell is set.
    ///
    /// Cancelling `ctx` while the statement waits in the queue skips it and
    /// leaves the transaction open. Cancelling it while the statement runs
    /// aborts the statement, which rolls the transaction back like any
    /// other failed statement. Either way this returns `Cancelled`.
    pub async fn execute_statement<T>(&self, ctx: &Context, statement: Statement<T>) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (ack, done) = oneshot::channel();
        let submission = Submission {
            statement: Box::new(statement),
            ctx: ctx.clone(),
            ack,
        };
        tokio::select! {
            _ = ctx.cancelled() => return Err(Error::Cancelled),
            sent = self.statements.send(submission) => sent.map_err(|_| Error::ActorClosed)?,
        }

        // once queued, the actor owns the statement; wait for it to finish
        done.await.map_err(|_| Error::ActorClosed)?
    }
}

impl Transaction for RelationalTransaction {
    fn apply_mode(&self) -> ApplyMode {
        ApplyMode::Incremental
    }

    fn commit(&self) -> Result<()> {
        self.control.signal(Terminal::Commit)
    }

    fn rollback(&self) -> Result<()> {
        self.control.signal(Terminal::Rollback)
    }

    fn subscribe_error(&self) -> Result<ErrorSubscription> {
        self.control.subscribe()
    }
}

async fn run(
    registry: DialectorRegistry,
    ctx: Context,
    mut queue: mpsc::Receiver<Submission>,
    mut terminal: oneshot::Receiver<Terminal>,
) -> Result<()> {
    let pool = registry.get()?;
    let mut tx = pool.begin().await.map_err(Error::begin)?;

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                log::debug!("{} transaction cancelled, rolling back", KIND);
                tx.rollback().await.map_err(Error::rollback)?;
                return Err(Error::Cancelled);
            }
            signal = &mut terminal => {
                return match signal {
                    Ok(Terminal::Commit) => {
                        log::debug!("{} transaction committing", KIND);
                        tx.commit().await.map_err(Error::commit)
                    }
                    Ok(Terminal::Rollback) => {
                        log::debug!("{} transaction rolling back", KIND);
                        tx.rollback().await.map_err(Error::rollback)
                    }
                    Err(_) => {
                        log::warn!("{} transaction abandoned, rolling back", KIND);
                        tx.rollback().await.map_err(Error::rollback)?;
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

                let outcome = tokio::select! {
                    biased;
                    _ = caller.cancelled() => Err(Error::Cancelled),
                    outcome = statement.execute_in(&mut *tx, ctx.clone()) => outcome,
                };
                let failure = outcome.as_ref().err().cloned();
                // the submitter may have given up waiting
                let _ = ack.send(outcome);

                if let Some(err) = failure {
                    if let Err(rollback) = tx.rollback().await {
                        log::warn!("rollback after failed stmt: {}", rollback);
                    }
                    return Err(err);
                }
            }
        }
    }
}
