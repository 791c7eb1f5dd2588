//! Transaction coordination
//!
//! A transaction is a dedicated tokio task (the actor) that owns one native
//! transaction or batch. Call sites submit statements through a cloneable
//! queue, and exactly one terminal signal (commit or rollback) ends the
//! actor. The actor reports one summary value on the error subscription
//! and then closes it.
//!
//! Two backends share the control surface in [`Transaction`] but differ in
//! when statements take effect:
//!
//! - [`relational`]: each statement runs as soon as it is submitted, inside
//!   one long-lived native transaction ([`ApplyMode::Incremental`]).
//! - [`batch`]: statements are staged and applied as one atomic call at
//!   commit time ([`ApplyMode::Batch`]).
//!
//! The statement types are distinct per backend, so code written against
//! the incremental backend cannot be handed a batch transaction.

pub mod batch;
pub mod relational;
pub mod result;

use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context as TaskContext, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub use result::{StatementResult, StatementResults};

/// Cancellation scope bound to statements and transactions
pub type Context = CancellationToken;

/// When submitted statements take effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Applied on submission; later statements see earlier writes
    Incremental,
    /// Applied together at commit; nothing is visible before
    Batch,
}

/// Control surface shared by both backends
pub trait Transaction: Send + Sync {
    fn apply_mode(&self) -> ApplyMode;

    /// Ask the actor to commit.
    ///
    /// Returns once the signal is delivered; the outcome arrives on the
    /// error subscription.
    fn commit(&self) -> Result<()>;

    /// Ask the actor to roll back
    fn rollback(&self) -> Result<()>;

    /// Take the error subscription. Only one subscriber is allowed.
    fn subscribe_error(&self) -> Result<ErrorSubscription>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminal {
    Commit,
    Rollback,
}

/// Caller half of the terminal and error channels
pub(crate) struct Control {
    terminal: Mutex<Option<oneshot::Sender<Terminal>>>,
    errors: Mutex<Option<mpsc::Receiver<Result<()>>>>,
}

/// Actor side of the error channel
pub(crate) struct ErrorReporter {
    errors: mpsc::Sender<Result<()>>,
}

impl Control {
    pub(crate) fn new() -> (Self, oneshot::Receiver<Terminal>, ErrorReporter) {
        let (terminal_tx, terminal_rx) = oneshot::channel();
        // one summary per transaction, so a single slot never blocks the actor
        let (errors_tx, errors_rx) = mpsc::channel(1);

        let control = Self {
            terminal: Mutex::new(Some(terminal_tx)),
            errors: Mutex::new(Some(errors_rx)),
        };
        (control, terminal_rx, ErrorReporter { errors: errors_tx })
    }

    pub(crate) fn signal(&self, terminal: Terminal) -> Result<()> {
        let sender = self
            .terminal
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(Error::AlreadyTerminated)?;

        sender.send(terminal).map_err(|_| Error::ActorClosed)
    }

    pub(crate) fn subscribe(&self) -> Result<ErrorSubscription> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .map(|rx| ErrorSubscription { rx })
            .ok_or(Error::AlreadySubscribed)
    }
}

impl ErrorReporter {
    /// Publish the terminal summary and close the error channel
    pub(crate) async fn finish(self, kind: &str, summary: Result<()>) {
        match &summary {
            Ok(()) => log::debug!("{} transaction finished", kind),
            Err(e) => log::error!("{} transaction failed: {}", kind, e),
        }
        // the subscriber may already be gone; the summary is logged either way
        let _ = self.errors.send(summary).await;
    }
}

/// Receiving end of a transaction's error channel.
///
/// Yields at most one summary value and then ends once the actor has shut
/// down. Drain it to learn the outcome of a commit or rollback.
pub struct ErrorSubscription {
    rx: mpsc::Receiver<Result<()>>,
}

impl ErrorSubscription {
    pub async fn recv(&mut self) -> Option<Result<()>> {
        self.rx.recv().await
    }

    /// Drain to closure and return the terminal summary
    pub async fn outcome(mut self) -> Result<()> {
        let mut outcome = Ok(());
        while let Some(summary) = self.rx.recv().await {
            outcome = summary;
        }
        outcome
    }
}

impl Stream for ErrorSubscription {
    type Item = Result<()>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Spawn handle for a new actor, or `NoRuntime` outside tokio
pub(crate) fn runtime() -> Result<tokio::runtime::Handle> {
    tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)
}
