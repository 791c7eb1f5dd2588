//! Crate-wide error type
//!
//! Errors are `Clone` because a single statement failure is reported twice:
//! once to the submitter and once on the transaction's error subscription.
//! Driver errors are therefore kept behind an `Arc`.

use std::sync::Arc;

use thiserror::Error;

/// Error returned by a [`crate::transaction::batch::BatchClient`].
pub type BatchClientError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("dialector is not initialized")]
    DialectorNotInitialized,

    #[error("batch client is not initialized")]
    ClientNotInitialized,

    #[error("statement already executed")]
    AlreadyExecuted,

    #[error("statement result read before it was set")]
    ResultNotSet,

    #[error("statement result already set")]
    ResultAlreadySet,

    #[error("failed to execute stmt: {0}")]
    Statement(#[source] Arc<sqlx::Error>),

    #[error("failed to execute batch: {0}")]
    Batch(#[source] Arc<dyn std::error::Error + Send + Sync>),

    #[error("batch of {size} statements exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("failed to begin transaction: {0}")]
    Begin(#[source] Arc<sqlx::Error>),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] Arc<sqlx::Error>),

    #[error("failed to rollback transaction: {0}")]
    Rollback(#[source] Arc<sqlx::Error>),

    #[error("transaction already received a commit or rollback")]
    AlreadyTerminated,

    #[error("error subscription already taken")]
    AlreadySubscribed,

    #[error("transaction actor is closed")]
    ActorClosed,

    #[error("transaction handle dropped without commit or rollback")]
    Abandoned,

    #[error("context cancelled")]
    Cancelled,

    #[error("no tokio runtime available to start the transaction")]
    NoRuntime,

    #[error("failed to connect to database: {0}")]
    Connect(#[source] Arc<sqlx::Error>),
}

impl Error {
    pub fn statement(err: sqlx::Error) -> Self {
        Error::Statement(Arc::new(err))
    }

    pub fn batch(err: BatchClientError) -> Self {
        Error::Batch(Arc::from(err))
    }

    pub fn begin(err: sqlx::Error) -> Self {
        Error::Begin(Arc::new(err))
    }

    pub fn commit(err: sqlx::Error) -> Self {
        Error::Commit(Arc::new(err))
    }

    pub fn rollback(err: sqlx::Error) -> Self {
        Error::Rollback(Arc::new(err))
    }

    pub fn connect(err: sqlx::Error) -> Self {
        Error::Connect(Arc::new(err))
    }

    /// The driver error behind a failed statement, if any.
    pub fn as_sqlx(&self) -> Option<&sqlx::Error> {
        match self {
            Error::Statement(e)
            | Error::Begin(e)
            | Error::Commit(e)
            | Error::Rollback(e)
            | Error::Connect(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
