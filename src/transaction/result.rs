//! Output cells written by statements

use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};

/// Single-write output cell populated by a statement.
///
/// The caller keeps a clone, hands the statement to a transaction and reads
/// the value back once the statement has run. Writes are first-wins: a
/// second `set` is rejected and leaves the stored value untouched.
#[derive(Debug)]
pub struct StatementResult<T> {
    cell: Arc<OnceLock<T>>,
}

/// Multi-slot variant for statements producing rows
pub type StatementResults<T> = StatementResult<Vec<T>>;

impl<T> StatementResult<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceLock::new()),
        }
    }

    pub fn set(&self, value: T) -> Result<()> {
        self.cell.set(value).map_err(|_| Error::ResultAlreadySet)
    }

    pub fn is_set(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Borrow the value, failing if the statement never produced it
    pub fn strict_get_ref(&self) -> Result<&T> {
        self.cell.get().ok_or(Error::ResultNotSet)
    }
}

impl<T: Clone> StatementResult<T> {
    pub fn strict_get(&self) -> Result<T> {
        self.strict_get_ref().cloned()
    }
}

impl<T: Clone + Default> StatementResult<T> {
    /// The stored value, or `T::default()` if nothing was written
    pub fn get(&self) -> T {
        self.cell.get().cloned().unwrap_or_default()
    }
}

impl<T> Clone for StatementResult<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> Default for StatementResult<T> {
    fn default() -> Self {
        Self::new()
    }
}
