//! Error logging helpers

/// Extension trait for logging errors without changing them
pub trait LogErr<T, E> {
    /// Log the error with context at error level and pass it through
    fn log_err(self, context: &str) -> Result<T, E>;

    /// Log the error with context at warn level and pass it through
    fn log_warn(self, context: &str) -> Result<T, E>;
}

impl<T, E: std::fmt::Display> LogErr<T, E> for Result<T, E> {
    fn log_err(self, context: &str) -> Result<T, E> {
        self.inspect_err(|e| log::error!("{}: {}", context, e))
    }

    fn log_warn(self, context: &str) -> Result<T, E> {
        self.inspect_err(|e| log::warn!("{}: {}", context, e))
    }
}
