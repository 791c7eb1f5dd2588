//! Application constants

/// Pending submissions a transaction actor buffers before senders wait
pub const STATEMENT_QUEUE_CAPACITY: usize = 1;

/// Maximum statements accepted by a single transactional batch call
pub const MAX_BATCH_STATEMENTS: usize = 100;

/// Default page size for list queries
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Maximum page size for list queries
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default connection pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
