//! Blog backend core
//!
//! Coordinates units of database work ("statements") against a single
//! transaction owned by a dedicated task, over two backends:
//!
//! - a relational pool, where statements apply immediately inside one
//!   native transaction ([`transaction::relational`])
//! - a transactional batch store, where statements are staged and applied
//!   all at once on commit ([`transaction::batch`])
//!
//! The [`domain`] modules build statements for tags and articles on top.

pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod services;
pub mod transaction;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};
