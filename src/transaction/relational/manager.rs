use sqlx::AnyPool;

use crate::error::Result;
use crate::services::registry::DialectorRegistry;
use crate::transaction::Context;

use super::RelationalTransaction;

/// Starts relational transaction actors against a dialector registry
#[derive(Debug, Clone)]
pub struct RelationalTransactionManager {
    registry: DialectorRegistry,
}

impl RelationalTransactionManager {
    pub fn new(registry: DialectorRegistry) -> Self {
        Self { registry }
    }

    pub fn from_pool(pool: AnyPool) -> Self {
        Self::new(DialectorRegistry::with_handle(pool))
    }

    pub fn registry(&self) -> &DialectorRegistry {
        &self.registry
    }

    /// Spawn a transaction actor and return its handle right away.
    ///
    /// The connection is acquired by the actor, so a missing dialector or a
    /// failed `BEGIN` shows up on the handle's error subscription, not here.
    pub fn get_and_start(&self, ctx: &Context) -> Result<RelationalTransaction> {
        RelationalTransaction::start(self.registry.clone(), ctx.clone())
    }
}
