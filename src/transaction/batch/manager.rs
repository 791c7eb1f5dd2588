use std::sync::Arc;

use crate::error::Result;
use crate::services::registry::ClientRegistry;
use crate::transaction::Context;

use super::{BatchClient, BatchTransaction};

/// Starts batch transaction actors against a client registry
#[derive(Debug, Clone)]
pub struct BatchTransactionManager {
    registry: ClientRegistry,
}

impl BatchTransactionManager {
    pub fn new(registry: ClientRegistry) -> Self {
        Self { registry }
    }

    pub fn from_client(client: Arc<dyn BatchClient>) -> Self {
        Self::new(ClientRegistry::with_handle(client))
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Spawn a transaction actor and return its handle right away.
    ///
    /// A missing client is reported on the handle's error subscription.
    pub fn get_and_start(&self, ctx: &Context) -> Result<BatchTransaction> {
        BatchTransaction::start(self.registry.clone(), ctx.clone())
    }
}
