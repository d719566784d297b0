// ============================================================================
// Provider Registry
// Provider records addressed by id, independent of partition membership
// ============================================================================

use crate::domain::{Provider, ProviderId};
use crate::error::{EngineError, EngineResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Provider id -> record.
///
/// Partition lists only hold ids, so a provider leaves its list without its
/// record being rewritten.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<ProviderId, Arc<Provider>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, provider: Arc<Provider>) {
        self.providers.write().insert(provider.id, provider);
    }

    pub fn get(&self, id: &ProviderId) -> EngineResult<Arc<Provider>> {
        self.providers
            .read()
            .get(id)
            .cloned()
            .ok_or(EngineError::ProviderNotFound(*id))
    }

    pub fn remove(&self, id: &ProviderId) -> Option<Arc<Provider>> {
        self.providers.write().remove(id)
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.providers.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// Number of records still in the `Listed` state
    pub fn listed_count(&self) -> usize {
        self.providers
            .read()
            .values()
            .filter(|provider| provider.is_listed())
            .count()
    }
}
