// ============================================================================
// Match Ledger
// Append-only, per-address history of completed matches
// ============================================================================

use crate::domain::{Address, Match};
use crate::error::{EngineError, EngineResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Address -> matches in arrival order. Entries are never removed or
/// rewritten, so an index stays valid once handed out.
#[derive(Default)]
pub struct MatchLedger {
    entries: RwLock<HashMap<Address, Vec<Arc<Match>>>>,
}

impl MatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, address: &Address, record: Arc<Match>) {
        self.entries
            .write()
            .entry(address.clone())
            .or_default()
            .push(record);
    }

    /// Append `record` to every participant's ledger under a single lock,
    /// so readers see either none or all of the copies.
    pub fn record(&self, record: &Arc<Match>) {
        let mut entries = self.entries.write();
        for address in &record.participants {
            entries
                .entry(address.clone())
                .or_default()
                .push(Arc::clone(record));
        }
    }

    pub fn get(&self, address: &Address, index: usize) -> EngineResult<Arc<Match>> {
        self.entries
            .read()
            .get(address)
            .and_then(|matches| matches.get(index))
            .cloned()
            .ok_or_else(|| EngineError::MatchNotFound {
                address: address.clone(),
                index,
            })
    }

    pub fn matches_of(&self, address: &Address) -> Vec<Arc<Match>> {
        self.entries
            .read()
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len_of(&self, address: &Address) -> usize {
        self.entries.read().get(address).map_or(0, Vec::len)
    }

    /// Number of addresses with at least one match
    pub fn address_count(&self) -> usize {
        self.entries.read().len()
    }
}
