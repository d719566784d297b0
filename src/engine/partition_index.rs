// ============================================================================
// Partition Index
// One ranked provider list per (region, policy) key
// ============================================================================

use crate::domain::{PartitionKey, Provider, ProviderId, RankKey};
use chrono::{DateTime, Utc};
use crossbeam_skiplist::SkipMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;

// ============================================================================
// Index Entry
// ============================================================================

/// Index node: points at a provider record without owning it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub provider_id: ProviderId,
    pub rank: RankKey,
    pub end: DateTime<Utc>,
}

impl IndexEntry {
    pub fn for_provider(provider: &Provider) -> Self {
        Self {
            provider_id: provider.id,
            rank: provider.rank_key(),
            end: provider.window.end,
        }
    }
}

// ============================================================================
// Partition List
// ============================================================================

/// Ordered list of live providers for one partition.
///
/// `ranked` is the list itself (head = first key). `by_expiry` orders the same
/// entries by window end so a reap only visits the entries it removes.
#[derive(Debug, Default)]
pub struct PartitionList {
    ranked: BTreeMap<RankKey, IndexEntry>,
    by_expiry: BTreeMap<(DateTime<Utc>, u64), RankKey>,
}

impl PartitionList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert behind every entry with a lower or equal rank score.
    /// Returns false, leaving the list untouched, if the window is not valid.
    pub fn insert(&mut self, provider: &Provider) -> bool {
        if !provider.window.is_valid() {
            return false;
        }

        let entry = IndexEntry::for_provider(provider);
        self.by_expiry
            .insert((entry.end, entry.rank.sequence), entry.rank);
        self.ranked.insert(entry.rank, entry);

        tracing::trace!(
            "inserted provider {} at rank {:?}",
            entry.provider_id,
            entry.rank
        );
        true
    }

    /// Unlink the entry with this rank, wherever it sits in the list
    pub fn remove(&mut self, rank: &RankKey) -> Option<IndexEntry> {
        let entry = self.ranked.remove(rank)?;
        self.by_expiry.remove(&(entry.end, rank.sequence));
        Some(entry)
    }

    /// Detach and return the head
    pub fn pop_head(&mut self) -> Option<IndexEntry> {
        let (_, entry) = self.ranked.pop_first()?;
        self.by_expiry.remove(&(entry.end, entry.rank.sequence));
        Some(entry)
    }

    /// Unlink every entry whose window ended strictly before `now`
    pub fn remove_expired(&mut self, now: DateTime<Utc>) -> Vec<IndexEntry> {
        let mut removed = Vec::new();

        while let Some(oldest) = self.by_expiry.first_entry() {
            if oldest.key().0 >= now {
                break;
            }
            let rank = oldest.remove();
            if let Some(entry) = self.ranked.remove(&rank) {
                removed.push(entry);
            }
        }

        removed
    }

    pub fn head(&self) -> Option<IndexEntry> {
        self.ranked.values().next().copied()
    }

    /// Successor of `rank` in list order
    pub fn next_after(&self, rank: &RankKey) -> Option<IndexEntry> {
        self.ranked
            .range((Excluded(*rank), Unbounded))
            .next()
            .map(|(_, entry)| *entry)
    }

    pub fn get(&self, rank: &RankKey) -> Option<IndexEntry> {
        self.ranked.get(rank).copied()
    }

    /// Entries from head to tail
    pub fn entries(&self) -> Vec<IndexEntry> {
        self.ranked.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

// ============================================================================
// Partition
// ============================================================================

/// A partition list behind its own lock, so unrelated keys never contend
#[derive(Debug)]
pub struct Partition {
    key: PartitionKey,
    list: RwLock<PartitionList>,
}

impl Partition {
    pub fn new(key: PartitionKey) -> Self {
        Self {
            key,
            list: RwLock::new(PartitionList::new()),
        }
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    pub fn read(&self) -> RwLockReadGuard<'_, PartitionList> {
        self.list.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, PartitionList> {
        self.list.write()
    }
}

// ============================================================================
// Partition Index
// ============================================================================

/// All partitions, keyed by (region, policy).
///
/// The key map is a lock-free skip list: looking up or creating a partition
/// never blocks work on other partitions. Lists are only mutated through
/// `Partition::write`, where the engine pairs each change with the matching
/// registry and ledger update.
pub struct PartitionIndex {
    partitions: SkipMap<PartitionKey, Arc<Partition>>,
}

impl PartitionIndex {
    pub fn new() -> Self {
        Self {
            partitions: SkipMap::new(),
        }
    }

    /// Get the partition for `key`, creating it on first touch
    pub fn partition(&self, key: &PartitionKey) -> Arc<Partition> {
        if let Some(entry) = self.partitions.get(key) {
            return Arc::clone(entry.value());
        }

        let entry = self
            .partitions
            .get_or_insert(key.clone(), Arc::new(Partition::new(key.clone())));
        Arc::clone(entry.value())
    }

    /// Get the partition for `key` without creating it
    pub fn find(&self, key: &PartitionKey) -> Option<Arc<Partition>> {
        self.partitions
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn head(&self, key: &PartitionKey) -> Option<IndexEntry> {
        self.find(key)?.read().head()
    }

    pub fn entries(&self, key: &PartitionKey) -> Vec<IndexEntry> {
        self.find(key)
            .map(|partition| partition.read().entries())
            .unwrap_or_default()
    }

    /// Every key that has held a provider, in key order
    pub fn keys(&self) -> Vec<PartitionKey> {
        self.partitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn partitions(&self) -> Vec<Arc<Partition>> {
        self.partitions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

impl Default for PartitionIndex {
    fn default() -> Self {
        Self::new()
    }
}
