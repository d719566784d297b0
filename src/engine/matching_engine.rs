// ============================================================================
// Matching Engine
// Core business logic for provider listing and consumer matching
// ============================================================================

use super::factory::MatchingEngineBuilder;
use super::ledger::MatchLedger;
use super::partition_index::{PartitionIndex, PartitionList};
use super::reaper::{ExpiryReaper, SweepWorker};
use super::registry::ProviderRegistry;
use crate::domain::{
    Address, Consumer, EngineConfig, Match, NewConsumer, NewProvider, PartitionKey, Provider,
    ProviderId,
};
use crate::error::EngineResult;
use crate::interfaces::{Clock, EventHandler, MarketEvent};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Result of `add_consumer`
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerOutcome {
    /// The partition head was taken; the match is in both ledgers
    Matched(Arc<Match>),
    /// The partition had no live provider
    Unmatched,
}

impl ConsumerOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, ConsumerOutcome::Matched(_))
    }

    pub fn matched(&self) -> Option<&Arc<Match>> {
        match self {
            ConsumerOutcome::Matched(record) => Some(record),
            ConsumerOutcome::Unmatched => None,
        }
    }
}

/// Counters since engine creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub listed: u64,
    pub rejected: u64,
    pub matched: u64,
    pub expired: u64,
    pub unmatched_consumers: u64,
    pub partitions: usize,
}

#[derive(Default)]
struct Counters {
    listed: AtomicU64,
    rejected: AtomicU64,
    matched: AtomicU64,
    expired: AtomicU64,
    unmatched_consumers: AtomicU64,
}

/// Matching engine with one independently locked provider list per
/// (region, policy) partition
pub struct MatchingEngine {
    config: EngineConfig,

    /// Read once per call
    clock: Arc<dyn Clock>,

    /// Ranked provider lists
    partitions: PartitionIndex,

    /// Provider records by id
    registry: ProviderRegistry,

    /// Per-address match history
    ledger: MatchLedger,

    /// Event handler for processing events
    event_handler: Arc<dyn EventHandler>,

    /// Insertion sequence, breaks score ties
    sequence_counter: AtomicU64,

    counters: Counters,
}

impl MatchingEngine {
    /// Create a new matching engine
    pub fn new(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            config,
            clock,
            partitions: PartitionIndex::new(),
            registry: ProviderRegistry::new(),
            ledger: MatchLedger::new(),
            event_handler,
            sequence_counter: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn builder(name: impl Into<String>) -> MatchingEngineBuilder {
        MatchingEngineBuilder::new(name)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// List a provider in its (region, policy) partition.
    ///
    /// The partition is reaped first. A provider whose window does not start
    /// before it ends is dropped without error and `None` is returned; a
    /// rejection never creates a partition.
    pub fn add_provider(&self, request: NewProvider) -> Option<ProviderId> {
        let now = self.clock.now();
        let key = request.partition_key();
        let mut events = Vec::new();

        let listed = if request.window().is_valid() {
            let partition = self.partitions.partition(&key);
            let mut list = partition.write();
            events.extend(self.reap_locked(&key, &mut list, now));

            let seq = self.sequence_counter.fetch_add(1, Ordering::AcqRel);
            let provider = Arc::new(Provider::new(request, seq, now));
            self.registry.store(Arc::clone(&provider));
            list.insert(&provider);
            Some(provider)
        } else {
            if let Some(partition) = self.partitions.find(&key) {
                let mut list = partition.write();
                events.extend(self.reap_locked(&key, &mut list, now));
            }

            tracing::debug!(
                "rejected provider {} in {}: window {} .. {} is empty",
                request.name,
                key,
                request.start,
                request.end
            );
            events.push(MarketEvent::ProviderRejected {
                name: request.name,
                key: key.clone(),
                reason: "availability window must start before it ends".to_string(),
                timestamp: now,
            });
            None
        };

        let id = match listed {
            Some(provider) => {
                self.counters.listed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "listed provider {} ({}) in {} at score {}",
                    provider.name,
                    provider.id,
                    key,
                    provider.score
                );
                events.push(MarketEvent::ProviderListed {
                    provider_id: provider.id,
                    key,
                    score: provider.score,
                    timestamp: now,
                });
                Some(provider.id)
            },
            None => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                None
            },
        };

        self.emit(events);
        id
    }

    /// Match a consumer with the head of its (region, policy) partition.
    ///
    /// The partition is reaped first; an unknown partition means `Unmatched`.
    /// Removing the head, closing the provider and appending the match to both
    /// ledgers happen under the partition's write lock, so no two consumers
    /// can take the same provider.
    pub fn add_consumer(&self, request: NewConsumer) -> ConsumerOutcome {
        let now = self.clock.now();
        let consumer = Consumer::new(request, now);
        let key = consumer.partition_key();
        let mut events = Vec::new();

        // Consumers never create partitions
        let outcome = match self.partitions.find(&key) {
            Some(partition) => {
                let mut list = partition.write();
                events.extend(self.reap_locked(&key, &mut list, now));
                self.take_head(&mut list, &consumer, now)
            },
            None => ConsumerOutcome::Unmatched,
        };

        match &outcome {
            ConsumerOutcome::Matched(record) => {
                self.counters.matched.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "matched consumer {} with provider {} in {} at price {}",
                    record.consumer_name,
                    record.provider_name,
                    key,
                    record.price
                );
                events.push(MarketEvent::ConsumerMatched {
                    record: Arc::clone(record),
                    timestamp: now,
                });
            },
            ConsumerOutcome::Unmatched => {
                self.counters
                    .unmatched_consumers
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "no provider available for consumer {} (budget {}, deadline {}) in {}",
                    consumer.name,
                    consumer.budget,
                    consumer.deadline,
                    key
                );
                events.push(MarketEvent::ConsumerUnmatched {
                    consumer_id: consumer.id,
                    key,
                    timestamp: now,
                });
            },
        }

        self.emit(events);
        outcome
    }

    /// Reap one partition now, without adding anything to it.
    /// Returns the number of providers removed.
    pub fn remove_expired_providers(&self, key: &PartitionKey) -> usize {
        let Some(partition) = self.partitions.find(key) else {
            return 0;
        };
        let now = self.clock.now();

        let events = {
            let mut list = partition.write();
            self.reap_locked(key, &mut list, now)
        };

        let removed = events.len();
        self.emit(events);
        removed
    }

    /// Reap every known partition against a single clock snapshot.
    /// Returns the number of providers removed.
    pub fn sweep_all(&self) -> usize {
        let now = self.clock.now();
        let mut events = Vec::new();

        for partition in self.partitions.partitions() {
            let mut list = partition.write();
            events.extend(self.reap_locked(partition.key(), &mut list, now));
        }

        let removed = events.len();
        self.emit(events);
        removed
    }

    /// Start the background sweep configured by `sweep_interval`.
    /// Returns `None` when the engine is configured for on-touch reaping only.
    pub fn start_sweeper(self: &Arc<Self>) -> std::io::Result<Option<SweepWorker>> {
        match self.config.sweep_interval {
            Some(interval) => SweepWorker::spawn(Arc::clone(self), interval).map(Some),
            None => Ok(None),
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Best-ranked listed provider of a partition
    pub fn head_of(&self, key: &PartitionKey) -> Option<ProviderId> {
        self.partitions.head(key).map(|entry| entry.provider_id)
    }

    /// Provider following `id` in the partition list, if `id` is listed there
    pub fn next_of(&self, key: &PartitionKey, id: &ProviderId) -> Option<ProviderId> {
        let rank = self.registry.get(id).ok()?.rank_key();
        let partition = self.partitions.find(key)?;
        let list = partition.read();

        list.get(&rank).filter(|entry| entry.provider_id == *id)?;
        list.next_after(&rank).map(|entry| entry.provider_id)
    }

    /// Listed providers of a partition, head first
    pub fn providers_in(&self, key: &PartitionKey) -> Vec<Arc<Provider>> {
        self.partitions
            .entries(key)
            .iter()
            .filter_map(|entry| self.registry.get(&entry.provider_id).ok())
            .collect()
    }

    pub fn provider_at(&self, id: &ProviderId) -> EngineResult<Arc<Provider>> {
        self.registry.get(id)
    }

    pub fn match_at(&self, address: &Address, index: usize) -> EngineResult<Arc<Match>> {
        self.ledger.get(address, index)
    }

    pub fn matches_of(&self, address: &Address) -> Vec<Arc<Match>> {
        self.ledger.matches_of(address)
    }

    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        self.partitions.keys()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            listed: self.counters.listed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            matched: self.counters.matched.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            unmatched_consumers: self.counters.unmatched_consumers.load(Ordering::Relaxed),
            partitions: self.partitions.partition_count(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Private methods
    // ========================================================================

    /// Caller holds the partition write lock
    fn reap_locked(
        &self,
        key: &PartitionKey,
        list: &mut PartitionList,
        now: DateTime<Utc>,
    ) -> Vec<MarketEvent> {
        let expired = ExpiryReaper::new(&self.registry, self.config.retain_closed_providers)
            .reap(list, now);

        if expired.is_empty() {
            return Vec::new();
        }

        self.counters
            .expired
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        tracing::debug!("reaped {} expired providers from {}", expired.len(), key);

        expired
            .into_iter()
            .map(|provider_id| MarketEvent::ProviderExpired {
                provider_id,
                key: key.clone(),
                timestamp: now,
            })
            .collect()
    }

    /// Caller holds the partition write lock
    fn take_head(
        &self,
        list: &mut PartitionList,
        consumer: &Consumer,
        now: DateTime<Utc>,
    ) -> ConsumerOutcome {
        while let Some(entry) = list.pop_head() {
            let provider = match self.registry.get(&entry.provider_id) {
                Ok(provider) => provider,
                Err(err) => {
                    tracing::error!("dropping index entry without a record: {}", err);
                    continue;
                },
            };

            if !provider.try_claim() {
                tracing::error!(
                    "dropping provider {} found in list while {:?}",
                    provider.id,
                    provider.get_state()
                );
                continue;
            }

            let record = Arc::new(Match::new(&provider, consumer, now));
            self.ledger.record(&record);

            if !self.config.retain_closed_providers {
                self.registry.remove(&provider.id);
            }

            return ConsumerOutcome::Matched(record);
        }

        ConsumerOutcome::Unmatched
    }

    fn emit(&self, events: Vec<MarketEvent>) {
        if !events.is_empty() {
            self.event_handler.on_events(events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProviderState, RankingPolicy};
    use crate::interfaces::{ManualClock, NoOpEventHandler, RecordingEventHandler};
    use rust_decimal::Decimal;
    use std::time::Duration;

    const START: i64 = 7_999_999_999;
    const END: i64 = 9_999_999_999;
    const NOW: i64 = 1_700_000_000;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn sf() -> PartitionKey {
        PartitionKey::new("SF", RankingPolicy::MinLatency)
    }

    fn engine_at(clock: Arc<ManualClock>) -> MatchingEngine {
        MatchingEngine::new(
            EngineConfig::new("test"),
            clock,
            Arc::new(NoOpEventHandler),
        )
    }

    fn offer(name: &str, score: i64, start: i64, end: i64) -> NewProvider {
        NewProvider::new("0xprovider", name, "SF", Decimal::from(score), at(start), at(end))
    }

    fn request(name: &str) -> NewConsumer {
        NewConsumer::new(
            "0xconsumer",
            name,
            "SF",
            Decimal::from(2),
            Duration::from_secs(100),
            at(END),
        )
    }

    fn listed_names(engine: &MatchingEngine, key: &PartitionKey) -> Vec<String> {
        engine
            .providers_in(key)
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    #[test]
    fn test_add_provider_assigns_id_and_lists() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));
        let id = engine.add_provider(offer("hello", 3, START, END)).unwrap();

        assert_eq!(engine.head_of(&sf()), Some(id));
        let record = engine.provider_at(&id).unwrap();
        assert_eq!(record.name, "hello");
        assert_eq!(record.listed_at, at(NOW));
        assert_eq!(record.get_state(), ProviderState::Listed);
    }

    #[test]
    fn test_traversal_via_next_of() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));
        engine.add_provider(offer("hello", 3, START + 1, END));
        engine.add_provider(offer("world", 2, START, END));
        engine.add_provider(offer("test", 1, START, END));
        engine.add_provider(offer("provider4", 4, START, END + 1));

        let mut names = Vec::new();
        let mut cursor = engine.head_of(&sf());
        while let Some(id) = cursor {
            names.push(engine.provider_at(&id).unwrap().name.clone());
            cursor = engine.next_of(&sf(), &id);
        }

        assert_eq!(names, ["test", "world", "hello", "provider4"]);
    }

    #[test]
    fn test_next_of_unlisted_provider_is_none() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));
        let first = engine.add_provider(offer("first", 1, START, END)).unwrap();
        engine.add_provider(offer("second", 2, START, END));
        engine.add_consumer(request("c"));

        assert_eq!(engine.next_of(&sf(), &first), None);
        let other = PartitionKey::new("NYC", RankingPolicy::MinLatency);
        assert_eq!(engine.next_of(&other, &first), None);
    }

    #[test]
    fn test_consumer_takes_head() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));
        engine.add_provider(offer("hello", 3, START + 1, END));
        engine.add_provider(offer("world", 2, START, END));
        let test_id = engine.add_provider(offer("test", 1, START, END)).unwrap();
        engine.add_provider(offer("provider4", 4, START, END + 1));

        let outcome = engine.add_consumer(request("consumer1"));
        let record = outcome.matched().unwrap();

        assert_eq!(record.provider_id, test_id);
        assert_eq!(record.provider_name, "test");
        assert_eq!(record.provider_address, Address::from("0xprovider"));
        assert_eq!(record.consumer_name, "consumer1");
        assert_eq!(record.consumer_address, Address::from("0xconsumer"));
        assert_eq!(record.region, "SF");
        assert_eq!(record.price, Decimal::from(1));
        assert_eq!(record.start, at(START));
        assert_eq!(record.duration, Duration::from_secs(100));
        assert_eq!(record.matched_time, at(NOW));

        assert_eq!(listed_names(&engine, &sf()), ["world", "hello", "provider4"]);
        assert_eq!(
            engine.provider_at(&test_id).unwrap().get_state(),
            ProviderState::Matched
        );
    }

    #[test]
    fn test_match_lands_in_both_ledgers() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));
        engine.add_provider(offer("test", 1, START, END));
        engine.add_consumer(request("consumer1"));

        let provider_side = engine.match_at(&Address::from("0xprovider"), 0).unwrap();
        let consumer_side = engine.match_at(&Address::from("0xconsumer"), 0).unwrap();
        assert_eq!(provider_side, consumer_side);
        assert!(engine.match_at(&Address::from("0xprovider"), 1).is_err());
    }

    #[test]
    fn test_unmatched_consumer_records_nothing() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));

        assert_eq!(engine.add_consumer(request("lonely")), ConsumerOutcome::Unmatched);
        assert!(engine.match_at(&Address::from("0xconsumer"), 0).is_err());
        assert_eq!(engine.stats().unmatched_consumers, 1);
    }

    #[test]
    fn test_consumer_in_other_policy_does_not_match() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));
        engine.add_provider(offer("latency", 1, START, END));

        let outcome = engine.add_consumer(request("cost").with_policy(RankingPolicy::MinCost));

        assert_eq!(outcome, ConsumerOutcome::Unmatched);
        assert_eq!(listed_names(&engine, &sf()), ["latency"]);
    }

    #[test]
    fn test_rejected_provider_never_listed() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));

        assert_eq!(engine.add_provider(offer("hello", 1, 1, 1)), None);
        assert_eq!(engine.add_provider(offer("hello", 1, END, START)), None);
        assert_eq!(engine.head_of(&sf()), None);
        assert_eq!(engine.stats().rejected, 2);
        assert_eq!(engine.stats().listed, 0);
    }

    #[test]
    fn test_unknown_keys_create_no_partition() {
        let engine = engine_at(Arc::new(ManualClock::at_unix(NOW)));

        for i in 0..100 {
            let mut job = request("lonely");
            job.region = format!("region-{}", i);
            assert_eq!(engine.add_consumer(job), ConsumerOutcome::Unmatched);
        }
        let mut bad = offer("bad", 1, END, START);
        bad.region = "ZZ".to_string();
        assert_eq!(engine.add_provider(bad), None);

        let stats = engine.stats();
        assert_eq!(stats.partitions, 0);
        assert_eq!(stats.unmatched_consumers, 100);
        assert_eq!(stats.rejected, 1);
        assert!(engine.partition_keys().is_empty());
    }

    #[test]
    fn test_rejected_provider_still_reaps_known_partition() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let engine = engine_at(clock.clone());
        engine.add_provider(offer("short", 1, NOW, NOW + 1));
        clock.advance(chrono::Duration::seconds(5));

        assert_eq!(engine.add_provider(offer("bad", 1, 5, 5)), None);
        assert_eq!(engine.head_of(&sf()), None);
        assert_eq!(engine.stats().expired, 1);
        assert_eq!(engine.stats().partitions, 1);
    }

    #[test]
    fn test_expired_head_removed_on_add() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let engine = engine_at(clock.clone());
        let test_id = engine.add_provider(offer("test", 1, START, END)).unwrap();
        let stale = engine.add_provider(offer("remove1", 1, NOW, NOW + 1)).unwrap();
        // Equal score, earlier sequence wins
        assert_eq!(engine.head_of(&sf()), Some(test_id));

        clock.advance(chrono::Duration::seconds(2));
        engine.add_provider(offer("remove2", 0, NOW + 2, NOW + 3));

        assert_eq!(
            engine.provider_at(&stale).unwrap().get_state(),
            ProviderState::Expired
        );
        assert_eq!(listed_names(&engine, &sf()), ["remove2", "test"]);

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(engine.remove_expired_providers(&sf()), 1);
        assert_eq!(engine.head_of(&sf()), Some(test_id));
    }

    #[test]
    fn test_expired_head_is_never_matched() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let engine = engine_at(clock.clone());
        engine.add_provider(offer("short", 1, NOW, NOW + 1));
        let long = engine.add_provider(offer("long", 5, NOW, END)).unwrap();

        clock.advance(chrono::Duration::seconds(10));
        let outcome = engine.add_consumer(request("c"));

        assert_eq!(outcome.matched().unwrap().provider_id, long);
        assert_eq!(engine.stats().expired, 1);
    }

    #[test]
    fn test_remove_expired_is_idempotent() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let engine = engine_at(clock.clone());
        engine.add_provider(offer("a", 1, NOW, NOW + 1));
        engine.add_provider(offer("b", 2, START, END));
        clock.advance(chrono::Duration::seconds(5));

        assert_eq!(engine.remove_expired_providers(&sf()), 1);
        let first = listed_names(&engine, &sf());
        assert_eq!(engine.remove_expired_providers(&sf()), 0);
        assert_eq!(listed_names(&engine, &sf()), first);
    }

    #[test]
    fn test_not_retaining_closed_providers() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let engine = MatchingEngine::new(
            EngineConfig::new("purge").with_retain_closed_providers(false),
            clock.clone(),
            Arc::new(NoOpEventHandler),
        );
        let matched = engine.add_provider(offer("m", 1, START, END)).unwrap();
        let expired = engine.add_provider(offer("e", 9, NOW, NOW + 1)).unwrap();
        engine.add_consumer(request("c"));
        clock.advance(chrono::Duration::seconds(5));
        engine.sweep_all();

        assert!(engine.provider_at(&matched).is_err());
        assert!(engine.provider_at(&expired).is_err());
        // The ledger keeps its copy
        assert_eq!(engine.matches_of(&Address::from("0xprovider")).len(), 1);
    }

    #[test]
    fn test_events_follow_operations() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let recorder = Arc::new(RecordingEventHandler::new());
        let engine = MatchingEngine::new(EngineConfig::new("events"), clock.clone(), recorder.clone());

        engine.add_provider(offer("bad", 1, 5, 5));
        engine.add_provider(offer("short", 1, NOW, NOW + 1));
        clock.advance(chrono::Duration::seconds(5));
        engine.add_consumer(request("c"));

        let events = recorder.events();
        assert!(matches!(events[0], MarketEvent::ProviderRejected { .. }));
        assert!(matches!(events[1], MarketEvent::ProviderListed { .. }));
        assert!(matches!(events[2], MarketEvent::ProviderExpired { .. }));
        assert!(matches!(events[3], MarketEvent::ConsumerUnmatched { .. }));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_sweep_all_covers_every_partition() {
        let clock = Arc::new(ManualClock::at_unix(NOW));
        let engine = engine_at(clock.clone());
        for region in ["SF", "NYC", "LA"] {
            let mut o = offer("short", 1, NOW, NOW + 1);
            o.region = region.to_string();
            engine.add_provider(o);
        }
        clock.advance(chrono::Duration::seconds(5));

        assert_eq!(engine.sweep_all(), 3);
        assert!(engine
            .partition_keys()
            .iter()
            .all(|key| engine.head_of(key).is_none()));
        assert_eq!(engine.stats().partitions, 3);
    }

    #[test]
    fn test_start_sweeper_respects_config() {
        let engine = Arc::new(engine_at(Arc::new(ManualClock::at_unix(NOW))));
        assert!(engine.start_sweeper().unwrap().is_none());
    }
}
