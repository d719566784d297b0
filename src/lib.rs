// ============================================================================
// Capacity Matcher Library
// Regional provider/consumer matching with ranked, self-expiring listings
// ============================================================================

//! # Capacity Matcher
//!
//! A concurrent matching engine pairing capacity providers with consumers.
//!
//! ## Features
//!
//! - **Partitioned lists** keyed by region and ranking policy, each under its own lock
//! - **Ranked listing**: the lowest score is the head, equal scores keep arrival order
//! - **Lazy expiry** of ended availability windows, with an optional background sweep
//! - **Atomic matching**: a provider is handed to at most one consumer
//! - **Per-address ledgers** of every match, for both participants
//!
//! Closed provider records stay resolvable through `provider_at` by default,
//! so the registry grows with every listing. Long-running hosts should build
//! with `retain_closed_providers(false)` to purge records once they close.
//!
//! ## Example
//!
//! ```rust
//! use capacity_matcher::prelude::*;
//! use chrono::{Duration as ChronoDuration, Utc};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = MatchingEngine::builder("resource-sharing")
//!     .build(Arc::new(NoOpEventHandler))
//!     .unwrap();
//!
//! let now = Utc::now();
//! let provider = engine.add_provider(NewProvider::new(
//!     "0xprovider",
//!     "gpu-box",
//!     "SF",
//!     Decimal::from(3),
//!     now,
//!     now + ChronoDuration::hours(1),
//! ));
//! assert!(provider.is_some());
//!
//! let outcome = engine.add_consumer(NewConsumer::new(
//!     "0xconsumer",
//!     "training-job",
//!     "SF",
//!     Decimal::from(5),
//!     Duration::from_secs(600),
//!     now + ChronoDuration::hours(2),
//! ));
//!
//! let record = outcome.matched().unwrap();
//! assert_eq!(record.price, Decimal::from(3));
//! assert_eq!(engine.match_at(&Address::from("0xconsumer"), 0).unwrap(), *record);
//! ```

pub mod domain;
pub mod engine;
pub mod error;
pub mod interfaces;
pub mod utils;

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::provider::state::{ProviderState, ProviderStateTransition};
    pub use crate::domain::{
        Address, AvailabilityWindow, Consumer, ConsumerId, EngineConfig, Match, NewConsumer,
        NewProvider, PartitionKey, Provider, ProviderId, RankingPolicy,
    };
    pub use crate::engine::{
        create_from_config, ConsumerOutcome, EngineStats, MatchingEngine, MatchingEngineBuilder,
        SweepWorker,
    };
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::interfaces::{
        Clock, EventHandler, LoggingEventHandler, ManualClock, MarketEvent, NoOpEventHandler,
        SystemClock,
    };
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use chrono::{DateTime, Utc};
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    const START: i64 = 7_999_999_999;
    const END: i64 = 9_999_999_999;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn engine() -> MatchingEngine {
        MatchingEngine::builder("integration")
            .with_clock(Arc::new(ManualClock::at_unix(1_700_000_000)))
            .build(Arc::new(NoOpEventHandler))
            .unwrap()
    }

    fn offer(owner: &str, name: &str, region: &str, score: i64) -> NewProvider {
        NewProvider::new(owner, name, region, Decimal::from(score), at(START), at(END))
    }

    fn job(owner: &str, name: &str, region: &str) -> NewConsumer {
        NewConsumer::new(
            owner,
            name,
            region,
            Decimal::from(10),
            Duration::from_secs(60),
            at(END),
        )
    }

    #[test]
    fn test_end_to_end_matching() {
        let engine = engine();
        let sf = PartitionKey::new("SF", RankingPolicy::MinLatency);

        engine.add_provider(offer("0xa", "slow", "SF", 7));
        let fast = engine.add_provider(offer("0xb", "fast", "SF", 2)).unwrap();

        let outcome = engine.add_consumer(job("0xc", "job", "SF"));
        let record = outcome.matched().unwrap();
        assert_eq!(record.provider_id, fast);
        assert_eq!(
            engine.provider_at(&fast).unwrap().get_state(),
            ProviderState::Matched
        );

        // The next consumer gets the remaining provider, then nothing
        let second = engine.add_consumer(job("0xd", "job2", "SF"));
        assert_eq!(second.matched().unwrap().provider_name, "slow");
        assert_eq!(engine.add_consumer(job("0xe", "job3", "SF")), ConsumerOutcome::Unmatched);
        assert_eq!(engine.head_of(&sf), None);

        let stats = engine.stats();
        assert_eq!(stats.listed, 2);
        assert_eq!(stats.matched, 2);
        assert_eq!(stats.unmatched_consumers, 1);
    }

    #[test]
    fn test_partition_isolation() {
        let engine = engine();
        engine.add_provider(offer("0xa", "sf-box", "SF", 1));

        assert_eq!(engine.add_consumer(job("0xc", "job", "NYC")), ConsumerOutcome::Unmatched);
        let sf = PartitionKey::new("SF", RankingPolicy::MinLatency);
        assert_eq!(engine.providers_in(&sf).len(), 1);

        let nyc_box = engine.add_provider(offer("0xb", "nyc-box", "NYC", 9)).unwrap();
        let outcome = engine.add_consumer(job("0xc", "job", "NYC"));
        assert_eq!(outcome.matched().unwrap().provider_id, nyc_box);
        assert_eq!(engine.providers_in(&sf).len(), 1);
    }

    #[test]
    fn test_ledger_indices_follow_arrival() {
        let engine = engine();
        let owner = Address::from("0xowner");
        for (i, score) in [5, 3, 4].iter().enumerate() {
            engine.add_provider(offer("0xowner", &format!("box{}", i), "SF", *score));
        }
        for i in 0..3 {
            engine.add_consumer(job(&format!("0xc{}", i), "job", "SF"));
        }

        let prices: Vec<_> = (0..3)
            .map(|i| engine.match_at(&owner, i).unwrap().price)
            .collect();
        assert_eq!(prices, [Decimal::from(3), Decimal::from(4), Decimal::from(5)]);
        assert!(matches!(
            engine.match_at(&owner, 3),
            Err(EngineError::MatchNotFound { index: 3, .. })
        ));
    }

    #[test]
    fn test_concurrent_consumers_never_share_a_provider() {
        let engine = Arc::new(engine());
        let providers = 64;
        for i in 0..providers {
            engine.add_provider(offer("0xp", &format!("p{}", i), "SF", i % 7));
        }

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    (0..16)
                        .filter_map(|i| {
                            engine
                                .add_consumer(job(&format!("0xc{}-{}", t, i), "job", "SF"))
                                .matched()
                                .map(|record| record.provider_id)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut taken = Vec::new();
        for handle in handles {
            taken.extend(handle.join().unwrap());
        }

        let unique: HashSet<_> = taken.iter().collect();
        assert_eq!(taken.len(), providers as usize);
        assert_eq!(unique.len(), taken.len());
        assert_eq!(engine.matches_of(&Address::from("0xp")).len(), taken.len());
        assert_eq!(engine.stats().unmatched_consumers, 128 - providers as u64);
    }

    #[test]
    fn test_concurrent_listing_keeps_order() {
        let engine = Arc::new(engine());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for i in 0..50 {
                        let score = (i * 13 + t) % 17;
                        engine.add_provider(offer("0xp", &format!("{}-{}", t, i), "SF", score));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sf = PartitionKey::new("SF", RankingPolicy::MinLatency);
        let listed = engine.providers_in(&sf);
        assert_eq!(listed.len(), 200);
        assert!(listed
            .windows(2)
            .all(|pair| pair[0].rank_key() < pair[1].rank_key()));
    }

    #[test]
    fn test_listing_matching_and_sweeping_race_on_one_key() {
        let clock = Arc::new(ManualClock::at_unix(1_700_000_000));
        let engine = Arc::new(
            MatchingEngine::builder("race")
                .with_clock(clock.clone())
                .build(Arc::new(NoOpEventHandler))
                .unwrap(),
        );

        let mut handles = Vec::new();
        for t in 0..2 {
            let engine = Arc::clone(&engine);
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    let now = clock.now();
                    let end = now + chrono::Duration::seconds(1 + i % 3);
                    let name = format!("{}-{}", t, i);
                    let score = Decimal::from(i % 11);
                    engine.add_provider(NewProvider::new("0xp", name, "SF", score, now, end));
                }
            }));
        }
        for t in 0..2 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for _ in 0..300 {
                    engine.add_consumer(job(&format!("0xc{}", t), "job", "SF"));
                }
            }));
        }
        {
            let engine = Arc::clone(&engine);
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                for _ in 0..200 {
                    clock.advance(chrono::Duration::seconds(1));
                    engine.sweep_all();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let sf = PartitionKey::new("SF", RankingPolicy::MinLatency);
        let stats = engine.stats();
        let remaining = engine.providers_in(&sf).len() as u64;

        // Every listed provider closed exactly once, or is still listed
        assert_eq!(stats.listed, 1_000);
        assert_eq!(stats.listed, stats.matched + stats.expired + remaining);
        assert_eq!(stats.matched + stats.unmatched_consumers, 600);

        let provider_side = engine.matches_of(&Address::from("0xp")).len() as u64;
        let consumer_side = engine.matches_of(&Address::from("0xc0")).len()
            + engine.matches_of(&Address::from("0xc1")).len();
        assert_eq!(provider_side, stats.matched);
        assert_eq!(consumer_side as u64, stats.matched);
    }
}
