// ============================================================================
// Engine Module
// Contains the core matching engine business logic
// ============================================================================

mod ledger;
mod matching_engine;
mod partition_index;
mod reaper;
mod registry;

pub mod factory;

pub use factory::{create_from_config, create_with_clock, MatchingEngineBuilder};
pub use ledger::MatchLedger;
pub use matching_engine::{ConsumerOutcome, EngineStats, MatchingEngine};
pub use partition_index::{IndexEntry, Partition, PartitionIndex, PartitionList};
pub use reaper::{ExpiryReaper, SweepWorker};
pub use registry::ProviderRegistry;

#[cfg(feature = "async")]
pub use reaper::spawn_periodic_sweep;
