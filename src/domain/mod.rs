// ============================================================================
// Domain Models Module
// Contains all core domain entities and value objects
// ============================================================================

pub mod config;
pub mod consumer;
pub mod match_record;
pub mod policy;
pub mod provider;

pub use config::EngineConfig;
pub use consumer::{Consumer, ConsumerId, NewConsumer};
pub use match_record::{Match, Participants};
pub use policy::{PartitionKey, RankKey, RankingPolicy};
pub use provider::{Address, AvailabilityWindow, NewProvider, Provider, ProviderId};

// Re-export state machine
pub use provider::state::{ProviderState, ProviderStateTransition};
