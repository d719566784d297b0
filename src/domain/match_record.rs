// ============================================================================
// Match Domain Model
// ============================================================================

use super::consumer::{Consumer, ConsumerId};
use super::policy::{PartitionKey, RankingPolicy};
use super::provider::{Address, Provider, ProviderId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use smallvec::{smallvec, SmallVec};
use std::time::Duration;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Addresses whose ledgers receive a copy of the match (provider first)
pub type Participants = SmallVec<[Address; 2]>;

/// Immutable record pairing one provider with one consumer
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    /// Unique match identifier
    pub id: Uuid,

    pub provider_id: ProviderId,
    pub provider_name: String,
    pub provider_address: Address,

    pub consumer_id: ConsumerId,
    pub consumer_name: String,
    pub consumer_address: Address,

    pub region: String,
    pub policy: RankingPolicy,

    /// Agreed price, equal to the provider's ranking score
    pub price: Decimal,

    /// Clock snapshot of the matching call
    pub matched_time: DateTime<Utc>,

    /// Agreed start, equal to the provider's window start
    pub start: DateTime<Utc>,

    /// Agreed duration, equal to the consumer's requested duration
    pub duration: Duration,

    pub participants: Participants,
}

impl Match {
    pub fn new(provider: &Provider, consumer: &Consumer, matched_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: provider.id,
            provider_name: provider.name.clone(),
            provider_address: provider.owner.clone(),
            consumer_id: consumer.id,
            consumer_name: consumer.name.clone(),
            consumer_address: consumer.owner.clone(),
            region: provider.region.clone(),
            policy: provider.policy,
            price: provider.score,
            matched_time,
            start: provider.window.start,
            duration: consumer.duration,
            participants: smallvec![provider.owner.clone(), consumer.owner.clone()],
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.region.clone(), self.policy)
    }

    /// End of the agreed usage, if representable
    pub fn agreed_end(&self) -> Option<DateTime<Utc>> {
        let duration = chrono::Duration::from_std(self.duration).ok()?;
        self.start.checked_add_signed(duration)
    }
}
