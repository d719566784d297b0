// ============================================================================
// Consumer Domain Model
// ============================================================================

use super::policy::{PartitionKey, RankingPolicy};
use super::provider::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Input of `add_consumer`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewConsumer {
    pub owner: Address,
    pub name: String,
    pub region: String,
    pub policy: RankingPolicy,
    pub budget: Decimal,
    pub duration: Duration,
    pub deadline: DateTime<Utc>,
}

impl NewConsumer {
    pub fn new(
        owner: impl Into<Address>,
        name: impl Into<String>,
        region: impl Into<String>,
        budget: Decimal,
        duration: Duration,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            region: region.into(),
            policy: RankingPolicy::default(),
            budget,
            duration,
            deadline,
        }
    }

    pub fn with_policy(mut self, policy: RankingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.region.clone(), self.policy)
    }
}

/// A consumer request for the duration of one `add_consumer` call.
///
/// Budget and deadline are carried into logs and events but do not gate
/// acceptance of the partition head.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Consumer {
    pub id: ConsumerId,
    pub name: String,
    pub region: String,
    pub policy: RankingPolicy,
    pub owner: Address,
    pub budget: Decimal,
    pub duration: Duration,
    pub deadline: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
}

impl Consumer {
    pub fn new(request: NewConsumer, submitted_at: DateTime<Utc>) -> Self {
        Self {
            id: ConsumerId::new(),
            name: request.name,
            region: request.region,
            policy: request.policy,
            owner: request.owner,
            budget: request.budget,
            duration: request.duration,
            deadline: request.deadline,
            submitted_at,
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.region.clone(), self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_from_request() {
        let deadline = DateTime::from_timestamp(9_999_999_999, 0).unwrap();
        let submitted = DateTime::from_timestamp(1_000, 0).unwrap();
        let request = NewConsumer::new(
            "0xconsumer",
            "consumer1",
            "SF",
            Decimal::from(2),
            Duration::from_secs(100),
            deadline,
        )
        .with_policy(RankingPolicy::MinCost);

        let consumer = Consumer::new(request, submitted);
        assert_eq!(consumer.name, "consumer1");
        assert_eq!(consumer.owner, Address::from("0xconsumer"));
        assert_eq!(consumer.duration, Duration::from_secs(100));
        assert_eq!(consumer.submitted_at, submitted);
        assert_eq!(consumer.partition_key().to_string(), "SF||min_cost");
    }
}
