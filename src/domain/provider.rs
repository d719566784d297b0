// ============================================================================
// Provider Domain Model
// ============================================================================

use super::policy::{PartitionKey, RankKey, RankingPolicy};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProviderId(Uuid);

impl ProviderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProviderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Participant address (account owning a provider offer or a consumer request)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl From<String> for Address {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Half-open availability window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AvailabilityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A window is listable only when it starts strictly before it ends
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// The window has ended strictly before `now`
    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end < now
    }
}

// ============================================================================
// Provider Lifecycle State Machine
// ============================================================================

pub mod state {
    #[cfg(feature = "serde")]
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub enum ProviderState {
        Listed = 0,
        Matched = 1,
        Expired = 2,
    }

    impl ProviderState {
        pub fn from_u8(val: u8) -> Self {
            match val {
                0 => ProviderState::Listed,
                1 => ProviderState::Matched,
                _ => ProviderState::Expired,
            }
        }

        pub fn is_terminal(&self) -> bool {
            matches!(self, ProviderState::Matched | ProviderState::Expired)
        }
    }

    #[derive(Debug, Clone, Copy)]
    pub enum ProviderStateTransition {
        Match,
        Expire,
    }

    impl ProviderState {
        pub fn transition(
            &self,
            transition: ProviderStateTransition,
        ) -> Result<ProviderState, String> {
            match (self, transition) {
                (ProviderState::Listed, ProviderStateTransition::Match) => {
                    Ok(ProviderState::Matched)
                },
                (ProviderState::Listed, ProviderStateTransition::Expire) => {
                    Ok(ProviderState::Expired)
                },
                _ => Err(format!(
                    "Invalid transition from {:?} via {:?}",
                    self, transition
                )),
            }
        }
    }
}

// ============================================================================
// Provider Request
// ============================================================================

/// Input of `add_provider`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NewProvider {
    pub owner: Address,
    pub name: String,
    pub region: String,
    pub policy: RankingPolicy,
    /// Ranking score ("target"); also the agreed price on match
    pub score: Decimal,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NewProvider {
    pub fn new(
        owner: impl Into<Address>,
        name: impl Into<String>,
        region: impl Into<String>,
        score: Decimal,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            region: region.into(),
            policy: RankingPolicy::default(),
            score,
            start,
            end,
        }
    }

    pub fn with_policy(mut self, policy: RankingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.region.clone(), self.policy)
    }

    pub fn window(&self) -> AvailabilityWindow {
        AvailabilityWindow::new(self.start, self.end)
    }
}

// ============================================================================
// Provider Entity
// ============================================================================

/// Listed capacity offer.
///
/// All descriptive fields are fixed at creation; only the lifecycle state
/// moves, and only once, via compare-and-swap.
#[derive(Debug)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub region: String,
    pub policy: RankingPolicy,
    pub owner: Address,
    pub score: Decimal,
    pub window: AvailabilityWindow,
    pub listed_at: DateTime<Utc>,
    /// Engine-wide insertion sequence, breaks ties between equal scores
    pub sequence: u64,

    state: AtomicU8,
}

impl Provider {
    pub fn new(request: NewProvider, sequence: u64, listed_at: DateTime<Utc>) -> Self {
        Self {
            id: ProviderId::new(),
            name: request.name,
            region: request.region,
            policy: request.policy,
            owner: request.owner,
            score: request.score,
            window: AvailabilityWindow::new(request.start, request.end),
            listed_at,
            sequence,
            state: AtomicU8::new(state::ProviderState::Listed as u8),
        }
    }

    pub fn partition_key(&self) -> PartitionKey {
        PartitionKey::new(self.region.clone(), self.policy)
    }

    pub fn rank_key(&self) -> RankKey {
        RankKey::new(self.policy.rank_score(self.score), self.sequence)
    }

    pub fn get_state(&self) -> state::ProviderState {
        state::ProviderState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_listed(&self) -> bool {
        self.get_state() == state::ProviderState::Listed
    }

    /// Atomically move `Listed -> Matched`.
    /// Returns false if the provider was already closed.
    pub fn try_claim(&self) -> bool {
        self.try_close(state::ProviderStateTransition::Match)
    }

    /// Atomically move `Listed -> Expired`.
    /// Returns false if the provider was already closed.
    pub fn try_expire(&self) -> bool {
        self.try_close(state::ProviderStateTransition::Expire)
    }

    fn try_close(&self, transition: state::ProviderStateTransition) -> bool {
        let current = self.get_state();
        let next = match current.transition(transition) {
            Ok(next) => next,
            Err(_) => return false,
        };

        self.state
            .compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}
