// ============================================================================
// Ranking Policy and Partition Keys
// ============================================================================

use crate::error::{EngineError, EngineResult};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Separator between region and policy in the textual partition key
pub const KEY_SEPARATOR: &str = "||";

// ============================================================================
// Ranking Policy
// ============================================================================

/// Ordering rule applied within a partition.
///
/// Every policy maps the provider's submitted score to a rank score; the
/// partition keeps providers in ascending rank score, so the head is always
/// the best candidate under that policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RankingPolicy {
    /// Lowest latency score first
    #[default]
    MinLatency,
    /// Lowest cost score first
    MinCost,
}

impl RankingPolicy {
    pub const ALL: [RankingPolicy; 2] = [RankingPolicy::MinLatency, RankingPolicy::MinCost];

    /// Rank score used for ordering (lower is better)
    pub fn rank_score(&self, score: Decimal) -> Decimal {
        match self {
            RankingPolicy::MinLatency | RankingPolicy::MinCost => score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingPolicy::MinLatency => "min_latency",
            RankingPolicy::MinCost => "min_cost",
        }
    }
}

impl fmt::Display for RankingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingPolicy {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s {
            "min_latency" => Ok(RankingPolicy::MinLatency),
            "min_cost" => Ok(RankingPolicy::MinCost),
            other => Err(EngineError::UnknownPolicy(other.to_string())),
        }
    }
}

// ============================================================================
// Partition Key
// ============================================================================

/// Identifies one independent ordered provider list: (region, policy)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionKey {
    pub region: String,
    pub policy: RankingPolicy,
}

impl PartitionKey {
    pub fn new(region: impl Into<String>, policy: RankingPolicy) -> Self {
        Self {
            region: region.into(),
            policy,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.region, KEY_SEPARATOR, self.policy)
    }
}

impl FromStr for PartitionKey {
    type Err = EngineError;

    /// Parses `"<region>||<policy>"`, e.g. `"SF||min_latency"`
    fn from_str(s: &str) -> EngineResult<Self> {
        let (region, policy) = s
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| EngineError::InvalidPartitionKey(s.to_string()))?;

        if region.is_empty() {
            return Err(EngineError::InvalidPartitionKey(s.to_string()));
        }

        Ok(Self::new(region, policy.parse()?))
    }
}

// ============================================================================
// Rank Key
// ============================================================================

/// Total order of entries inside one partition.
///
/// Field order matters for the derived `Ord`: rank score first, then the
/// engine-wide insertion sequence, so equal scores keep arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RankKey {
    pub score: Decimal,
    pub sequence: u64,
}

impl RankKey {
    pub fn new(score: Decimal, sequence: u64) -> Self {
        Self { score, sequence }
    }
}
