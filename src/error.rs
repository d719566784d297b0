// ============================================================================
// Engine Errors
// Error types surfaced by lookups, parsing and configuration
// ============================================================================

use crate::domain::{Address, ProviderId};
use thiserror::Error;

/// Errors returned by the matching engine and its registries.
///
/// Matching itself never fails: a rejected provider or an unmatched consumer
/// are normal outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// No provider record exists for this identifier
    #[error("provider {0} not found")]
    ProviderNotFound(ProviderId),

    /// The ledger of `address` has no entry at `index`
    #[error("no match at index {index} for address {address}")]
    MatchNotFound { address: Address, index: usize },

    /// Ranking policy name is not one of the supported policies
    #[error("unknown ranking policy: {0}")]
    UnknownPolicy(String),

    /// Partition key text is not of the form `<region>||<policy>`
    #[error("invalid partition key: {0}")]
    InvalidPartitionKey(String),

    /// Engine configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Global tracing subscriber could not be installed
    #[cfg(feature = "logging")]
    #[error("failed to initialise logging: {0}")]
    Logging(String),

    /// Configuration document could not be parsed
    #[cfg(feature = "serde")]
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
