// ============================================================================
// Engine Configuration
// Expiry sweeping and registry retention settings
// ============================================================================

use crate::error::{EngineError, EngineResult};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Shortest accepted period for the background sweep
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for a matching engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Engine name, used in logs (e.g. "resource-sharing")
    pub name: String,

    /// Period of the background expiry sweep over every partition.
    /// None means partitions are reaped only when touched.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sweep_interval: Option<Duration>,

    /// Keep matched and expired provider records resolvable by id.
    /// When true (the default) the registry grows with every provider ever
    /// listed; long-running engines should set this to false, which purges a
    /// record from the registry as soon as it closes. Ledger copies of
    /// matches are kept either way.
    #[cfg_attr(feature = "serde", serde(default = "default_retain"))]
    pub retain_closed_providers: bool,
}

#[cfg(feature = "serde")]
fn default_retain() -> bool {
    true
}

impl EngineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sweep_interval: None,
            retain_closed_providers: true,
        }
    }

    /// Builder method: Enable the periodic sweep
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Builder method: Choose whether closed provider records stay resolvable
    pub fn with_retain_closed_providers(mut self, retain: bool) -> Self {
        self.retain_closed_providers = retain;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidConfig(
                "Engine name cannot be empty".to_string(),
            ));
        }

        if let Some(interval) = self.sweep_interval {
            if interval < MIN_SWEEP_INTERVAL {
                return Err(EngineError::InvalidConfig(format!(
                    "Sweep interval must be at least {:?}",
                    MIN_SWEEP_INTERVAL
                )));
            }
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration document
    #[cfg(feature = "serde")]
    pub fn from_json(document: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(document)
            .map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Preset Configurations (Factory Methods)
// ============================================================================

impl EngineConfig {
    /// Lazy expiry only: partitions are reaped when an add touches them
    pub fn on_touch_only(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// Lazy expiry plus a background sweep bounding staleness to `interval`
    pub fn with_periodic_sweep(name: impl Into<String>, interval: Duration) -> Self {
        Self::new(name).with_sweep_interval(interval)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("capacity-matcher")
    }
}
