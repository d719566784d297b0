// ============================================================================
// Engine Factory
// Creates matching engines with proper configuration
// ============================================================================

use crate::domain::EngineConfig;
use crate::engine::MatchingEngine;
use crate::error::EngineResult;
use crate::interfaces::{Clock, EventHandler, SystemClock};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Factory Functions
// ============================================================================

/// Creates a matching engine reading the system clock
///
/// # Example
/// ```
/// use capacity_matcher::prelude::*;
/// use capacity_matcher::engine::factory::create_from_config;
/// use std::sync::Arc;
///
/// let config = EngineConfig::on_touch_only("resource-sharing");
/// let engine = create_from_config(config, Arc::new(NoOpEventHandler)).unwrap();
/// assert_eq!(engine.name(), "resource-sharing");
/// ```
pub fn create_from_config(
    config: EngineConfig,
    event_handler: Arc<dyn EventHandler>,
) -> EngineResult<MatchingEngine> {
    create_with_clock(config, Arc::new(SystemClock), event_handler)
}

/// Creates a matching engine reading an injected clock
pub fn create_with_clock(
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    event_handler: Arc<dyn EventHandler>,
) -> EngineResult<MatchingEngine> {
    config.validate()?;

    tracing::info!(
        "creating engine {} (sweep {:?}, retain closed providers: {})",
        config.name,
        config.sweep_interval,
        config.retain_closed_providers
    );

    Ok(MatchingEngine::new(config, clock, event_handler))
}

// ============================================================================
// Builder Pattern for Advanced Configuration
// ============================================================================

/// Builder for creating matching engines with fluent API
///
/// # Example
/// ```
/// use capacity_matcher::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let engine = MatchingEngine::builder("resource-sharing")
///     .sweep_every(Duration::from_secs(1))
///     .retain_closed_providers(false)
///     .build(Arc::new(NoOpEventHandler))
///     .unwrap();
/// assert_eq!(engine.config().sweep_interval, Some(Duration::from_secs(1)));
/// ```
pub struct MatchingEngineBuilder {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl MatchingEngineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: EngineConfig::new(name),
            clock: Arc::new(SystemClock),
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Read time from `clock` instead of the system clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Enable the background sweep (see `MatchingEngine::start_sweeper`)
    pub fn sweep_every(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = Some(interval);
        self
    }

    /// Reap only when a partition is touched (default)
    pub fn on_touch_only(mut self) -> Self {
        self.config.sweep_interval = None;
        self
    }

    pub fn retain_closed_providers(mut self, retain: bool) -> Self {
        self.config.retain_closed_providers = retain;
        self
    }

    /// Build the matching engine
    pub fn build(self, event_handler: Arc<dyn EventHandler>) -> EngineResult<MatchingEngine> {
        create_with_clock(self.config, self.clock, event_handler)
    }

    /// Get the configuration without building (for inspection)
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }
}
