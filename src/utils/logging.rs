// ============================================================================
// Logging Setup
// Installs a tracing subscriber for binaries and demos
// ============================================================================

use crate::error::{EngineError, EngineResult};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` (e.g. `"capacity_matcher=debug"`)
/// applies when it is unset. Fails if the filter does not parse or a global
/// subscriber is already set.
pub fn init_logging(default_filter: &str) -> EngineResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| EngineError::Logging(format!("invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()
        .map_err(|e| EngineError::Logging(e.to_string()))
}
