// ============================================================================
// Utilities Module
// Helper functions for hosting the engine in a binary
// ============================================================================

#[cfg(feature = "logging")]
mod logging;

#[cfg(feature = "logging")]
pub use logging::init_logging;
