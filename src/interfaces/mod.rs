// ============================================================================
// Interfaces Module
// Contains all trait definitions and contracts
// ============================================================================

mod clock;
mod event_handler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use event_handler::{
    EventHandler, LoggingEventHandler, MarketEvent, NoOpEventHandler, RecordingEventHandler,
};
