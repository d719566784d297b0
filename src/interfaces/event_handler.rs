// ============================================================================
// Event Handler Interface
// Defines the contract for handling provider and match events
// ============================================================================

use crate::domain::{ConsumerId, Match, PartitionKey, ProviderId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Events emitted by the matching engine
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MarketEvent {
    /// Provider inserted into its partition
    ProviderListed {
        provider_id: ProviderId,
        key: PartitionKey,
        score: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Provider submission dropped because its window was empty or inverted
    ProviderRejected {
        name: String,
        key: PartitionKey,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Provider reaped after its window ended
    ProviderExpired {
        provider_id: ProviderId,
        key: PartitionKey,
        timestamp: DateTime<Utc>,
    },

    /// Consumer matched with the partition head
    ConsumerMatched {
        record: Arc<Match>,
        timestamp: DateTime<Utc>,
    },

    /// Consumer found an empty partition
    ConsumerUnmatched {
        consumer_id: ConsumerId,
        key: PartitionKey,
        timestamp: DateTime<Utc>,
    },
}

/// Event handler trait for processing matching engine events.
/// Implementations can journal to a durable store, notify, log, etc.
pub trait EventHandler: Send + Sync {
    /// Handle a market event
    fn on_event(&self, event: MarketEvent);

    /// Batch event handler (optional optimization)
    fn on_events(&self, events: Vec<MarketEvent>) {
        for event in events {
            self.on_event(event);
        }
    }
}

/// No-op event handler for testing
pub struct NoOpEventHandler;

impl EventHandler for NoOpEventHandler {
    fn on_event(&self, _event: MarketEvent) {}
}

/// Logging event handler
pub struct LoggingEventHandler;

impl EventHandler for LoggingEventHandler {
    fn on_event(&self, event: MarketEvent) {
        tracing::debug!("Matching engine event: {:?}", event);
    }
}

/// Keeps every event in memory, in emission order
#[derive(Default)]
pub struct RecordingEventHandler {
    events: Mutex<Vec<MarketEvent>>,
}

impl RecordingEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarketEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventHandler for RecordingEventHandler {
    fn on_event(&self, event: MarketEvent) {
        self.events.lock().push(event);
    }

    fn on_events(&self, events: Vec<MarketEvent>) {
        self.events.lock().extend(events);
    }
}
