// ============================================================================
// Expiry Reaper
// On-touch reaping of ended windows, plus optional periodic sweeps
// ============================================================================

use super::matching_engine::MatchingEngine;
use super::partition_index::PartitionList;
use super::registry::ProviderRegistry;
use crate::domain::ProviderId;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

// ============================================================================
// On-touch reap
// ============================================================================

/// Removes ended providers from one partition list and closes their records.
///
/// Holds no state of its own; the caller supplies the locked list and the
/// clock snapshot of the current call.
pub struct ExpiryReaper<'a> {
    registry: &'a ProviderRegistry,
    retain_closed: bool,
}

impl<'a> ExpiryReaper<'a> {
    pub fn new(registry: &'a ProviderRegistry, retain_closed: bool) -> Self {
        Self {
            registry,
            retain_closed,
        }
    }

    /// Reap `list` at `now`, returning the ids that moved to `Expired`
    pub fn reap(&self, list: &mut PartitionList, now: DateTime<Utc>) -> Vec<ProviderId> {
        let mut expired = Vec::new();

        for entry in list.remove_expired(now) {
            match self.registry.get(&entry.provider_id) {
                Ok(provider) if provider.try_expire() => {
                    expired.push(entry.provider_id);
                },
                Ok(provider) => {
                    tracing::warn!(
                        "provider {} left its list while already {:?}",
                        entry.provider_id,
                        provider.get_state()
                    );
                },
                Err(err) => {
                    tracing::warn!("reaped entry without a record: {}", err);
                },
            }

            if !self.retain_closed {
                self.registry.remove(&entry.provider_id);
            }
        }

        expired
    }
}

// ============================================================================
// Background sweep (thread)
// ============================================================================

/// Background thread calling `MatchingEngine::sweep_all` at a fixed period.
///
/// Stops when `stop` is called or the worker is dropped.
pub struct SweepWorker {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SweepWorker {
    pub fn spawn(engine: Arc<MatchingEngine>, interval: Duration) -> std::io::Result<Self> {
        let (shutdown, signal) = channel::bounded::<()>(1);
        let name = format!("{}-sweep", engine.name());

        let handle = thread::Builder::new().name(name).spawn(move || {
            tracing::info!("expiry sweep started, interval {:?}", interval);
            loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let removed = engine.sweep_all();
                        if removed > 0 {
                            tracing::debug!("expiry sweep removed {} providers", removed);
                        }
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::info!("expiry sweep stopped");
        })?;

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("expiry sweep thread panicked");
            }
        }
    }
}

impl Drop for SweepWorker {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

// ============================================================================
// Background sweep (tokio)
// ============================================================================

/// Spawn a tokio task calling `MatchingEngine::sweep_all` every `interval`.
/// Abort the returned handle to stop it.
#[cfg(feature = "async")]
pub fn spawn_periodic_sweep(
    engine: Arc<MatchingEngine>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = engine.sweep_all();
            if removed > 0 {
                tracing::debug!("expiry sweep removed {} providers", removed);
            }
        }
    })
}
