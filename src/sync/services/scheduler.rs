//! Periodic reconciliation, one background loop per scope.
//!
//! The first pass runs immediately, later passes every `interval`. Ticks
//! missed while a pass was still running are skipped rather than queued.

use crate::sync::domain::{SyncReport, SyncScope};
use crate::sync::services::ReconciliationService;
use crate::task::ports::TaskStore;
use crate::tracker::ports::TrackerClient;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Errors raised when starting a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The pass interval was zero.
    #[error("sync interval for scope {scope} must be greater than zero")]
    ZeroInterval {
        /// Scope key.
        scope: String,
    },
}

/// Notification emitted after every scheduled pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The pass finished.
    Completed {
        /// Scope key.
        scope: String,
        /// Pass counts.
        report: SyncReport,
    },
    /// The pass aborted before writing anything.
    Failed {
        /// Scope key.
        scope: String,
        /// Rendered error.
        error: String,
    },
}

struct ScheduledSync {
    stop: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl ScheduledSync {
    /// Signals the loop to stop after any in-flight pass and waits for it.
    async fn shutdown(self) {
        if self.stop.send(()).is_err() {
            debug!("sync loop already exited");
        }
        if let Err(err) = self.join.await {
            warn!(error = %err, "scheduled sync task ended abnormally");
        }
    }
}

/// Runs reconciliation passes on a fixed interval per scope.
pub struct SyncScheduler<S, T, C>
where
    S: TaskStore + 'static,
    T: TrackerClient + 'static,
    C: Clock + Send + Sync + 'static,
{
    engine: Arc<ReconciliationService<S, T, C>>,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
    running: Mutex<HashMap<String, ScheduledSync>>,
}

impl<S, T, C> SyncScheduler<S, T, C>
where
    S: TaskStore + 'static,
    T: TrackerClient + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates a scheduler that reports nothing but logs.
    #[must_use]
    pub fn new(engine: Arc<ReconciliationService<S, T, C>>) -> Self {
        Self {
            engine,
            events: None,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Sends a [`SyncEvent`] to `events` after every pass.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SyncEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Starts reconciling `scope` every `interval` and returns its key.
    ///
    /// A schedule already running for the same scope is replaced; its
    /// in-flight pass, if any, finishes in the background.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ZeroInterval`] when `interval` is zero;
    /// any existing schedule for the scope keeps running.
    pub fn run_sync(
        &self,
        scope: SyncScope,
        interval: Duration,
    ) -> Result<String, SchedulerError> {
        let key = scope.key();
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval { scope: key });
        }
        let (stop, stop_rx) = oneshot::channel();
        let join = tokio::spawn(run_loop(
            Arc::clone(&self.engine),
            scope,
            interval,
            self.events.clone(),
            stop_rx,
        ));
        let replaced = self
            .running()
            .insert(key.clone(), ScheduledSync { stop, join });
        if let Some(ScheduledSync { stop: old_stop, .. }) = replaced {
            debug!(scope = %key, "replacing existing schedule");
            if old_stop.send(()).is_err() {
                debug!(scope = %key, "replaced sync loop already exited");
            }
        }
        info!(scope = %key, interval_secs = interval.as_secs(), "scheduled sync");
        Ok(key)
    }

    /// Stops the schedule for `scope_key`, waiting for an in-flight pass to
    /// finish. Returns `false` when nothing was scheduled under that key.
    pub async fn stop_sync(&self, scope_key: &str) -> bool {
        let Some(scheduled) = self.running().remove(scope_key) else {
            return false;
        };
        scheduled.shutdown().await;
        info!(scope = %scope_key, "stopped sync");
        true
    }

    /// Stops every schedule.
    pub async fn stop_all(&self) {
        let scheduled: Vec<_> = self.running().drain().collect();
        for (key, sync) in scheduled {
            sync.shutdown().await;
            info!(scope = %key, "stopped sync");
        }
    }

    /// Returns the keys of every running schedule, sorted.
    #[must_use]
    pub fn scheduled(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.running().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn running(&self) -> MutexGuard<'_, HashMap<String, ScheduledSync>> {
        // The map holds no invariants a panicking holder could break.
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_loop<S, T, C>(
    engine: Arc<ReconciliationService<S, T, C>>,
    scope: SyncScope,
    interval: Duration,
    events: Option<mpsc::UnboundedSender<SyncEvent>>,
    mut stop: oneshot::Receiver<()>,
) where
    S: TaskStore + 'static,
    T: TrackerClient + 'static,
    C: Clock + Send + Sync + 'static,
{
    let key = scope.key();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let event = match engine.reconcile(&scope).await {
                    Ok(report) => SyncEvent::Completed { scope: key.clone(), report },
                    Err(err) => {
                        warn!(scope = %key, error = %err, "sync pass failed");
                        SyncEvent::Failed { scope: key.clone(), error: err.to_string() }
                    }
                };
                if let Some(sender) = &events
                    && sender.send(event).is_err()
                {
                    debug!(scope = %key, "sync event receiver dropped");
                }
            }
        }
    }
    debug!(scope = %key, "sync loop exited");
}
