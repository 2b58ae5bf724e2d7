//! Background draining of the offline queue.
//!
//! The scheduler is a two-state machine, [`SyncState::Idle`] and
//! [`SyncState::Syncing`]. A drain requested while one is running is
//! dropped, not queued. The transition back to `Idle` is tied to a guard's
//! `Drop`, so it happens on success, on error and on unwind alike.
//!
//! Drains are triggered by the periodic timer (when online), by an
//! offline-to-online transition, and by explicit user action.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::gateway::SubmissionGateway;
use crate::scan::OfflineScan;
use crate::storage::OfflineStore;
use crate::submit::Submitter;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No drain is running.
    Idle,
    /// A drain is running.
    Syncing,
}

/// Counts from one completed drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records taken from the snapshot and sent to the gateway.
    pub attempted: usize,
    /// Records confirmed remotely and removed from the queue.
    pub synced: usize,
    /// Records left in the queue for the next drain.
    pub failed: usize,
}

/// Result of a drain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// Another drain was already running; nothing was done.
    Skipped,
    /// The device is offline; nothing was attempted.
    Offline,
    /// The drain ran over the whole snapshot.
    Completed(DrainReport),
}

/// Restores [`SyncState::Idle`] when dropped.
struct SyncGuard<'a> {
    state: &'a Mutex<SyncState>,
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = SyncState::Idle;
    }
}

/// Drains the offline queue through the submission gateway.
#[derive(Debug)]
pub struct SyncScheduler {
    gateway: Arc<dyn SubmissionGateway>,
    store: OfflineStore,
    connectivity: Connectivity,
    period: Duration,
    state: Mutex<SyncState>,
    pending: watch::Sender<usize>,
}

impl SyncScheduler {
    /// Create a scheduler sharing the submitter's gateway, queue and
    /// connectivity signal.
    #[must_use]
    pub fn new(submitter: &Submitter, period: Duration) -> Self {
        let (pending, _rx) = watch::channel(0);
        Self {
            gateway: Arc::clone(submitter.gateway()),
            store: submitter.store().clone(),
            connectivity: submitter.connectivity().clone(),
            period,
            state: Mutex::new(SyncState::Idle),
            pending,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last published pending count, updated after every drain and on
    /// offline timer ticks.
    #[must_use]
    pub fn pending_count(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    /// Move to `Syncing` unless already there.
    fn try_begin(&self) -> Option<SyncGuard<'_>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SyncState::Syncing {
            return None;
        }
        *state = SyncState::Syncing;
        Some(SyncGuard { state: &self.state })
    }

    /// Re-read the queue size and publish it.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub async fn refresh_pending_count(&self) -> Result<usize> {
        let count = self.store.get_pending_count().await?;
        self.pending.send_replace(count);
        Ok(count)
    }

    /// Drain the queue if the device is online. This is the "sync all"
    /// user action.
    ///
    /// # Errors
    ///
    /// See [`SyncScheduler::drain`].
    pub async fn sync_all(&self) -> Result<DrainStatus> {
        if !self.connectivity.is_online() {
            debug!("Offline, not draining");
            return Ok(DrainStatus::Offline);
        }
        self.drain().await
    }

    /// Resubmit every queued scan once, oldest first.
    ///
    /// Works on a snapshot taken at the start; scans queued meanwhile wait
    /// for the next drain. A scan leaves the queue only after the remote
    /// confirms it.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read, or if removing a
    /// confirmed scan fails. The latter aborts the rest of the batch; scans
    /// already removed stay removed, and the one that failed removal will be
    /// submitted again by a later drain.
    pub async fn drain(&self) -> Result<DrainStatus> {
        let Some(_guard) = self.try_begin() else {
            debug!("Drain already in progress, skipping");
            return Ok(DrainStatus::Skipped);
        };

        let snapshot = self.store.get_pending_scans().await?;
        if snapshot.is_empty() {
            self.pending.send_replace(0);
            return Ok(DrainStatus::Completed(DrainReport::default()));
        }

        info!(pending = snapshot.len(), "Draining offline queue");
        let mut report = DrainReport::default();

        for scan in snapshot {
            report.attempted += 1;
            if self.resubmit(&scan).await {
                if let Err(e) = self.store.remove_scan_offline(scan.id).await {
                    error!(
                        id = scan.id,
                        error = %e,
                        synced = report.synced,
                        "Confirmed scan could not be removed, aborting drain"
                    );
                    self.publish_count().await;
                    return Err(e);
                }
                report.synced += 1;
            } else {
                report.failed += 1;
            }
        }

        self.publish_count().await;
        info!(
            synced = report.synced,
            failed = report.failed,
            "Drain finished"
        );
        Ok(DrainStatus::Completed(report))
    }

    /// Resubmit a single queued scan, removing it on confirmation.
    ///
    /// Returns `false` when the scan stays queued, including when a drain is
    /// running, so the same record is never in flight twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the confirmed scan cannot be removed.
    pub async fn sync_item(&self, scan: &OfflineScan) -> Result<bool> {
        let Some(_guard) = self.try_begin() else {
            debug!(id = scan.id, "Drain in progress, not retrying single scan");
            return Ok(false);
        };

        if !self.resubmit(scan).await {
            return Ok(false);
        }
        self.store.remove_scan_offline(scan.id).await?;
        self.publish_count().await;
        Ok(true)
    }

    /// One gateway attempt. `true` only for a remote confirmation.
    async fn resubmit(&self, scan: &OfflineScan) -> bool {
        match self
            .gateway
            .submit_remote(&scan.vtoken, &scan.scan_input)
            .await
        {
            Ok(response) if response.success => {
                debug!(id = scan.id, "Queued scan confirmed");
                true
            }
            Ok(response) => {
                warn!(id = scan.id, message = %response.message, "Queued scan declined");
                false
            }
            Err(e) => {
                warn!(
                    id = scan.id,
                    error = %e,
                    transient = e.is_transient(),
                    "Queued scan still undeliverable"
                );
                false
            }
        }
    }

    async fn publish_count(&self) {
        if let Err(e) = self.refresh_pending_count().await {
            warn!(error = %e, "Failed to refresh pending count");
        }
    }

    async fn drain_logged(&self, trigger: &'static str) {
        match self.drain().await {
            Ok(DrainStatus::Completed(report)) => {
                debug!(trigger, ?report, "Drain completed");
            }
            Ok(status) => debug!(trigger, ?status, "Drain not run"),
            Err(e) => error!(trigger, error = %e, "Drain failed"),
        }
    }

    async fn on_tick(&self) {
        if self.connectivity.is_online() {
            self.drain_logged("timer").await;
        } else {
            self.publish_count().await;
        }
    }

    /// Start the background task.
    ///
    /// The timer fires immediately and then once per period. Stop the task
    /// with [`SchedulerHandle::shutdown`]; a drain in progress finishes first.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let mut online_rx = self.connectivity.subscribe();

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut was_online = *online_rx.borrow_and_update();

            info!(period = ?self.period, "Sync scheduler started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => self.on_tick().await,
                    changed = online_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let online = *online_rx.borrow_and_update();
                        if online && !was_online {
                            self.drain_logged("reconnected").await;
                        }
                        was_online = online;
                    }
                }
            }
            info!("Sync scheduler stopped");
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owns the running scheduler task.
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the timer and connectivity subscription and wait for the task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task panicked.
    pub async fn shutdown(self) -> Result<()> {
        // The task may already be gone; that is fine.
        let _ = self.shutdown.send(());
        self.task
            .await
            .map_err(|e| Error::internal(format!("sync scheduler task failed: {e}")))
    }
}
