//! Connectivity signal and reachability probing.
//!
//! [`Connectivity`] is the process-wide "is online" flag. Whoever knows the
//! platform state feeds it; the orchestrator reads it and the sync scheduler
//! subscribes to its transitions. [`ReachabilityProbe`] is the feeder used
//! by the CLI: it polls an HTTP endpoint on a fixed interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};

/// Shared online/offline flag with change notifications.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    /// Create a signal with an initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Whether the device is currently believed to be online.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record the current state. Subscribers are only woken on a change.
    ///
    /// Returns `true` if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!(online, "Connectivity changed");
        }
        changed
    }

    /// Receive future transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Polls an HTTP endpoint and feeds the result into a [`Connectivity`].
///
/// Any HTTP answer, whatever its status, counts as reachable. Only a
/// transport failure or a timeout marks the device offline.
#[derive(Debug)]
pub struct ReachabilityProbe {
    client: reqwest::Client,
    url: Url,
    period: Duration,
    timeout: Duration,
    connectivity: Connectivity,
    running: Arc<AtomicBool>,
}

impl ReachabilityProbe {
    /// Create a probe for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        url: Url,
        period: Duration,
        timeout: Duration,
        connectivity: Connectivity,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url,
            period,
            timeout,
            connectivity,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Check if the probe loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Probe once and return whether the endpoint answered.
    pub async fn check(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.client.head(self.url.clone()).send()).await
        {
            Ok(Ok(response)) => {
                debug!(status = response.status().as_u16(), "Probe answered");
                true
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!("Probe timed out");
                false
            }
        }
    }

    /// Probe once and publish the result.
    pub async fn refresh(&self) -> bool {
        let online = self.check().await;
        self.connectivity.set_online(online);
        online
    }

    /// Probe on every tick until stopped.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Reachability probe already running");
            return;
        }

        debug!(
            url = %self.url,
            interval_ms = self.period.as_millis(),
            "Starting reachability probe"
        );

        let mut ticker = interval(self.period);
        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.refresh().await;
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("Reachability probe stopped");
    }

    /// Get a handle that can stop the probe from another task.
    #[must_use]
    pub fn stop_handle(&self) -> ProbeHandle {
        ProbeHandle {
            running: Arc::clone(&self.running),
        }
    }
}

/// Stops a running [`ReachabilityProbe`] at its next tick.
#[derive(Debug, Clone)]
pub struct ProbeHandle {
    running: Arc<AtomicBool>,
}

impl ProbeHandle {
    /// Stop the associated probe.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the probe is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
