//! Scan submission: the online/offline decision for a single scan.
//!
//! Policy, in order:
//! 1. Known offline: queue without touching the network.
//! 2. Otherwise try the gateway. Any failure queues the scan instead.
//! 3. If queueing fails too, report a storage failure. Nothing comes after.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::connectivity::Connectivity;
use crate::gateway::SubmissionGateway;
use crate::scan::{AttendanceResponse, QueueReason, RejectReason, SubmissionOutcome};
use crate::storage::OfflineStore;

/// Prefix of the message returned when the offline queue refuses a scan.
pub const STORAGE_FAILURE_MESSAGE: &str = "Could not save scan offline";

/// Entry point for submitting scans.
#[derive(Debug, Clone)]
pub struct Submitter {
    gateway: Arc<dyn SubmissionGateway>,
    store: OfflineStore,
    connectivity: Connectivity,
    queue_rejections: bool,
}

impl Submitter {
    /// Compose a submitter. Declined scans are queued by default.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn SubmissionGateway>,
        store: OfflineStore,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            gateway,
            store,
            connectivity,
            queue_rejections: true,
        }
    }

    /// Choose whether a scan the remote answered `success: false` for is
    /// queued for retry (`true`) or reported as rejected (`false`).
    #[must_use]
    pub fn with_queue_rejections(mut self, queue: bool) -> Self {
        self.queue_rejections = queue;
        self
    }

    /// The offline queue this submitter writes to.
    #[must_use]
    pub fn store(&self) -> &OfflineStore {
        &self.store
    }

    /// The gateway used for remote calls.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn SubmissionGateway> {
        &self.gateway
    }

    /// The connectivity signal consulted before each submission.
    #[must_use]
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Submit one scan and report the normalized response.
    pub async fn submit_attendance(&self, vtoken: &str, scan_input: &str) -> AttendanceResponse {
        self.submit(vtoken, scan_input).await.into_response()
    }

    /// Submit one scan and report which path it took.
    pub async fn submit(&self, vtoken: &str, scan_input: &str) -> SubmissionOutcome {
        if !self.connectivity.is_online() {
            debug!("Device offline, skipping remote submission");
            return self.enqueue(vtoken, scan_input, QueueReason::DeviceOffline).await;
        }

        match self.gateway.submit_remote(vtoken, scan_input).await {
            Ok(response) if response.success => {
                info!(name = %response.name, action = %response.action, "Attendance recorded");
                SubmissionOutcome::Delivered(response)
            }
            Ok(response) if self.queue_rejections => {
                self.enqueue(
                    vtoken,
                    scan_input,
                    QueueReason::RemoteDeclined(response.message),
                )
                .await
            }
            Ok(response) => {
                info!(message = %response.message, "Remote declined scan");
                SubmissionOutcome::Rejected {
                    response,
                    reason: RejectReason::Remote,
                }
            }
            Err(e) => {
                self.enqueue(vtoken, scan_input, QueueReason::GatewayFailure(e.to_string()))
                    .await
            }
        }
    }

    async fn enqueue(&self, vtoken: &str, scan_input: &str, reason: QueueReason) -> SubmissionOutcome {
        match self.store.save_scan_offline(vtoken, scan_input).await {
            Ok(scan) => {
                info!(id = scan.id, %reason, "Scan queued for sync");
                SubmissionOutcome::Queued { scan, reason }
            }
            Err(e) => {
                error!(error = %e, %reason, "Failed to queue scan");
                SubmissionOutcome::Rejected {
                    response: AttendanceResponse::failed(format!("{STORAGE_FAILURE_MESSAGE}: {e}")),
                    reason: RejectReason::Storage(e.to_string()),
                }
            }
        }
    }
}
