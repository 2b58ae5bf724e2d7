//! Core scan types for rollcall.
//!
//! This module defines the queued scan record, the normalized response handed
//! back to callers, and the three-way outcome of a single submission.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::extract_id;

/// Message shown when a scan was stored locally instead of delivered.
pub const OFFLINE_MESSAGE: &str = "Saved offline. Will sync when online.";

/// Action label for a scan waiting in the offline queue.
pub const PENDING_ACTION: &str = "Pending Sync";

/// A scan that has not yet been confirmed by the remote ledger.
///
/// Records are immutable once created. They leave the queue either when the
/// remote confirms them or when a user deletes them, and never come back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineScan {
    /// Storage-assigned key, monotonic and never reused.
    pub id: i64,

    /// The volunteer session token at the time of the scan.
    pub vtoken: String,

    /// The decoded QR payload as received.
    pub scan_input: String,

    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl OfflineScan {
    /// The participant identifier this scan refers to.
    #[must_use]
    pub fn participant_id(&self) -> String {
        extract_id(&self.scan_input)
    }

    /// Creation time as a UTC datetime, if the stored value is in range.
    #[must_use]
    pub fn created_at(&self) -> Option<chrono::DateTime<Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// The normalized result of one submission attempt.
///
/// `success && offline` means the scan is queued for retry, not recorded.
/// Presentation code must not show it as a confirmed attendance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceResponse {
    /// Remote acceptance, or a successful local enqueue.
    pub success: bool,

    /// Whether this result stands for a local enqueue.
    #[serde(default)]
    pub offline: bool,

    /// Feedback message.
    pub message: String,

    /// Participant name, or a placeholder before remote validation.
    pub name: String,

    /// Entry/exit style label.
    pub action: String,

    /// Display timestamp.
    pub timestamp: String,
}

impl AttendanceResponse {
    /// Build the response for a scan that was stored in the offline queue.
    #[must_use]
    pub fn queued(scan: &OfflineScan) -> Self {
        Self {
            success: true,
            offline: true,
            message: OFFLINE_MESSAGE.to_string(),
            name: format!("ID: {}", scan.participant_id()),
            action: PENDING_ACTION.to_string(),
            timestamp: display_time(),
        }
    }

    /// Build a failed response with no further fallback.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            offline: false,
            message: message.into(),
            name: String::new(),
            action: String::new(),
            timestamp: display_time(),
        }
    }

    /// Whether the remote ledger confirmed this attendance.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.success && !self.offline
    }
}

/// Why a scan ended up in the offline queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueReason {
    /// The device was known to be offline; no network call was made.
    DeviceOffline,
    /// The gateway call failed (timeout, transport, status, malformed body).
    GatewayFailure(String),
    /// The remote answered but declined the scan.
    RemoteDeclined(String),
}

impl std::fmt::Display for QueueReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceOffline => write!(f, "device offline"),
            Self::GatewayFailure(cause) => write!(f, "gateway failure: {cause}"),
            Self::RemoteDeclined(message) => write!(f, "remote declined: {message}"),
        }
    }
}

/// Why a submission ended without delivery or a queued retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The offline queue could not persist the scan.
    Storage(String),
    /// The remote declined and declined scans are not queued.
    Remote,
}

/// The outcome of submitting one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The remote ledger answered; the response is passed through.
    Delivered(AttendanceResponse),
    /// The scan is durably queued for a later drain.
    Queued {
        /// The stored record.
        scan: OfflineScan,
        /// What sent it to the queue.
        reason: QueueReason,
    },
    /// Terminal failure.
    Rejected {
        /// The response reported to the caller.
        response: AttendanceResponse,
        /// What went wrong.
        reason: RejectReason,
    },
}

impl SubmissionOutcome {
    /// Collapse the outcome into the response handed to callers.
    #[must_use]
    pub fn into_response(self) -> AttendanceResponse {
        match self {
            Self::Delivered(response) | Self::Rejected { response, .. } => response,
            Self::Queued { scan, .. } => AttendanceResponse::queued(&scan),
        }
    }

    /// Check whether the scan landed in the offline queue.
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }
}

/// Local wall-clock time in the form shown next to a scan result.
#[must_use]
pub fn display_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Mask a volunteer token for log output, keeping only a short prefix.
#[must_use]
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(3).collect();
    if token.chars().count() <= 3 {
        "***".to_string()
    } else {
        format!("{prefix}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scan(input: &str) -> OfflineScan {
        OfflineScan {
            id: 1,
            vtoken: "vol-token".to_string(),
            scan_input: input.to_string(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_participant_id_uses_extractor() {
        let scan = sample_scan("https://host/exec?uid=77");
        assert_eq!(scan.participant_id(), "77");
    }

    #[test]
    fn test_created_at() {
        let scan = sample_scan("x");
        let created = scan.created_at().unwrap();
        assert_eq!(created.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_queued_response() {
        let response = AttendanceResponse::queued(&sample_scan("https://host/exec?id=42"));
        assert!(response.success);
        assert!(response.offline);
        assert!(!response.is_confirmed());
        assert_eq!(response.name, "ID: 42");
        assert_eq!(response.action, PENDING_ACTION);
        assert_eq!(response.message, OFFLINE_MESSAGE);
    }

    #[test]
    fn test_failed_response() {
        let response = AttendanceResponse::failed("Could not save scan offline: disk full");
        assert!(!response.success);
        assert!(!response.offline);
        assert!(!response.is_confirmed());
        assert!(response.name.is_empty());
    }

    #[test]
    fn test_outcome_into_response() {
        let queued = SubmissionOutcome::Queued {
            scan: sample_scan("abc"),
            reason: QueueReason::DeviceOffline,
        };
        assert!(queued.is_queued());
        let response = queued.into_response();
        assert!(response.offline);
        assert_eq!(response.name, "ID: abc");

        let delivered = SubmissionOutcome::Delivered(AttendanceResponse {
            success: true,
            offline: false,
            message: "ok".to_string(),
            name: "Ada".to_string(),
            action: "Entry".to_string(),
            timestamp: "10:00:00".to_string(),
        });
        assert!(!delivered.is_queued());
        assert!(delivered.into_response().is_confirmed());
    }

    #[test]
    fn test_queue_reason_display() {
        assert_eq!(QueueReason::DeviceOffline.to_string(), "device offline");
        assert!(QueueReason::GatewayFailure("timeout".to_string())
            .to_string()
            .contains("timeout"));
    }

    #[test]
    fn test_redact_token() {
        assert_eq!(redact_token("abcdef"), "abc***");
        assert_eq!(redact_token("ab"), "***");
        assert_eq!(redact_token(""), "***");
    }

    #[test]
    fn test_offline_scan_serialization() {
        let scan = sample_scan("abc");
        let json = serde_json::to_string(&scan).unwrap();
        assert!(json.contains("scanInput"));

        let back: OfflineScan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scan);
    }

    #[test]
    fn test_display_time_format() {
        let time = display_time();
        assert_eq!(time.len(), 8);
        assert_eq!(time.matches(':').count(), 2);
    }
}
