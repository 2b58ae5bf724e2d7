//! Test doubles shared by the orchestrator and scheduler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};

use crate::gateway::{GatewayError, SubmissionGateway};
use crate::scan::AttendanceResponse;

/// How the fake gateway answers a given scan input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reply {
    Accept,
    Decline,
    Timeout,
    Status(u16),
    Malformed,
}

/// A gateway that answers from a script keyed by scan input.
///
/// Unscripted inputs are accepted. A holding gateway parks every call until
/// [`FakeGateway::release`] hands out a permit.
#[derive(Debug, Default)]
pub(crate) struct FakeGateway {
    scripts: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
    entered: Notify,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn holding() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub(crate) fn script(&self, scan_input: &str, reply: Reply) {
        self.scripts
            .lock()
            .unwrap()
            .insert(scan_input.to_string(), reply);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Resolves once a call has reached the gateway.
    pub(crate) async fn entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }
}

#[async_trait]
impl SubmissionGateway for FakeGateway {
    async fn submit_remote(
        &self,
        _vtoken: &str,
        scan_input: &str,
    ) -> Result<AttendanceResponse, GatewayError> {
        self.calls.lock().unwrap().push(scan_input.to_string());
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get(scan_input)
            .copied()
            .unwrap_or(Reply::Accept);

        match reply {
            Reply::Accept | Reply::Decline => Ok(AttendanceResponse {
                success: reply == Reply::Accept,
                offline: false,
                message: "scripted".to_string(),
                name: "Participant".to_string(),
                action: "Entry".to_string(),
                timestamp: "12:00:00".to_string(),
            }),
            Reply::Timeout => Err(GatewayError::Timeout(Duration::from_secs(8))),
            Reply::Status(code) => Err(GatewayError::Status(code)),
            Reply::Malformed => Err(GatewayError::Malformed("expected value".to_string())),
        }
    }
}
