//! Submission gateway: one remote round trip per scan.
//!
//! The ledger cannot be called directly, so each request goes to a
//! forwarding endpoint with the real request URL in its `target` query
//! parameter. Every call is bounded by a timeout; when it fires the request
//! future is dropped, which cancels the in-flight HTTP exchange.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extract::extract_id;
use crate::scan::{display_time, redact_token, AttendanceResponse};

/// Fallback message for an accepted scan.
pub const ACCEPTED_MESSAGE: &str = "Attendance recorded";

/// Fallback message for a declined scan.
pub const DECLINED_MESSAGE: &str = "Scan failed";

/// Fallback participant name.
pub const DEFAULT_NAME: &str = "Participant";

/// Fallback action label.
pub const DEFAULT_ACTION: &str = "Attendance";

/// Ways a gateway call can fail.
///
/// None of these reach the end user directly; the orchestrator turns them
/// into a queued scan.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The round trip did not finish within the configured bound.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, DNS, TLS or body transfer failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The forwarding endpoint answered with a non-success status.
    #[error("forwarding endpoint responded with status {0}")]
    Status(u16),

    /// The body was not the expected JSON shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether retrying the same request later might succeed.
    ///
    /// A malformed body or a 4xx status usually means the request itself is
    /// wrong; the scan is still queued, but the log says so.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) => true,
            Self::Status(code) => *code >= 500 || *code == 408 || *code == 429,
            Self::Malformed(_) => false,
        }
    }
}

/// Performs the remote submission of one scan.
#[async_trait]
pub trait SubmissionGateway: Send + Sync + std::fmt::Debug {
    /// Attempt to record one attendance event remotely.
    ///
    /// A returned response always has `offline == false`.
    async fn submit_remote(
        &self,
        vtoken: &str,
        scan_input: &str,
    ) -> std::result::Result<AttendanceResponse, GatewayError>;
}

/// The JSON body the ledger sends back.
///
/// Only `success` is typed strictly. The display fields are whatever the
/// ledger put there; see [`display_text`].
#[derive(Debug, Deserialize)]
struct RemoteReply {
    success: bool,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    action: Value,
}

impl RemoteReply {
    fn into_response(self) -> AttendanceResponse {
        let fallback_message = if self.success {
            ACCEPTED_MESSAGE
        } else {
            DECLINED_MESSAGE
        };
        AttendanceResponse {
            success: self.success,
            offline: false,
            message: display_text(self.message).unwrap_or_else(|| fallback_message.to_string()),
            timestamp: display_text(self.timestamp).unwrap_or_else(display_time),
            name: display_text(self.name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            action: display_text(self.action).unwrap_or_else(|| DEFAULT_ACTION.to_string()),
        }
    }
}

/// Render a display field, or `None` when the fallback should be used.
///
/// Null, `false` and the empty string fall back. Numbers and other values
/// are shown as their JSON text.
fn display_text(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// HTTP implementation of [`SubmissionGateway`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    remote_url: Url,
    proxy_url: Url,
    timeout: Duration,
}

impl HttpGateway {
    /// Create a gateway for the given endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(remote_url: Url, proxy_url: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            remote_url,
            proxy_url,
            timeout,
        })
    }

    /// Create a gateway from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an endpoint is invalid or the client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.remote_url()?,
            config.proxy_url()?,
            config.gateway_timeout(),
        )
    }

    /// The configured timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the forwarding request for one scan.
    ///
    /// `now_ms` is the cache-busting `_t` value.
    #[must_use]
    pub fn request_url(&self, vtoken: &str, scan_input: &str, now_ms: i64) -> Url {
        let mut target = self.remote_url.clone();
        target
            .query_pairs_mut()
            .append_pair("id", &extract_id(scan_input))
            .append_pair("vtoken", vtoken)
            .append_pair("pwa", "1")
            .append_pair("_t", &now_ms.to_string());

        let mut proxied = self.proxy_url.clone();
        proxied
            .query_pairs_mut()
            .append_pair("target", target.as_str());
        proxied
    }

    async fn round_trip(&self, url: Url) -> std::result::Result<AttendanceResponse, GatewayError> {
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let reply: RemoteReply =
            serde_json::from_slice(&body).map_err(|e| GatewayError::Malformed(e.to_string()))?;
        Ok(reply.into_response())
    }
}

#[async_trait]
impl SubmissionGateway for HttpGateway {
    async fn submit_remote(
        &self,
        vtoken: &str,
        scan_input: &str,
    ) -> std::result::Result<AttendanceResponse, GatewayError> {
        let url = self.request_url(vtoken, scan_input, Utc::now().timestamp_millis());
        debug!(
            participant = %extract_id(scan_input),
            vtoken = %redact_token(vtoken),
            "Submitting scan through forwarding endpoint"
        );

        match tokio::time::timeout(self.timeout, self.round_trip(url)).await {
            Ok(Ok(response)) => {
                debug!(success = response.success, "Remote answered");
                Ok(response)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Remote submission failed");
                Err(e)
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Remote submission timed out");
                Err(GatewayError::Timeout(self.timeout))
            }
        }
    }
}
