//! Upstream Health Probe
//!
//! One-shot check of the upstream gateway's `/api/v1/health` endpoint. The
//! feed runs regardless of the result; the probe only tells the operator
//! whether the REST side of the gateway is reachable.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use super::HealthStatus;
use crate::infrastructure::feed::Credential;

/// Path of the upstream health endpoint.
pub const HEALTH_PATH: &str = "/api/v1/health";

/// Upstream health report. Every field but `status` is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpstreamHealth {
    /// Overall upstream status.
    pub status: HealthStatus,
    /// Upstream clock, as reported.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Frames received by the gateway.
    #[serde(default)]
    pub ticks_received: Option<u64>,
    /// Frames the gateway decoded.
    #[serde(default)]
    pub ticks_decoded: Option<u64>,
    /// Frames the gateway dropped.
    #[serde(default)]
    pub decode_errors: Option<u64>,
    /// Symbols the gateway tracks.
    #[serde(default)]
    pub tracked_symbols: Option<u64>,
}

/// Probe failures.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Request could not be sent or timed out.
    #[error("health request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Upstream answered with a non-success status.
    #[error("health check failed: {0}")]
    Status(reqwest::StatusCode),

    /// Body was not a health report.
    #[error("invalid health response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// HTTP client for the upstream health endpoint.
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
    token: Option<Credential>,
}

impl HealthProbe {
    /// Create a probe for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        token: Option<Credential>,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProbeError::Http)?;

        Ok(Self {
            client,
            url: format!("{}{HEALTH_PATH}", base_url.trim_end_matches('/')),
            token,
        })
    }

    /// Fetch and decode the upstream health report.
    ///
    /// # Errors
    ///
    /// See [`ProbeError`].
    pub async fn check(&self) -> Result<UpstreamHealth, ProbeError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose()));
        }

        let response = request.send().await.map_err(ProbeError::Http)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status));
        }

        response
            .json::<UpstreamHealth>()
            .await
            .map_err(ProbeError::Decode)
    }

    /// Full URL probed.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}
