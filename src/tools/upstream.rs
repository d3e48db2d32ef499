//! Shared HTTP client for the upstream data providers.
//!
//! Transport failures are logged here with full detail and converted into
//! [`ToolError`] categories; callers never see a raw `reqwest::Error`.

use crate::error::ToolError;
use reqwest::{header, Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct UpstreamClient {
    http: HttpClient,
    /// Name used in client-facing messages, e.g. "OpenERZ".
    service: &'static str,
}

impl UpstreamClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(service: &'static str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http, service })
    }

    /// GETs `url` with `query` and decodes the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ToolError> {
        debug!(service = self.service, %url, ?query, "Upstream request");

        let response = self
            .http
            .get(url)
            .query(query)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(service = self.service, %url, status = status.as_u16(), "Upstream returned error status");
            return Err(status_error(self.service, status));
        }

        response.json::<T>().await.map_err(|e| self.classify(url, e))
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> ToolError {
        warn!(service = self.service, %url, error = %err, "Upstream request failed");
        if err.is_timeout() {
            ToolError::UpstreamTimeout(format!("{} did not answer in time", self.service))
        } else if err.is_decode() {
            ToolError::UpstreamBadResponse(format!("{} returned an unreadable body", self.service))
        } else if err.is_connect() {
            ToolError::UpstreamUnavailable(format!("cannot connect to {}", self.service))
        } else {
            ToolError::UpstreamUnavailable(format!("request to {} failed", self.service))
        }
    }
}

/// Maps a non-success HTTP status to a tool error category.
pub fn status_error(service: &str, status: StatusCode) -> ToolError {
    match status {
        StatusCode::NOT_FOUND => ToolError::NotFound(format!("{} has no such resource", service)),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ToolError::UpstreamTimeout(format!("{} timed out (HTTP {})", service, status.as_u16()))
        }
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => ToolError::UpstreamUnavailable(
            format!("{} is unavailable (HTTP {})", service, status.as_u16()),
        ),
        _ => ToolError::UpstreamBadResponse(format!(
            "{} answered with HTTP {}",
            service,
            status.as_u16()
        )),
    }
}
