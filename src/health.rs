//! Health-check client.
//!
//! Exercises a running server from the outside: liveness probe, MCP
//! handshake over the streamable HTTP transport, and a `tools/list` call
//! that must contain every expected tool.

use crate::mcp::models::{PROTOCOL_VERSION, SESSION_HEADER};
use crate::tools::waste::{
    LIST_AREAS_TOOL, LIST_REGIONS_TOOL, LIST_TYPES_TOOL, NEXT_COLLECTION_FOR_TYPE_TOOL,
    NEXT_COLLECTION_TOOL,
};
use crate::tools::weather::{LIST_STATIONS_TOOL, MEASUREMENTS_TOOL};
use reqwest::{header, Client as HttpClient, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming the server under test.
pub const SERVER_URL_ENV: &str = "MCP_SERVER_URL";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

/// Tools every deployment must expose.
pub const EXPECTED_TOOLS: [&str; 7] = [
    NEXT_COLLECTION_TOOL,
    NEXT_COLLECTION_FOR_TYPE_TOOL,
    LIST_REGIONS_TOOL,
    LIST_AREAS_TOOL,
    LIST_TYPES_TOOL,
    LIST_STATIONS_TOOL,
    MEASUREMENTS_TOOL,
];

#[derive(Debug, Error)]
pub enum HealthCheckError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("initialize response has no mcp-session-id header")]
    MissingSessionId,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("{method} failed with code {code}: {message}")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },

    #[error("expected tools missing: {}", .0.join(", "))]
    MissingTools(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub session_id: String,
    pub server_name: String,
    pub server_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedTool {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub liveness_status: u16,
    pub handshake: Handshake,
    pub tools: Vec<ListedTool>,
}

/// Extracts the JSON payload of the first `event: message` in an SSE body.
pub fn parse_sse_response(body: &str) -> Result<Value, HealthCheckError> {
    if !body.contains("event: message") {
        return Err(HealthCheckError::Malformed(
            "response is not in SSE format (missing 'event: message')".into(),
        ));
    }
    let data = body
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .ok_or_else(|| HealthCheckError::Malformed("no 'data:' line in SSE response".into()))?;
    serde_json::from_str(data).map_err(|e| HealthCheckError::Malformed(e.to_string()))
}

pub struct HealthCheckClient {
    base_url: String,
    http: HttpClient,
}

impl HealthCheckClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HealthCheckError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| HealthCheckError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, http })
    }

    /// Reads the target from `MCP_SERVER_URL`, falling back to localhost.
    pub fn from_env(timeout: Duration) -> Result<Self, HealthCheckError> {
        let base_url =
            std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::new(base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`; anything but 200 is a failure.
    pub async fn liveness(&self) -> Result<u16, HealthCheckError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| HealthCheckError::Http {
                url: url.clone(),
                source,
            })?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(HealthCheckError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }

    pub async fn initialize(&self) -> Result<Handshake, HealthCheckError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "clientInfo": { "name": "health-check", "version": env!("CARGO_PKG_VERSION") }
            }
        });

        let (session_id, message) = self.post("initialize", request, None).await?;
        let session_id = session_id.ok_or(HealthCheckError::MissingSessionId)?;
        let server_info = &message["result"]["serverInfo"];
        let server_name = server_info["name"]
            .as_str()
            .ok_or_else(|| HealthCheckError::Malformed("initialize result has no serverInfo".into()))?;

        Ok(Handshake {
            session_id,
            server_name: server_name.to_string(),
            server_version: server_info["version"].as_str().unwrap_or_default().to_string(),
        })
    }

    /// Acknowledges the handshake as MCP clients do.
    pub async fn notify_initialized(&self, session_id: &str) -> Result<(), HealthCheckError> {
        let url = format!("{}/mcp", self.base_url);
        let response = self
            .http
            .post(&url)
            .header(SESSION_HEADER, session_id)
            .json(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .send()
            .await
            .map_err(|source| HealthCheckError::Http {
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(HealthCheckError::Status {
                url,
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    pub async fn list_tools(&self, session_id: &str) -> Result<Vec<ListedTool>, HealthCheckError> {
        let request = json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list", "params": {} });
        let (_, message) = self.post("tools/list", request, Some(session_id)).await?;

        let tools = message["result"]["tools"]
            .as_array()
            .ok_or_else(|| HealthCheckError::Malformed("tools/list result has no tools array".into()))?;

        Ok(tools
            .iter()
            .map(|tool| ListedTool {
                name: tool["name"].as_str().unwrap_or_default().to_string(),
                description: tool["description"]
                    .as_str()
                    .unwrap_or("No description")
                    .to_string(),
            })
            .collect())
    }

    /// Ends the session. Servers that do not support termination are tolerated.
    pub async fn close(&self, session_id: &str) -> Result<(), HealthCheckError> {
        let url = format!("{}/mcp", self.base_url);
        self.http
            .delete(&url)
            .header(SESSION_HEADER, session_id)
            .send()
            .await
            .map_err(|source| HealthCheckError::Http { url, source })?;
        Ok(())
    }

    /// Runs the full check and verifies every name in `expected` is listed.
    pub async fn run(&self, expected: &[&str]) -> Result<HealthReport, HealthCheckError> {
        let liveness_status = self.liveness().await?;
        info!(url = %self.base_url, status = liveness_status, "Server is alive");

        let handshake = self.initialize().await?;
        info!(
            server = %handshake.server_name,
            version = %handshake.server_version,
            session = %handshake.session_id,
            "MCP session initialized"
        );
        self.notify_initialized(&handshake.session_id).await?;

        let tools = self.list_tools(&handshake.session_id).await;
        self.close(&handshake.session_id).await?;
        let tools = tools?;

        let missing: Vec<String> = expected
            .iter()
            .filter(|name| !tools.iter().any(|t| t.name == **name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(HealthCheckError::MissingTools(missing));
        }

        Ok(HealthReport {
            liveness_status,
            handshake,
            tools,
        })
    }

    /// POSTs one JSON-RPC request, accepting both JSON and SSE answers.
    /// Returns the session header (if any) and the decoded response message.
    async fn post(
        &self,
        method: &'static str,
        request: Value,
        session_id: Option<&str>,
    ) -> Result<(Option<String>, Value), HealthCheckError> {
        let url = format!("{}/mcp", self.base_url);
        let mut builder = self
            .http
            .post(&url)
            .header(header::ACCEPT, "application/json, text/event-stream")
            .json(&request);
        if let Some(id) = session_id {
            builder = builder.header(SESSION_HEADER, id);
        }

        let response = builder.send().await.map_err(|source| HealthCheckError::Http {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(HealthCheckError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let is_sse = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));

        let body = response
            .text()
            .await
            .map_err(|source| HealthCheckError::Http { url, source })?;
        debug!(method, %body, "MCP response");

        let message = if is_sse {
            parse_sse_response(&body)?
        } else {
            serde_json::from_str(&body).map_err(|e| HealthCheckError::Malformed(e.to_string()))?
        };

        if let Some(error) = message.get("error") {
            return Err(HealthCheckError::Rpc {
                method,
                code: error["code"].as_i64().unwrap_or_default(),
                message: error["message"].as_str().unwrap_or_default().to_string(),
            });
        }

        Ok((session, message))
    }
}
