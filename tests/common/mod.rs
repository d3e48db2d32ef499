//! Shared fixtures: stubbed upstream wrappers and an app builder.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use openerz_mcp::error::ToolError;
use openerz_mcp::mcp::models::SESSION_HEADER;
use openerz_mcp::mcp::Dispatcher;
use openerz_mcp::router::create_app_router;
use openerz_mcp::state::AppState;
use openerz_mcp::tools::waste::{CalendarEntry, CalendarQuery};
use openerz_mcp::tools::weather::{Measurement, MeasurementQuery};
use openerz_mcp::tools::{create_registry, WasteCalendar, WeatherStations};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot`

pub const FIXED_DATE: &str = "2024-05-02";

/// Calendar with one region and a single upcoming paper collection.
pub struct StubCalendar {
    /// Delay applied to calendar lookups.
    pub delay: Option<Duration>,
}

#[async_trait]
impl WasteCalendar for StubCalendar {
    async fn regions(&self) -> Result<Vec<String>, ToolError> {
        Ok(vec!["zurich".into()])
    }

    async fn areas(&self, _region: &str) -> Result<Vec<String>, ToolError> {
        Ok(vec!["8001".into()])
    }

    async fn waste_types(&self) -> Result<Vec<String>, ToolError> {
        Ok(vec!["paper".into(), "cardboard".into()])
    }

    async fn upcoming(&self, query: &CalendarQuery) -> Result<Vec<CalendarEntry>, ToolError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(vec![CalendarEntry {
            date: FIXED_DATE.into(),
            waste_type: Some(query.waste_type.clone().unwrap_or_else(|| "paper".into())),
            region: Some(query.region.clone()),
            area: Some("8001".into()),
            description: None,
        }])
    }
}

/// Weather backend that knows one station and never has readings.
pub struct StubWeather;

#[async_trait]
impl WeatherStations for StubWeather {
    fn stations(&self) -> Vec<String> {
        vec!["mythenquai".into()]
    }

    async fn measurements(&self, query: &MeasurementQuery) -> Result<Vec<Measurement>, ToolError> {
        Err(ToolError::NotFound(format!(
            "no readings for station '{}'",
            query.station
        )))
    }
}

pub fn build_state(calendar: StubCalendar, call_timeout: Duration) -> Arc<AppState> {
    let registry = create_registry(Arc::new(calendar), Arc::new(StubWeather))
        .expect("tool names are unique");
    Arc::new(AppState::new(Dispatcher::new(Arc::new(registry), call_timeout)))
}

/// Helper function to create a test app instance
pub fn create_test_app() -> axum::Router {
    create_app_router(build_state(StubCalendar { delay: None }, Duration::from_secs(5)))
}

/// App whose calendar lookups outlast the tool call timeout.
pub fn create_slow_app(call_timeout: Duration) -> axum::Router {
    create_app_router(build_state(
        StubCalendar {
            delay: Some(Duration::from_secs(30)),
        },
        call_timeout,
    ))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub session: Option<String>,
    pub content_type: Option<String>,
    pub raw: String,
    pub body: Value,
}

/// Sends a raw body to `POST /mcp`.
pub async fn post_raw(
    app: &axum::Router,
    body: impl Into<Body>,
    session: Option<&str>,
    accept: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(id) = session {
        builder = builder.header(SESSION_HEADER, id);
    }
    if let Some(accept) = accept {
        builder = builder.header("accept", accept);
    }
    let request = builder.body(body.into()).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let session = response
        .headers()
        .get(SESSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let content_type = response
        .headers()
        .get("content-type")
        .map(|v| v.to_str().unwrap().to_string());

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let raw = String::from_utf8(body_bytes.to_vec()).unwrap();
    let body: Value = serde_json::from_str(&raw).unwrap_or(json!({}));

    TestResponse {
        status,
        session,
        content_type,
        raw,
        body,
    }
}

/// Helper function to send a JSON-RPC request and get the response
pub async fn send_jsonrpc_request(
    app: &axum::Router,
    session: Option<&str>,
    method: &str,
    params: Value,
    id: i32,
) -> TestResponse {
    let request_body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": id
    });
    post_raw(app, request_body.to_string(), session, None).await
}

/// Performs the handshake and returns the new session id.
pub async fn initialize(app: &axum::Router) -> String {
    let response = send_jsonrpc_request(
        app,
        None,
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "clientInfo": { "name": "test-client", "version": "1.0" }
        }),
        1,
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    response.session.expect("initialize returns a session id")
}

pub async fn call_tool(
    app: &axum::Router,
    session: &str,
    name: &str,
    arguments: Value,
) -> TestResponse {
    send_jsonrpc_request(
        app,
        Some(session),
        "tools/call",
        json!({ "name": name, "arguments": arguments }),
        3,
    )
    .await
}
