//! MCP (Model Context Protocol) route handlers
//!
//! Streamable HTTP transport: JSON-RPC messages are POSTed to `/mcp`, the
//! session token travels in the `mcp-session-id` header, and `DELETE /mcp`
//! ends the session.

use super::dispatcher::{Dispatcher, Envelope};
use super::helpers::{protocol_error, sse_message};
use super::models::SESSION_HEADER;
use super::session::{Session, SessionState};
use crate::error::ProtocolError;
use crate::state::SharedState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::{info, warn};

/// Creates routes for MCP-related operations
pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(handle_mcp))
        .route(
            "/mcp",
            post(handle_mcp)
                .get(handle_mcp_sse)
                .delete(handle_mcp_delete),
        )
        .route(
            "/mcp/",
            post(handle_mcp)
                .get(handle_mcp_sse)
                .delete(handle_mcp_delete),
        ) // Trailing slash safety
}

/// Handle SSE (Server-Sent Events) handshake for GET requests
async fn handle_mcp_sse() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/event-stream")],
        "event: endpoint\ndata: /mcp\n\n",
    )
}

/// Endpoint: POST /mcp
async fn handle_mcp(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let stream = accepts_event_stream(&headers);

    let envelope = match Dispatcher::parse(&body) {
        Ok(envelope) => envelope,
        Err(response) => {
            warn!("Rejected malformed JSON-RPC envelope");
            return reply(StatusCode::BAD_REQUEST, Some(response), stream, None);
        }
    };

    match session_header(&headers) {
        Some(id) => dispatch_in_session(&state, id, envelope, stream).await,
        None => dispatch_first_contact(&state, envelope, stream).await,
    }
}

/// A request without a session token. Only a successful `initialize` keeps
/// the freshly created session; anything else is answered and discarded.
async fn dispatch_first_contact(state: &SharedState, envelope: Envelope, stream: bool) -> Response {
    let mut session = Session::new();
    let response = state.dispatcher.dispatch(&mut session, envelope).await;

    if session.state() != SessionState::Initialized {
        return reply(StatusCode::OK, response, stream, None);
    }

    let id = session.id().to_string();
    state.sessions.insert(session);
    info!(session = %id, active = state.sessions.len(), "Session opened");
    reply(StatusCode::OK, response, stream, Some(&id))
}

async fn dispatch_in_session(
    state: &SharedState,
    id: &str,
    envelope: Envelope,
    stream: bool,
) -> Response {
    let Some(slot) = state.sessions.get(id) else {
        warn!(session = %id, method = %envelope.method(), "Request for unknown session");
        let response = protocol_error(envelope.id(), &ProtocolError::SessionNotInitialized);
        return reply(StatusCode::NOT_FOUND, Some(response), stream, None);
    };

    let mut session = slot.lock().await;
    tokio::select! {
        response = state.dispatcher.dispatch(&mut session, envelope) => {
            reply(StatusCode::OK, response, stream, None)
        }
        _ = slot.closed() => {
            info!(session = %id, "Session closed during request; response dropped");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Endpoint: DELETE /mcp
async fn handle_mcp_delete(State(state): State<SharedState>, headers: HeaderMap) -> StatusCode {
    match session_header(&headers) {
        None => StatusCode::BAD_REQUEST,
        Some(id) if state.sessions.close(id).await => StatusCode::NO_CONTENT,
        Some(_) => StatusCode::NOT_FOUND,
    }
}

fn session_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

fn accepts_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

/// Writes a dispatcher outcome as plain JSON or as a single SSE event.
/// No outcome (a notification) becomes `202 Accepted` with an empty body.
fn reply(
    status: StatusCode,
    response: Option<Value>,
    stream: bool,
    session_id: Option<&str>,
) -> Response {
    let mut http = match response {
        None => StatusCode::ACCEPTED.into_response(),
        Some(body) if stream => (
            status,
            [(header::CONTENT_TYPE, "text/event-stream")],
            sse_message(&body),
        )
            .into_response(),
        Some(body) => (status, Json(body)).into_response(),
    };

    if let Some(id) = session_id.and_then(|id| HeaderValue::from_str(id).ok()) {
        http.headers_mut().insert(SESSION_HEADER, id);
    }

    http
}
