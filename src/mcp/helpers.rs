//! MCP Protocol Helpers
//!
//! This module contains helper functions for JSON-RPC envelopes, tool result
//! content and SSE framing.

use super::models::{ToolOutput, JSONRPC_VERSION};
use crate::error::ProtocolError;
use serde_json::{json, Value};

/// Builds a JSON-RPC 2.0 success response.
///
/// # Arguments
///
/// * `id` – The request identifier that must be echoed back.
/// * `result` – The payload representing the successful outcome.
pub fn rpc_success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

/// Builds a JSON-RPC 2.0 error response.
///
/// # Arguments
///
/// * `id` – The request identifier (or `null` if unavailable).
/// * `code` – The JSON-RPC error code (e.g., -32601 for method not found).
/// * `message` – Human-readable description of the error.
pub fn rpc_error(id: Value, code: i32, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        }
    })
}

/// Builds the error envelope for a [`ProtocolError`], tagging it with its
/// category under `error.data.kind`.
pub fn protocol_error(id: Value, error: &ProtocolError) -> Value {
    let mut envelope = rpc_error(id, error.code(), error.to_string());
    envelope["error"]["data"] = json!({ "kind": error.kind() });
    envelope
}

/// Shapes a wrapper's output as an MCP `tools/call` result.
pub fn tool_result(output: ToolOutput) -> Value {
    json!({
        "content": [{ "type": "text", "text": output.text }],
        "structuredContent": output.payload,
        "isError": false,
    })
}

/// Frames one JSON-RPC message as a Server-Sent Event.
pub fn sse_message(message: &Value) -> String {
    format!("event: message\ndata: {}\n\n", message)
}
