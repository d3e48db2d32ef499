//! JSON-RPC request dispatch.
//!
//! The dispatcher knows nothing about HTTP: it turns one parsed envelope and
//! the caller's [`Session`] into at most one response envelope.

use super::helpers::{protocol_error, rpc_success, tool_result};
use super::models::{
    capabilities_object, requested_capabilities, Capability, InitializeParams, JsonRpcRequest,
    ToolCallParams, PROTOCOL_VERSION, SERVER_NAME, SERVER_VERSION,
};
use super::registry::ToolRegistry;
use super::session::Session;
use crate::error::{ProtocolError, ToolError};
use futures_util::FutureExt;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// A parsed JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    /// A message without an id; it never gets a response.
    Notification { method: String },
}

impl Envelope {
    pub fn method(&self) -> &str {
        match self {
            Self::Request { method, .. } | Self::Notification { method } => method,
        }
    }

    /// The request id, or `null` for notifications.
    pub fn id(&self) -> Value {
        match self {
            Self::Request { id, .. } => id.clone(),
            Self::Notification { .. } => Value::Null,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    supported: BTreeSet<Capability>,
    call_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher that advertises the `tools` capability and bounds
    /// every tool call by `call_timeout`.
    pub fn new(registry: Arc<ToolRegistry>, call_timeout: Duration) -> Self {
        Self {
            registry,
            supported: BTreeSet::from([Capability::Tools]),
            call_timeout,
        }
    }

    pub fn with_supported_capabilities(mut self, supported: BTreeSet<Capability>) -> Self {
        self.supported = supported;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Parses a raw request body.
    ///
    /// On failure returns the ready-made `ParseError` response, carrying the
    /// request id when it could be recovered.
    pub fn parse(body: &[u8]) -> Result<Envelope, Value> {
        let value: Value = serde_json::from_slice(body).map_err(|e| {
            debug!(error = %e, "Unparseable request body");
            protocol_error(Value::Null, &ProtocolError::ParseError("invalid JSON".into()))
        })?;

        let recovered_id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = serde_json::from_value(value).map_err(|e| {
            protocol_error(
                recovered_id,
                &ProtocolError::ParseError(format!("malformed request envelope: {}", e)),
            )
        })?;

        match request.id {
            Some(id) if !id.is_null() => Ok(Envelope::Request {
                id,
                method: request.method,
                params: request.params.unwrap_or(Value::Null),
            }),
            _ if request.method.starts_with("notifications/") => Ok(Envelope::Notification {
                method: request.method,
            }),
            _ => Err(protocol_error(
                Value::Null,
                &ProtocolError::ParseError("request is missing an id".into()),
            )),
        }
    }

    /// Handles one envelope against `session`.
    ///
    /// Returns `None` for notifications.
    pub async fn dispatch(&self, session: &mut Session, envelope: Envelope) -> Option<Value> {
        match envelope {
            Envelope::Notification { method } => {
                debug!(session = %session.id(), %method, "Notification received");
                None
            }
            Envelope::Request { id, method, params } => {
                info!(session = %session.id(), %method, id = %id, "MCP call");
                let response = match self.handle_request(session, &method, params).await {
                    Ok(result) => rpc_success(id, result),
                    Err(err) => {
                        warn!(
                            session = %session.id(),
                            %method,
                            code = err.code(),
                            error = %err,
                            "MCP call failed"
                        );
                        protocol_error(id, &err)
                    }
                };
                Some(response)
            }
        }
    }

    async fn handle_request(
        &self,
        session: &mut Session,
        method: &str,
        params: Value,
    ) -> Result<Value, ProtocolError> {
        session.admit(method)?;

        match method {
            "initialize" => self.handle_initialize(session, params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.handle_tools_list()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(ProtocolError::MethodNotFound(method.to_string())),
        }
    }

    // =========================================================================
    // MCP Method Handlers
    // =========================================================================

    /// Handles `initialize` request (Handshake).
    fn handle_initialize(
        &self,
        session: &mut Session,
        params: Value,
    ) -> Result<Value, ProtocolError> {
        let params: InitializeParams = if params.is_null() {
            InitializeParams::default()
        } else {
            serde_json::from_value(params).map_err(|e| {
                ProtocolError::InvalidParams(format!("invalid initialize params: {}", e))
            })?
        };

        let requested = requested_capabilities(&params.capabilities);
        session.handle_initialize(&requested, &self.supported)?;

        info!(
            session = %session.id(),
            granted = %granted_names(session.capabilities()),
            client = ?params.client_info,
            client_protocol = ?params.protocol_version,
            "Session initialized"
        );

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": capabilities_object(session.capabilities()),
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        }))
    }

    /// Handles `tools/list` request.
    fn handle_tools_list(&self) -> Value {
        json!({ "tools": self.registry.list() })
    }

    /// Handles `tools/call` request.
    async fn handle_tools_call(&self, params: Value) -> Result<Value, ProtocolError> {
        let params: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| ProtocolError::InvalidParams(format!("invalid tools/call params: {}", e)))?;

        let (descriptor, handler) = self.registry.resolve(&params.name)?;
        let arguments = descriptor.input_schema.validate(&params.arguments)?;

        let started = Instant::now();
        let call = AssertUnwindSafe(handler.call(arguments)).catch_unwind();
        let outcome = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(result)) => result.map_err(ProtocolError::from),
            Ok(Err(_)) => {
                error!(tool = %params.name, "Tool handler panicked");
                Err(ProtocolError::Internal(format!(
                    "tool '{}' failed unexpectedly",
                    params.name
                )))
            }
            Err(_) => Err(ToolError::UpstreamTimeout(format!(
                "tool '{}' did not complete within {:?}",
                params.name, self.call_timeout
            ))
            .into()),
        };

        debug!(
            tool = %params.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "Tool call finished"
        );

        outcome.map(tool_result)
    }
}

fn granted_names(capabilities: &BTreeSet<Capability>) -> String {
    capabilities
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(",")
}
