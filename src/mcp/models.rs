//! MCP Protocol Models and Constants
//!
//! This module contains the data structures and constants related to the
//! Model Context Protocol (MCP) wire format.

use super::schema::InputSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

// =============================================================================
// MCP Constants
// =============================================================================

/// Server identifier
pub const SERVER_NAME: &str = "openerz-mcp";
/// Server version advertised in `serverInfo`
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Protocol version for MCP
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// JSON-RPC version
pub const JSONRPC_VERSION: &str = "2.0";
/// Header carrying the session token on the streamable HTTP transport
pub const SESSION_HEADER: &str = "mcp-session-id";

// =============================================================================
// MCP Protocol Models
// =============================================================================

/// Standard JSON-RPC 2.0 Request envelope
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (should be "2.0")
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,

    /// Method name to invoke
    pub method: String,

    /// Parameters for the method
    pub params: Option<Value>,

    /// Request identifier
    pub id: Option<Value>,
}

/// Parameters of an `initialize` request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,

    /// Client capabilities; only the keys matter for negotiation.
    #[serde(default)]
    pub capabilities: Map<String, Value>,

    #[serde(default)]
    pub client_info: Option<Value>,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,

    #[serde(default)]
    pub arguments: Value,
}

/// Protocol capabilities the server knows how to negotiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Tools,
    Resources,
    Prompts,
    Logging,
}

impl Capability {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tools" => Some(Self::Tools),
            "resources" => Some(Self::Resources),
            "prompts" => Some(Self::Prompts),
            "logging" => Some(Self::Logging),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tools => "tools",
            Self::Resources => "resources",
            Self::Prompts => "prompts",
            Self::Logging => "logging",
        }
    }

    /// The object advertised for this capability in the `initialize` result.
    fn advertisement(self) -> Value {
        match self {
            // The tool set is frozen at startup.
            Self::Tools | Self::Resources | Self::Prompts => json!({ "listChanged": false }),
            Self::Logging => json!({}),
        }
    }
}

/// Collects the recognised capability names from a client capability map.
pub fn requested_capabilities(capabilities: &Map<String, Value>) -> BTreeSet<Capability> {
    capabilities
        .keys()
        .filter_map(|name| Capability::parse(name))
        .collect()
}

/// Renders a capability set as the `capabilities` object of an `initialize` result.
pub fn capabilities_object(capabilities: &BTreeSet<Capability>) -> Value {
    let map: Map<String, Value> = capabilities
        .iter()
        .map(|c| (c.as_str().to_string(), c.advertisement()))
        .collect();
    Value::Object(map)
}

/// Public description of a tool, as returned by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Successful outcome of a backend wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Human-readable rendering for the `content` block
    pub text: String,
    /// Structured payload returned as `structuredContent`
    pub payload: Value,
}

impl ToolOutput {
    pub fn new(text: impl Into<String>, payload: Value) -> Self {
        Self {
            text: text.into(),
            payload,
        }
    }
}
