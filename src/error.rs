//! Error types for the MCP server.
//!
//! Protocol errors are what the client sees; tool errors are what backend
//! wrappers raise. Every variant maps to a stable JSON-RPC code.

use serde::Serialize;
use thiserror::Error;

/// Stable error category, echoed to clients in `error.data.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    ParseError,
    MethodNotFound,
    InvalidParams,
    Internal,
    SessionNotInitialized,
    AlreadyInitialized,
    UnknownTool,
    UpstreamUnavailable,
    UpstreamTimeout,
    UpstreamBadResponse,
    NotFound,
    InvalidArgument,
}

impl ErrorKind {
    /// Returns the JSON-RPC error code for this category.
    pub fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
            Self::SessionNotInitialized => -32002,
            Self::AlreadyInitialized => -32003,
            Self::UnknownTool => -32004,
            Self::UpstreamUnavailable => -32010,
            Self::UpstreamTimeout => -32011,
            Self::UpstreamBadResponse => -32012,
            Self::NotFound => -32013,
            Self::InvalidArgument => -32014,
        }
    }
}

/// Failures a backend wrapper may surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream service timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Unexpected response from upstream service: {0}")]
    UpstreamBadResponse(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::UpstreamTimeout(_) => ErrorKind::UpstreamTimeout,
            Self::UpstreamBadResponse(_) => ErrorKind::UpstreamBadResponse,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// JSON-RPC and session-level errors returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Session not initialized")]
    SessionNotInitialized,

    #[error("Session already initialized")]
    AlreadyInitialized,

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseError(_) => ErrorKind::ParseError,
            Self::MethodNotFound(_) => ErrorKind::MethodNotFound,
            Self::InvalidParams(_) => ErrorKind::InvalidParams,
            Self::Internal(_) => ErrorKind::Internal,
            Self::SessionNotInitialized => ErrorKind::SessionNotInitialized,
            Self::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::Tool(e) => e.kind(),
        }
    }

    /// Returns the JSON-RPC 2.0 error code.
    pub fn code(&self) -> i32 {
        self.kind().code()
    }
}

/// Tool registry construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateToolName(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
