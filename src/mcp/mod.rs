//! Model Context Protocol (MCP) Module
//!
//! This module contains the protocol-facing dispatch layer:
//! - Protocol models (JsonRpcRequest, descriptors, capabilities, constants)
//! - Input schemas and argument validation
//! - The tool registry and the shared handler interface
//! - Session state machine and session table
//! - The transport-agnostic dispatcher
//! - Streamable HTTP route handlers

pub mod dispatcher;
pub mod handlers;
pub mod helpers;
pub mod models;
pub mod registry;
pub mod schema;
pub mod session;

// Re-export commonly used types and functions
pub use dispatcher::Dispatcher;
pub use handlers::routes;
pub use registry::{ToolHandler, ToolRegistry};
