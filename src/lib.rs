//! OpenERZ MCP Library
//!
//! MCP (Model Context Protocol) server exposing Zurich waste collection
//! dates (OpenERZ) and lake weather station readings (Tecdottir) as tools.

// Protocol
pub mod error;
pub mod mcp;

// Domain
pub mod tools;

// Infrastructure
pub mod config;
pub mod health;
pub mod router;
pub mod state;
