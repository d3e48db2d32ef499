//! Application State
//!
//! Everything the HTTP handlers share: the dispatcher (with its frozen tool
//! registry) and the live session table.

use crate::mcp::dispatcher::Dispatcher;
use crate::mcp::session::SessionManager;
use std::sync::Arc;

/// Shared application state that can be safely passed between threads
pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub dispatcher: Dispatcher,

    /// Sessions keyed by `mcp-session-id`.
    /// DashMap allows concurrent access without external Mutexes.
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            sessions: SessionManager::new(),
        }
    }
}
