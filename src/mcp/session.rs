//! MCP session state
//!
//! A [`Session`] is the per-client protocol state machine. Every legality
//! check on the lifecycle lives here, so no dispatch path can skip it.
//! [`SessionManager`] keeps the live sessions of the HTTP transport, keyed by
//! the `mcp-session-id` token.

use super::models::Capability;
use crate::error::ProtocolError;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

/// Linear lifecycle: `Uninitialized → Initialized → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initialized,
    Closed,
}

#[derive(Debug)]
pub struct Session {
    id: String,
    state: SessionState,
    capabilities: BTreeSet<Capability>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an uninitialized session with a fresh random token.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            state: SessionState::Uninitialized,
            capabilities: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    /// Decides whether `method` may run in the current state.
    pub fn admit(&self, method: &str) -> Result<(), ProtocolError> {
        if method != "initialize" {
            return self.require_initialized();
        }
        match self.state {
            SessionState::Uninitialized => Ok(()),
            SessionState::Initialized => Err(ProtocolError::AlreadyInitialized),
            SessionState::Closed => Err(ProtocolError::SessionNotInitialized),
        }
    }

    /// Completes the handshake and records `requested ∩ supported`.
    pub fn handle_initialize(
        &mut self,
        requested: &BTreeSet<Capability>,
        supported: &BTreeSet<Capability>,
    ) -> Result<&BTreeSet<Capability>, ProtocolError> {
        self.admit("initialize")?;
        self.capabilities = requested.intersection(supported).copied().collect();
        self.state = SessionState::Initialized;
        Ok(&self.capabilities)
    }

    /// Fails unless the handshake has completed and the session is open.
    pub fn require_initialized(&self) -> Result<(), ProtocolError> {
        match self.state {
            SessionState::Initialized => Ok(()),
            _ => Err(ProtocolError::SessionNotInitialized),
        }
    }

    /// Idempotent.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

/// A live session plus the machinery that serializes its requests.
pub struct SessionSlot {
    session: Mutex<Session>,
    closed: watch::Sender<bool>,
}

impl SessionSlot {
    fn new(session: Session) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            session: Mutex::new(session),
            closed,
        }
    }

    /// Waits for this session's turn. Requests of one session run one at a time.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    /// Resolves once the session has been closed.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        // The sender lives as long as the slot, so this only returns on close.
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn signal_close(&self) {
        self.closed.send_replace(true);
    }
}

/// Live sessions of the HTTP transport.
#[derive(Default)]
pub struct SessionManager {
    sessions: DashMap<String, Arc<SessionSlot>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> Arc<SessionSlot> {
        let id = session.id().to_string();
        let slot = Arc::new(SessionSlot::new(session));
        self.sessions.insert(id, Arc::clone(&slot));
        slot
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionSlot>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Closes and forgets a session. In-flight calls on it are abandoned.
    ///
    /// Returns `false` if no such session exists.
    pub async fn close(&self, id: &str) -> bool {
        let Some((_, slot)) = self.sessions.remove(id) else {
            return false;
        };
        slot.signal_close();
        slot.lock().await.close();
        info!(session = %id, "Session closed");
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tools_only() -> BTreeSet<Capability> {
        BTreeSet::from([Capability::Tools])
    }

    #[test]
    fn test_initialize_negotiates_intersection() {
        let mut session = Session::new();
        let requested = BTreeSet::from([Capability::Tools, Capability::Prompts]);
        let granted = session.handle_initialize(&requested, &tools_only()).unwrap();
        assert_eq!(granted, &tools_only());
        assert_eq!(session.state(), SessionState::Initialized);
    }

    #[test]
    fn test_initialize_never_grants_unrequested() {
        let mut session = Session::new();
        let granted = session
            .handle_initialize(&BTreeSet::new(), &tools_only())
            .unwrap();
        assert!(granted.is_empty());
    }

    #[test]
    fn test_second_initialize_fails() {
        let mut session = Session::new();
        session.handle_initialize(&tools_only(), &tools_only()).unwrap();
        let err = session
            .handle_initialize(&tools_only(), &tools_only())
            .unwrap_err();
        assert_eq!(err, ProtocolError::AlreadyInitialized);
        assert_eq!(session.capabilities(), &tools_only());
    }

    #[test]
    fn test_admission_rules() {
        let mut session = Session::new();
        assert_eq!(
            session.admit("tools/call"),
            Err(ProtocolError::SessionNotInitialized)
        );
        assert_eq!(
            session.admit("no/such/method"),
            Err(ProtocolError::SessionNotInitialized)
        );
        assert!(session.admit("initialize").is_ok());

        session.handle_initialize(&tools_only(), &tools_only()).unwrap();
        assert!(session.admit("tools/list").is_ok());
        assert_eq!(
            session.admit("initialize"),
            Err(ProtocolError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = Session::new();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.admit("initialize"),
            Err(ProtocolError::SessionNotInitialized)
        );
        assert!(session.require_initialized().is_err());
    }

    #[test]
    fn test_closed_session_rejects_every_method() {
        let mut session = Session::new();
        session.handle_initialize(&tools_only(), &tools_only()).unwrap();
        assert!(session.require_initialized().is_ok());

        session.close();
        for method in ["tools/list", "tools/call", "ping"] {
            assert_eq!(
                session.admit(method),
                Err(ProtocolError::SessionNotInitialized)
            );
        }
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(Session::new().id(), Session::new().id());
    }

    #[tokio::test]
    async fn test_manager_close_wakes_waiters() {
        let manager = SessionManager::new();
        let session = Session::new();
        let id = session.id().to_string();
        let slot = manager.insert(session);
        assert_eq!(manager.len(), 1);

        let waiter = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.closed().await })
        };

        assert!(manager.close(&id).await);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("close signal not delivered")
            .unwrap();

        assert!(manager.get(&id).is_none());
        assert_eq!(slot.lock().await.state(), SessionState::Closed);
        assert!(!manager.close(&id).await);
    }
}
