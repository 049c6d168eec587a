//! Sessions by lobby code.

use std::collections::HashMap;
use std::sync::Arc;

use degrees_protocol::LobbyCode;
use tokio::sync::{Mutex, RwLock};

use crate::GameSession;

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<GameSession>>;

/// The running sessions, at most one per lobby.
///
/// The map lock is only held to find, insert or remove a handle; session
/// state itself is behind each handle's own mutex.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<LobbyCode, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session for `code`, replacing any previous one.
    pub async fn insert(&self, code: LobbyCode, session: GameSession) -> SessionHandle {
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(code, Arc::clone(&handle));
        handle
    }

    pub async fn get(&self, code: &LobbyCode) -> Option<SessionHandle> {
        self.sessions.read().await.get(code).cloned()
    }

    pub async fn remove(&self, code: &LobbyCode) -> Option<SessionHandle> {
        self.sessions.write().await.remove(code)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
