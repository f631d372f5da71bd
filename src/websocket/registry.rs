use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::Message;
use crate::error::WebSocketError;
use crate::websocket::Session;

/// Process-wide set of sessions whose supervisor is running.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false`, leaving the registry untouched, if the session is
    /// already registered.
    pub async fn add(&self, session: Arc<Session>) -> bool {
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&id) {
            warn!("Session {} is already registered", id);
            return false;
        }
        sessions.insert(id, session);
        info!("Added session {} to registry ({} active)", id, sessions.len());
        true
    }

    pub async fn remove(&self, id: &Uuid) -> Option<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id);
        if removed.is_some() {
            info!("Removed session {} from registry ({} active)", id, sessions.len());
        }
        removed
    }

    pub async fn size(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn get(&self, id: &Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Puts a copy of `message` into every session's private channel and
    /// returns how many sessions it reached.
    pub async fn fan_out(&self, message: &Message) -> usize {
        let sessions = self.sessions.read().await;
        for session in sessions.values() {
            session.private_channel().put(message.clone());
        }
        debug!("Fanned out message to {} sessions", sessions.len());
        sessions.len()
    }

    pub async fn send_to(&self, id: &Uuid, message: Message) -> Result<(), WebSocketError> {
        let session = self
            .get(id)
            .await
            .ok_or(WebSocketError::SessionNotFound(*id))?;
        session.private_channel().put(message);
        Ok(())
    }
}
