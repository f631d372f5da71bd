use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::channel::Channel;
use crate::websocket::Connection;

/// Server-side state for one connected peer.
pub struct Session {
    id: Uuid,
    peer_addr: String,
    connected_at: DateTime<Utc>,
    connection: Arc<dyn Connection>,
    private_channel: Arc<Channel>,
    broadcast_channel: Arc<Channel>,
}

impl Session {
    pub fn new(
        connection: Arc<dyn Connection>,
        broadcast_channel: Arc<Channel>,
        peer_addr: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer_addr: peer_addr.into(),
            connected_at: Utc::now(),
            connection,
            private_channel: Arc::new(Channel::new()),
            broadcast_channel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    pub fn private_channel(&self) -> &Arc<Channel> {
        &self.private_channel
    }

    pub fn broadcast_channel(&self) -> &Arc<Channel> {
        &self.broadcast_channel
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("connected_at", &self.connected_at)
            .field("pending_private", &self.private_channel.len())
            .finish()
    }
}
