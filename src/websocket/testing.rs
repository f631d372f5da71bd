//! In-memory connection pair for exercising relays without sockets.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::channel::Message;
use crate::error::WebSocketError;
use crate::websocket::Connection;

pub struct MemoryConnection {
    incoming: Mutex<mpsc::UnboundedReceiver<Message>>,
    outgoing: mpsc::UnboundedSender<Message>,
}

/// The client side of a [`MemoryConnection`].
pub struct Peer {
    to_server: Option<mpsc::UnboundedSender<Message>>,
    from_server: mpsc::UnboundedReceiver<Message>,
}

impl MemoryConnection {
    pub fn pair() -> (Arc<MemoryConnection>, Peer) {
        let (to_server, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_server) = mpsc::unbounded_channel();
        let connection = Arc::new(MemoryConnection {
            incoming: Mutex::new(incoming),
            outgoing,
        });
        let peer = Peer {
            to_server: Some(to_server),
            from_server,
        };
        (connection, peer)
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn receive(&self) -> Result<Message, WebSocketError> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(WebSocketError::ConnectionClosed)
    }

    async fn send(&self, message: Message) -> Result<(), WebSocketError> {
        self.outgoing
            .send(message)
            .map_err(|_| WebSocketError::ConnectionClosed)
    }
}

/// Never delivers a message and fails every send, as a peer that vanished
/// without the read side noticing.
pub struct HalfDeadConnection;

#[async_trait]
impl Connection for HalfDeadConnection {
    async fn receive(&self) -> Result<Message, WebSocketError> {
        std::future::pending().await
    }

    async fn send(&self, _message: Message) -> Result<(), WebSocketError> {
        Err(WebSocketError::ConnectionClosed)
    }
}

impl Peer {
    pub fn send(&self, text: &str) {
        if let Some(tx) = &self.to_server {
            let _ = tx.send(text.to_string());
        }
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.from_server.recv().await
    }

    /// Half-close: the server sees end of stream but can still write to us.
    pub fn close(&mut self) {
        self.to_server = None;
    }
}
