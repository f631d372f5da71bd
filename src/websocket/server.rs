use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::channel::{Channel, Message};
use crate::config::{DeliveryMode, Settings};
use crate::error::WebSocketError;
use crate::websocket::{
    Connection, RelayEnd, Session, SessionOutcome, SessionRegistry, Supervisor, WsConnection,
};

/// Accepts websocket peers and supervises one session per connection.
pub struct RelayServer {
    registry: Arc<SessionRegistry>,
    broadcast: Arc<Channel>,
    supervisor: Supervisor,
    delivery: DeliveryMode,
}

impl RelayServer {
    pub fn new(delivery: DeliveryMode) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            broadcast: Arc::new(Channel::new()),
            supervisor: Supervisor::for_mode(delivery),
            delivery,
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    pub fn broadcast_channel(&self) -> Arc<Channel> {
        self.broadcast.clone()
    }

    pub fn delivery(&self) -> DeliveryMode {
        self.delivery
    }

    /// Relay tasks still running across all sessions.
    pub fn live_relays(&self) -> usize {
        self.supervisor.live_relays()
    }

    /// Queues `message` for a single connected peer.
    pub async fn send_to(&self, id: &Uuid, message: Message) -> Result<(), WebSocketError> {
        self.registry.send_to(id, message).await
    }

    pub async fn bind(settings: &Settings) -> crate::Result<TcpListener> {
        let listener = TcpListener::bind(settings.bind_addr()).await?;
        Ok(listener)
    }

    /// Serves `listener` until the returned future is dropped.
    pub async fn run(self: Arc<Self>, listener: TcpListener) {
        match listener.local_addr() {
            Ok(addr) => info!("Relay server listening on ws://{} ({:?} delivery)", addr, self.delivery),
            Err(e) => warn!("Relay server listening on unknown address: {}", e),
        }

        match self.delivery {
            DeliveryMode::One => self.accept_loop(listener).await,
            DeliveryMode::All => {
                tokio::select! {
                    _ = self.clone().accept_loop(listener) => {}
                    _ = self.dispatch_loop() => {}
                }
            }
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_connection(stream, addr).await;
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }

    // Copies every broadcast message into each registered session's private channel.
    async fn dispatch_loop(&self) {
        loop {
            let message = self.broadcast.take().await;
            let reached = self.registry.fan_out(&message).await;
            if reached == 0 {
                warn!("Dropping broadcast message, no sessions connected");
            }
        }
    }

    pub async fn handle_connection(self: Arc<Self>, raw_stream: TcpStream, addr: SocketAddr) {
        info!("New WebSocket connection from: {}", addr);

        let ws_stream = match tokio_tungstenite::accept_async(raw_stream).await {
            Ok(ws) => ws,
            Err(e) => {
                let e = WebSocketError::Handshake(e.to_string());
                error!("Error during WebSocket handshake with {}: {}", addr, e);
                return;
            }
        };

        let connection = Arc::new(WsConnection::new(ws_stream));
        self.serve_connection(connection.clone(), addr.to_string()).await;
        connection.close().await;
    }

    /// Registers a session for `connection`, supervises it to completion and
    /// unregisters it. Whatever ended the session stays here.
    pub async fn serve_connection(
        &self,
        connection: Arc<dyn Connection>,
        peer_addr: String,
    ) -> Option<SessionOutcome> {
        let session = Arc::new(Session::new(connection, self.broadcast.clone(), peer_addr));
        self.serve_session(session).await
    }

    /// Returns `None` without starting any relay if the session is already
    /// registered.
    pub async fn serve_session(&self, session: Arc<Session>) -> Option<SessionOutcome> {
        let id = session.id();

        if !self.registry.add(session.clone()).await {
            error!("Refusing to serve session {} twice", id);
            return None;
        }
        let outcome = self.supervisor.run(session.clone()).await;
        self.registry.remove(&id).await;

        let relay = outcome
            .first
            .map(|relay| relay.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let lifetime = chrono::Utc::now() - session.connected_at();
        match &outcome.end {
            RelayEnd::Closed => info!(
                "Session {} ({}) closed by {} relay after {}s",
                id,
                session.peer_addr(),
                relay,
                lifetime.num_seconds()
            ),
            RelayEnd::Fault(e) => warn!(
                "Session {} ({}) ended by {} relay fault: {}",
                id,
                session.peer_addr(),
                relay,
                e
            ),
            RelayEnd::Panicked(e) => {
                error!("Session {} ({}) relay panicked: {}", id, session.peer_addr(), e)
            }
        }

        Some(outcome)
    }
}
