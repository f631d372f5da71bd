use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::channel::Channel;
use crate::error::WebSocketError;
use crate::websocket::Session;

/// One end of a relay inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Connection,
    PrivateChannel,
    BroadcastChannel,
}

/// A loop moving one message at a time from `source` to `sink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relay {
    pub source: Endpoint,
    pub sink: Endpoint,
}

impl Relay {
    /// Peer → shared broadcast channel.
    pub const INBOUND: Relay = Relay::new(Endpoint::Connection, Endpoint::BroadcastChannel);
    /// Session's own private channel → peer.
    pub const PRIVATE_OUTBOUND: Relay = Relay::new(Endpoint::PrivateChannel, Endpoint::Connection);
    /// Shared broadcast channel → peer.
    pub const BROADCAST_OUTBOUND: Relay =
        Relay::new(Endpoint::BroadcastChannel, Endpoint::Connection);

    pub const fn new(source: Endpoint, sink: Endpoint) -> Self {
        Self { source, sink }
    }

    /// Runs until the connection fails on either side.
    ///
    /// The returned error is the reason the loop stopped; `ConnectionClosed`
    /// is the normal way for a relay to end. Dropping the future at any
    /// suspension point is safe: no message is half-moved between channels.
    pub async fn run(self, session: Arc<Session>) -> WebSocketError {
        debug!("Relay {} started for session {}", self, session.id());
        let reason = match self.pump(&session).await {
            Ok(never) => match never {},
            Err(e) => e,
        };
        debug!("Relay {} stopped for session {}: {}", self, session.id(), reason);
        reason
    }

    async fn pump(&self, session: &Session) -> Result<std::convert::Infallible, WebSocketError> {
        let source = Self::channel(session, self.source);
        let sink = Self::channel(session, self.sink);

        loop {
            let message = match source {
                Some(channel) => channel.take().await,
                None => session.connection().receive().await?,
            };

            match sink {
                Some(channel) => channel.put(message),
                None => session.connection().send(message).await?,
            }

            // Channel to channel never suspends while the source has items.
            if source.is_some() && sink.is_some() {
                tokio::task::yield_now().await;
            }
        }
    }

    fn channel(session: &Session, endpoint: Endpoint) -> Option<&Channel> {
        match endpoint {
            Endpoint::Connection => None,
            Endpoint::PrivateChannel => Some(session.private_channel().as_ref()),
            Endpoint::BroadcastChannel => Some(session.broadcast_channel().as_ref()),
        }
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Relay::INBOUND => f.write_str("inbound"),
            Relay::PRIVATE_OUTBOUND => f.write_str("private-outbound"),
            Relay::BROADCAST_OUTBOUND => f.write_str("broadcast-outbound"),
            Relay { source, sink } => write!(f, "{:?}->{:?}", source, sink),
        }
    }
}
