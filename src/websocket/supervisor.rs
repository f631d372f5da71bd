use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::DeliveryMode;
use crate::error::WebSocketError;
use crate::websocket::{Relay, Session};

/// Why the first relay of a session stopped.
#[derive(Debug)]
pub enum RelayEnd {
    /// Orderly close or a peer that went away.
    Closed,
    /// Any other transport failure; torn down the same way.
    Fault(WebSocketError),
    Panicked(String),
}

#[derive(Debug)]
pub struct SessionOutcome {
    /// The relay whose exit triggered teardown; unknown if it panicked.
    pub first: Option<Relay>,
    pub end: RelayEnd,
    /// Relays aborted while still running.
    pub cancelled: usize,
}

/// Races a session's relays and tears all of them down when one stops.
#[derive(Debug, Clone)]
pub struct Supervisor {
    relays: Vec<Relay>,
    live_relays: Arc<AtomicUsize>,
}

// Decrements the live relay gauge however the task ends, abort included.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(gauge: &Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Supervisor {
    pub fn new(relays: Vec<Relay>) -> Self {
        Self {
            relays,
            live_relays: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// In `All` mode the broadcast channel belongs to the dispatcher, so
    /// sessions only drain their private channel.
    pub fn for_mode(mode: DeliveryMode) -> Self {
        match mode {
            DeliveryMode::One => Self::new(vec![
                Relay::INBOUND,
                Relay::PRIVATE_OUTBOUND,
                Relay::BROADCAST_OUTBOUND,
            ]),
            DeliveryMode::All => Self::new(vec![Relay::INBOUND, Relay::PRIVATE_OUTBOUND]),
        }
    }

    pub fn relays(&self) -> &[Relay] {
        &self.relays
    }

    /// Relay tasks currently running across every session this supervisor
    /// has started.
    pub fn live_relays(&self) -> usize {
        self.live_relays.load(Ordering::SeqCst)
    }

    /// Runs every relay until the first one stops, then aborts the others and
    /// waits until they are gone. No relay of `session` is running once this
    /// returns.
    pub async fn run(&self, session: Arc<Session>) -> SessionOutcome {
        let mut tasks = JoinSet::new();
        for &relay in &self.relays {
            let session = session.clone();
            let guard = LiveGuard::enter(&self.live_relays);
            tasks.spawn(async move {
                let _guard = guard;
                (relay, relay.run(session).await)
            });
        }

        let (first, end) = match tasks.join_next().await {
            Some(Ok((relay, reason))) => (Some(relay), Self::classify(reason)),
            Some(Err(e)) => (None, RelayEnd::Panicked(e.to_string())),
            None => (None, RelayEnd::Closed),
        };

        tasks.abort_all();

        let mut cancelled = 0;
        while let Some(result) = tasks.join_next().await {
            match result {
                Err(e) if e.is_cancelled() => cancelled += 1,
                Err(e) => warn!("Relay panicked during teardown of session {}: {}", session.id(), e),
                Ok((relay, reason)) => {
                    debug!("Relay {} of session {} also stopped: {}", relay, session.id(), reason)
                }
            }
        }

        SessionOutcome {
            first,
            end,
            cancelled,
        }
    }

    fn classify(reason: WebSocketError) -> RelayEnd {
        if reason.is_orderly_close() {
            RelayEnd::Closed
        } else {
            RelayEnd::Fault(reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use crate::websocket::connection::MockConnection;
    use crate::websocket::testing::{HalfDeadConnection, MemoryConnection};
    use crate::websocket::Connection;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(1);

    fn session_with(connection: Arc<dyn Connection>, broadcast: Arc<Channel>) -> Arc<Session> {
        Arc::new(Session::new(connection, broadcast, "test-peer"))
    }

    #[test]
    fn test_relay_sets_per_mode() {
        assert_eq!(Supervisor::for_mode(DeliveryMode::One).relays().len(), 3);
        assert_eq!(
            Supervisor::for_mode(DeliveryMode::All).relays(),
            &[Relay::INBOUND, Relay::PRIVATE_OUTBOUND]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_peer_close_cancels_outbound_relays() {
        let supervisor = Supervisor::for_mode(DeliveryMode::One);
        let (connection, mut peer) = MemoryConnection::pair();
        let session = session_with(connection, Arc::new(Channel::new()));

        let running = tokio::spawn({
            let supervisor = supervisor.clone();
            let session = session.clone();
            async move { supervisor.run(session).await }
        });

        tokio::task::yield_now().await;
        peer.close();

        let outcome = timeout(WAIT, running).await.unwrap().unwrap();
        assert_eq!(outcome.first, Some(Relay::INBOUND));
        assert!(matches!(outcome.end, RelayEnd::Closed));
        assert_eq!(outcome.cancelled, 2);
        assert_eq!(supervisor.live_relays(), 0);
    }

    #[tokio::test]
    async fn test_transport_fault_tears_down_like_close() {
        let supervisor = Supervisor::for_mode(DeliveryMode::One);
        let mut mock = MockConnection::new();
        mock.expect_receive()
            .returning(|| Err(WebSocketError::Transport("connection reset".to_string())));

        let session = session_with(Arc::new(mock), Arc::new(Channel::new()));
        let outcome = timeout(WAIT, supervisor.run(session)).await.unwrap();

        assert_eq!(outcome.first, Some(Relay::INBOUND));
        assert!(matches!(outcome.end, RelayEnd::Fault(WebSocketError::Transport(_))));
        assert_eq!(outcome.cancelled, 2);
        assert_eq!(supervisor.live_relays(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_cancels_pending_receive() {
        let supervisor = Supervisor::for_mode(DeliveryMode::One);
        let broadcast = Arc::new(Channel::new());
        let session = session_with(Arc::new(HalfDeadConnection), broadcast.clone());
        broadcast.put("orphan".to_string());

        let outcome = timeout(WAIT, supervisor.run(session)).await.unwrap();
        assert_eq!(outcome.first, Some(Relay::BROADCAST_OUTBOUND));
        assert!(matches!(outcome.end, RelayEnd::Closed));
        // Inbound was parked in receive, private-outbound in take.
        assert_eq!(outcome.cancelled, 2);
        assert_eq!(supervisor.live_relays(), 0);
        assert!(broadcast.is_empty());
    }

    #[tokio::test]
    async fn test_no_relays_returns_immediately() {
        let supervisor = Supervisor::new(Vec::new());
        let (connection, _peer) = MemoryConnection::pair();
        let session = session_with(connection, Arc::new(Channel::new()));

        let outcome = supervisor.run(session).await;
        assert_eq!(outcome.first, None);
        assert_eq!(outcome.cancelled, 0);
    }
}
