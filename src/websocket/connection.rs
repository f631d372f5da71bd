use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::channel::Message;
use crate::error::WebSocketError;

/// A framed, bidirectional text connection to one peer.
///
/// Both methods take `&self`: one relay receives while two others may send
/// concurrently on the same connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    /// Next text message from the peer. `ConnectionClosed` once the peer is gone.
    async fn receive(&self) -> Result<Message, WebSocketError>;

    async fn send(&self, message: Message) -> Result<(), WebSocketError>;
}

/// Connection over an already-upgraded websocket stream.
pub struct WsConnection<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, WsMessage>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(ws_stream: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws_stream.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// Flushes any queued close reply and closes the sink. Completes the
    /// close handshake when the peer initiated it.
    pub async fn close(&self) {
        if let Err(e) = self.sink.lock().await.close().await {
            debug!("Error closing WebSocket connection: {}", e);
        }
    }
}

#[async_trait]
impl<S> Connection for WsConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive(&self) -> Result<Message, WebSocketError> {
        let mut stream = self.stream.lock().await;

        while let Some(frame) = stream.next().await {
            match frame? {
                WsMessage::Text(text) => return Ok(text),
                WsMessage::Close(reason) => {
                    debug!("Peer sent close frame: {:?}", reason);
                    return Err(WebSocketError::ConnectionClosed);
                }
                WsMessage::Binary(bin) => {
                    warn!("Dropping binary frame of {} bytes", bin.len());
                }
                // Ping replies are queued by tungstenite itself
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => {}
            }
        }

        Err(WebSocketError::ConnectionClosed)
    }

    async fn send(&self, message: Message) -> Result<(), WebSocketError> {
        self.sink
            .lock()
            .await
            .send(WsMessage::Text(message))
            .await
            .map_err(WebSocketError::from)
    }
}
