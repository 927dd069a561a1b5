//! WebSocket event channel to the relay.
//!
//! Carries JSON-framed [`ChannelEvent`]s over a persistent connection.
//! Delivery is FIFO per connection; the channel itself offers no retry or
//! acknowledgement, which is exactly the contract the session machine is
//! written against.

use futures_util::{SinkExt, StreamExt};
use hushwire_core::AuthError;
use hushwire_proto::{ChannelEvent, WireError};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::ClientError;

/// Errors from the relay connection.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Could not reach or upgrade to the relay.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The relay closed the connection.
    #[error("connection closed")]
    Disconnected,

    /// An outbound event could not be sent.
    #[error("failed to send: {0}")]
    Send(String),

    /// An inbound frame could not be received.
    #[error("failed to receive: {0}")]
    Receive(String),

    /// A frame did not decode as a known event.
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// A connected event channel.
pub struct EventChannel {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EventChannel {
    /// Connect to the relay.
    pub async fn connect(url: &str) -> Result<Self, ChannelError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;
        tracing::debug!(%url, "channel connected");
        Ok(Self { ws })
    }

    /// Send one event.
    pub async fn send(&mut self, event: &ChannelEvent) -> Result<(), ChannelError> {
        let text = event.to_wire()?;
        self.ws
            .send(Message::Text(text))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    /// Wait for the next event, answering pings along the way.
    pub async fn next_event(&mut self) -> Result<ChannelEvent, ChannelError> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return Ok(ChannelEvent::from_wire(&text)?),
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.ws.send(Message::Pong(data)).await;
                },
                Some(Ok(Message::Close(_))) | None => return Err(ChannelError::Disconnected),
                Some(Ok(_)) => {},
                Some(Err(e)) => return Err(ChannelError::Receive(e.to_string())),
            }
        }
    }

    /// Present the stored auth token and wait for the relay's verdict.
    ///
    /// An `unauthorized` reply is fatal for the session.
    pub async fn authenticate(&mut self, token: &str) -> Result<(), ClientError> {
        self.send(&ChannelEvent::Authenticate { token: token.to_string() }).await?;

        loop {
            match self.next_event().await? {
                ChannelEvent::Authenticated => {
                    tracing::debug!("channel authenticated");
                    return Ok(());
                },
                ChannelEvent::Unauthorized { reason } => {
                    return Err(AuthError::Unauthorized { reason }.into());
                },
                other => {
                    tracing::warn!(event = other.name(), "ignoring event before authentication");
                },
            }
        }
    }

    /// Close the connection. Best-effort; errors are discarded.
    pub async fn close(&mut self) {
        let _ = self.ws.close(None).await;
    }
}
