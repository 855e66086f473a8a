//! WebSocket Client
//!
//! Connects to the game server, parses inbound frames and forwards them
//! to the frame loop, and drains the outbox into the socket.
//! Reconnection is left to the caller.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::network::protocol::{ClientMessage, InboundMessage};

/// Default server endpoint.
pub const DEFAULT_URL: &str = "ws://localhost:3000/ws";

/// Connection configuration.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Capacity of the inbound message channel.
    pub inbound_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            inbound_capacity: 256,
        }
    }
}

impl ConnectionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("RAIL_CLASH_URL").unwrap_or(defaults.url),
            inbound_capacity: std::env::var("RAIL_CLASH_INBOUND_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.inbound_capacity),
        }
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Handshake or socket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Fire-and-forget handle for outbound messages.
///
/// Cloned into rails and buttons that report results. Sends never block
/// and are dropped with a warning once the connection is gone.
#[derive(Clone, Debug)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<ClientMessage>,
}

impl Outbox {
    /// Create an outbox and the receiver the writer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue a message for the server.
    pub fn send(&self, message: ClientMessage) {
        debug!("Queueing {:?}", message);
        if self.sender.send(message).is_err() {
            warn!("Connection closed, dropping outbound message");
        }
    }
}

/// A live connection.
pub struct Connection {
    /// Handle for outbound messages.
    pub outbox: Outbox,
    /// Validated inbound messages in arrival order.
    pub inbound: mpsc::Receiver<InboundMessage>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Stop both socket tasks.
    pub fn close(self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Connect and spawn the reader and writer tasks.
pub async fn connect(config: &ConnectionConfig) -> Result<Connection, TransportError> {
    info!("Connecting to {}...", config.url);
    let (ws_stream, _) = connect_async(config.url.as_str()).await?;
    info!("WebSocket connected");

    let (mut write, mut read) = ws_stream.split();
    let (inbound_tx, inbound) = mpsc::channel::<InboundMessage>(config.inbound_capacity);
    let (outbox, mut outgoing_rx) = Outbox::channel();

    let reader = tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match InboundMessage::from_json(&text) {
                    Ok(message) => {
                        debug!("Received {}", message.message.kind());
                        if inbound_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Dropping malformed server message: {} - {}", e, text);
                    }
                },
                Ok(Message::Close(_)) => {
                    info!("Server closed connection");
                    break;
                }
                Err(e) => {
                    error!("WebSocket read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        info!("Reader task ended");
    });

    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing_rx.recv().await {
            let json = match message.to_json() {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(json)).await {
                error!("Failed to send message: {}", e);
                break;
            }
        }
        info!("Writer task ended");
    });

    Ok(Connection {
        outbox,
        inbound,
        reader,
        writer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::{LifeEventKind, RailIndex, BlockEventKind};

    #[test]
    fn test_outbox_preserves_order() {
        let (outbox, mut rx) = Outbox::channel();
        outbox.send(ClientMessage::life_event(LifeEventKind::Heal, 5));
        outbox.send(ClientMessage::block_event(
            BlockEventKind::Crashed,
            None,
            RailIndex::new(1).unwrap(),
        ));

        assert_eq!(rx.try_recv().unwrap(), ClientMessage::life_event(LifeEventKind::Heal, 5));
        assert!(matches!(rx.try_recv().unwrap(), ClientMessage::BlockEvent(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_outbox_send_after_close_is_silent() {
        let (outbox, rx) = Outbox::channel();
        drop(rx);
        outbox.send(ClientMessage::GameStartEvent {});
    }

    #[test]
    fn test_connection_config_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.inbound_capacity, 256);
    }
}
