//! WebSocket transport.
//!
//! This module opens the streaming connection to the chat service and exposes
//! it as a pair of channels: a [`WsSender`] for outbound frames and a receiver
//! of raw [`TransportEvent`]s. Inbound text is passed through undecoded; the
//! [`FrameDecoder`](crate::decoder::FrameDecoder) owns validation.
//!
//! Endpoint: WS /api/v1/chat

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::protocol::ClientFrame;

/// Capacity of the outbound and inbound channels of one link.
const CHANNEL_CAPACITY: usize = 64;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Error type for WebSocket operations.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    /// Failed to connect.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Failed to send message.
    #[error("Send failed: {0}")]
    Send(String),

    /// No open connection to send on.
    #[error("Not connected")]
    NotConnected,

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw events from one open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame, undecoded.
    Text(String),
    /// The transport reported an error. A `Closed` event follows.
    Error(String),
    /// The connection is gone.
    Closed,
}

/// Handle for sending frames on one connection.
///
/// Dropping every clone closes the connection.
#[derive(Debug, Clone)]
pub struct WsSender {
    tx: mpsc::Sender<String>,
}

impl WsSender {
    /// Wrap the outbound side of a link.
    #[must_use]
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Serialize and queue one user frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails, the outbound queue is full, or
    /// the connection is gone.
    pub fn send_frame(&self, frame: &ClientFrame) -> Result<(), WsError> {
        let json = serde_json::to_string(frame)?;
        self.tx
            .try_send(json)
            .map_err(|e| WsError::Send(e.to_string()))
    }
}

/// An open connection: outbound handle plus inbound events.
#[derive(Debug)]
pub struct Link {
    /// Outbound frames.
    pub sender: WsSender,
    /// Inbound events. Ends with [`TransportEvent::Closed`] when the server or
    /// network ends the link, and without it once every sender is dropped.
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens links to the chat service.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Perform the handshake and return the open link.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn open(&self, url: &Url) -> Result<Link, WsError>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &Url) -> Result<Link, WsError> {
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| WsError::Connection(e.to_string()))?;

        let (write, read) = ws_stream.split();

        // Channel for outgoing messages
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Channel for incoming events
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(CHANNEL_CAPACITY);

        let reader = tokio::spawn(ws_reader(read, event_tx));
        tokio::spawn(ws_writer(write, outgoing_rx, reader));

        Ok(Link {
            sender: WsSender::new(outgoing_tx),
            events: event_rx,
        })
    }
}

/// Task that writes outgoing messages.
///
/// Sends a close frame once every sender has been dropped. The reader is
/// stopped when this task ends, so the link's event channel closes without
/// waiting for the server to acknowledge.
async fn ws_writer(
    mut write: SplitSink<Socket, Message>,
    mut rx: mpsc::Receiver<String>,
    reader: JoinHandle<()>,
) {
    while let Some(text) = rx.recv().await {
        if let Err(e) = write.send(Message::Text(text)).await {
            tracing::debug!(error = %e, "WebSocket write failed");
            reader.abort();
            return;
        }
    }
    reader.abort();
    let _ = write.send(Message::Close(None)).await;
    let _ = write.close().await;
}

/// Task that reads incoming frames and forwards them as events.
async fn ws_reader(mut read: SplitStream<Socket>, tx: mpsc::Sender<TransportEvent>) {
    while let Some(result) = read.next().await {
        let event = match result {
            Ok(Message::Text(text)) => TransportEvent::Text(text),
            Ok(Message::Close(frame)) => {
                tracing::debug!(frame = ?frame, "Server closed the connection");
                break;
            }
            // Ignore control frames and binary messages
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Binary(_)) => {
                continue;
            }
            Err(e) => {
                let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                break;
            }
        };
        if tx.send(event).await.is_err() {
            // Nobody is listening any more.
            return;
        }
    }

    let _ = tx.send(TransportEvent::Closed).await;
}
