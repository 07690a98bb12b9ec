//! Connection manager.
//!
//! Owns the single live link to the chat service. Every connection attempt gets
//! a new generation number; events carry the generation they were produced
//! under, and events from a superseded or deliberately closed link are ignored.
//! Closes the client did not ask for schedule a reconnect after a fixed delay;
//! the deadline is held here and driven by the session event loop.

use std::sync::Arc;
use std::time::Duration;

use folio_chat_core::SessionId;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::protocol::ClientFrame;
use crate::ws::{Connector, TransportEvent, WsError, WsSender};

/// Connection state as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No link and no reconnect pending.
    #[default]
    Disconnected,
    /// Handshake in progress or reconnect pending.
    Connecting,
    /// Link open.
    Connected,
}

/// Event produced by a link pump, tagged with its generation.
#[derive(Debug)]
pub enum LinkEvent {
    /// Handshake succeeded.
    Opened {
        /// Attempt this event belongs to.
        generation: u64,
        /// Outbound handle of the new link.
        sender: WsSender,
    },
    /// Handshake failed.
    Failed {
        /// Attempt this event belongs to.
        generation: u64,
        /// Failure description.
        error: String,
    },
    /// Something arrived on an open link.
    Transport {
        /// Attempt this event belongs to.
        generation: u64,
        /// The transport event.
        event: TransportEvent,
    },
}

impl LinkEvent {
    const fn generation(&self) -> u64 {
        match self {
            Self::Opened { generation, .. }
            | Self::Failed { generation, .. }
            | Self::Transport { generation, .. } => *generation,
        }
    }
}

/// Maintains at most one live connection.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    url: Url,
    reconnect_delay: Duration,
    reconnect_on_close: bool,
    events: mpsc::Sender<LinkEvent>,
    generation: u64,
    status: ConnectionStatus,
    pump: Option<JoinHandle<()>>,
    sender: Option<WsSender>,
    session_id: Option<SessionId>,
    reconnect_at: Option<Instant>,
}

impl ConnectionManager {
    /// Create a manager that reports link events on `events`.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        url: Url,
        reconnect_delay: Duration,
        reconnect_on_close: bool,
        events: mpsc::Sender<LinkEvent>,
    ) -> Self {
        Self {
            connector,
            url,
            reconnect_delay,
            reconnect_on_close,
            events,
            generation: 0,
            status: ConnectionStatus::Disconnected,
            pump: None,
            sender: None,
            session_id: None,
            reconnect_at: None,
        }
    }

    /// Open a connection unless one exists or is being opened.
    ///
    /// Returns `true` if a new attempt was started.
    pub fn connect(&mut self) -> bool {
        if self.pump.is_some() {
            return false;
        }

        self.generation += 1;
        self.reconnect_at = None;
        self.status = ConnectionStatus::Connecting;

        let generation = self.generation;
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let events = self.events.clone();

        tracing::debug!(generation, url = %self.url, "Opening chat connection");
        self.pump = Some(tokio::spawn(pump(connector, url, generation, events)));
        true
    }

    /// Close the connection. No reconnect follows.
    pub fn disconnect(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            tracing::debug!(generation = self.generation, "Chat connection closed by client");
        }
        // Invalidate anything the old pump already queued.
        self.generation += 1;
        self.sender = None;
        self.session_id = None;
        self.reconnect_at = None;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Point future connections at a different URL.
    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    /// Apply a link event.
    ///
    /// Returns the text of an inbound frame for decoding; every other event is
    /// consumed here.
    pub fn handle(&mut self, event: LinkEvent) -> Option<String> {
        if event.generation() != self.generation || self.pump.is_none() {
            tracing::trace!(
                event_generation = event.generation(),
                current = self.generation,
                "Ignoring stale link event"
            );
            return None;
        }

        match event {
            LinkEvent::Opened { sender, .. } => {
                tracing::info!(generation = self.generation, "Chat connection open");
                self.sender = Some(sender);
                self.status = ConnectionStatus::Connected;
                None
            }
            LinkEvent::Failed { error, .. } => {
                tracing::warn!(generation = self.generation, error = %error, "Chat connection failed");
                self.on_closed();
                None
            }
            LinkEvent::Transport { event, .. } => match event {
                TransportEvent::Text(text) => Some(text),
                TransportEvent::Error(error) => {
                    tracing::warn!(generation = self.generation, error = %error, "Chat connection error");
                    None
                }
                TransportEvent::Closed => {
                    tracing::info!(generation = self.generation, "Chat connection closed");
                    self.on_closed();
                    None
                }
            },
        }
    }

    /// Called by the event loop once the reconnect deadline has passed.
    pub fn on_reconnect_due(&mut self) {
        if self.reconnect_at.take().is_some() {
            tracing::debug!("Reconnecting chat connection");
            self.connect();
        }
    }

    /// Send one user frame on the open link.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no open link or the frame cannot be queued.
    pub fn send(&self, frame: &ClientFrame) -> Result<(), WsError> {
        self.sender
            .as_ref()
            .ok_or(WsError::NotConnected)?
            .send_frame(frame)
    }

    /// Whether a link is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.sender.is_some()
    }

    /// Generation of the current or most recent attempt.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// When the pending reconnect fires, if one is pending.
    #[must_use]
    pub const fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    /// Session identifier assigned by the service on this connection.
    #[must_use]
    pub const fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Record the session identifier assigned by the service.
    pub fn set_session_id(&mut self, session_id: SessionId) {
        tracing::debug!(session_id = %session_id, "Chat session assigned");
        self.session_id = Some(session_id);
    }

    fn on_closed(&mut self) {
        self.pump = None;
        self.sender = None;
        self.session_id = None;

        if self.reconnect_on_close {
            self.reconnect_at = Some(Instant::now() + self.reconnect_delay);
            self.status = ConnectionStatus::Connecting;
            tracing::debug!(delay = ?self.reconnect_delay, "Reconnect scheduled");
        } else {
            self.status = ConnectionStatus::Disconnected;
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.url.as_str())
            .field("generation", &self.generation)
            .field("status", &self.status)
            .field("session_id", &self.session_id)
            .field("reconnect_at", &self.reconnect_at)
            .finish_non_exhaustive()
    }
}

/// Task that opens one link and forwards its events.
async fn pump(
    connector: Arc<dyn Connector>,
    url: Url,
    generation: u64,
    events: mpsc::Sender<LinkEvent>,
) {
    let mut link = match connector.open(&url).await {
        Ok(link) => link,
        Err(e) => {
            let _ = events
                .send(LinkEvent::Failed {
                    generation,
                    error: e.to_string(),
                })
                .await;
            return;
        }
    };

    if events
        .send(LinkEvent::Opened {
            generation,
            sender: link.sender,
        })
        .await
        .is_err()
    {
        return;
    }

    while let Some(event) = link.events.recv().await {
        let closed = event == TransportEvent::Closed;
        if events
            .send(LinkEvent::Transport { generation, event })
            .await
            .is_err()
            || closed
        {
            return;
        }
    }

    // The transport went away without saying so.
    let _ = events
        .send(LinkEvent::Transport {
            generation,
            event: TransportEvent::Closed,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::ws::Link;

    struct RefusingConnector;

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn open(&self, _url: &Url) -> Result<Link, WsError> {
            Err(WsError::Connection("refused".to_string()))
        }
    }

    fn manager(reconnect_on_close: bool) -> (ConnectionManager, mpsc::Receiver<LinkEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let manager = ConnectionManager::new(
            Arc::new(RefusingConnector),
            Url::parse("ws://localhost:8000/api/v1/chat").unwrap(),
            Duration::from_secs(3),
            reconnect_on_close,
            tx,
        );
        (manager, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_noop_while_pending() {
        let (mut manager, _rx) = manager(true);
        assert!(manager.connect());
        assert!(!manager.connect());
        assert_eq!(manager.generation(), 1);
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_schedules_reconnect() {
        let (mut manager, mut rx) = manager(true);
        manager.connect();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, LinkEvent::Failed { generation: 1, .. }));
        assert!(manager.handle(event).is_none());

        let deadline = manager.reconnect_deadline().unwrap();
        assert_eq!(deadline - Instant::now(), Duration::from_secs(3));
        assert_eq!(manager.status(), ConnectionStatus::Connecting);
        assert!(!manager.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_open_without_policy_stays_down() {
        let (mut manager, mut rx) = manager(false);
        manager.connect();

        let event = rx.recv().await.unwrap();
        manager.handle(event);

        assert!(manager.reconnect_deadline().is_none());
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn events_from_old_generation_are_ignored() {
        let (mut manager, mut rx) = manager(true);
        manager.connect();
        let event = rx.recv().await.unwrap();

        manager.disconnect();
        assert!(manager.handle(event).is_none());
        assert!(manager.reconnect_deadline().is_none());
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_due_starts_new_attempt() {
        let (mut manager, mut rx) = manager(true);
        manager.connect();
        let event = rx.recv().await.unwrap();
        manager.handle(event);

        manager.on_reconnect_due();
        assert_eq!(manager.generation(), 2);
        assert!(manager.reconnect_deadline().is_none());

        // A second call without a pending deadline does nothing.
        manager.on_reconnect_due();
        assert_eq!(manager.generation(), 2);
    }

    #[test]
    fn send_without_link_fails() {
        let (tx, _rx) = mpsc::channel(1);
        let manager = ConnectionManager::new(
            Arc::new(RefusingConnector),
            Url::parse("ws://localhost:8000").unwrap(),
            Duration::from_secs(3),
            true,
            tx,
        );
        let err = manager.send(&ClientFrame::new("hi", None)).unwrap_err();
        assert!(matches!(err, WsError::NotConnected));
    }
}
