//! In-memory transport for driving the chat service in tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use folio_chat_client::{
    ChatHandle, ChatService, ChatTarget, ClientConfig, ClientFrame, Connector, Link,
    TransportEvent, WsError, WsSender,
};
use tokio::sync::mpsc;
use url::Url;

/// Connector whose links are served by the test through [`ServerEnd`]s.
pub struct MemoryConnector {
    attempts: AtomicUsize,
    refuse: AtomicBool,
    servers: mpsc::UnboundedSender<ServerEnd>,
}

impl MemoryConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            servers,
        });
        (connector, rx)
    }

    /// Number of `open` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make every following `open` fail.
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, url: &Url) -> Result<Link, WsError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(WsError::Connection("connection refused".to_string()));
        }

        let (out_tx, out_rx) = mpsc::channel(64);
        let (event_tx, event_rx) = mpsc::channel(64);
        let _ = self.servers.send(ServerEnd {
            url: url.clone(),
            events: event_tx,
            outbound: out_rx,
        });

        Ok(Link {
            sender: WsSender::new(out_tx),
            events: event_rx,
        })
    }
}

/// The service side of one in-memory link.
pub struct ServerEnd {
    pub url: Url,
    events: mpsc::Sender<TransportEvent>,
    outbound: mpsc::Receiver<String>,
}

impl ServerEnd {
    /// Deliver a frame to the client. Ignored if the client has gone away.
    pub async fn send(&self, frame: serde_json::Value) {
        self.send_raw(&frame.to_string()).await;
    }

    pub async fn send_raw(&self, raw: &str) {
        let _ = self.events.send(TransportEvent::Text(raw.to_string())).await;
    }

    /// Close the link from the service side.
    pub async fn close(self) {
        let _ = self.events.send(TransportEvent::Closed).await;
    }

    /// Next frame the client sent, or `None` once the client closed the link.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        let text = self.outbound.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
    }

    /// Stop taking frames from the client while keeping the link open.
    pub fn stop_reading(&mut self) {
        self.outbound.close();
    }

    pub fn try_recv(&mut self) -> Result<String, mpsc::error::TryRecvError> {
        self.outbound.try_recv()
    }
}

/// Let spawned tasks run without advancing time.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

/// Start a service on the in-memory transport and wait for its first link.
pub async fn start(
    config: ClientConfig,
    target: ChatTarget,
) -> (
    ChatHandle,
    Arc<MemoryConnector>,
    mpsc::UnboundedReceiver<ServerEnd>,
    ServerEnd,
) {
    let (connector, mut servers) = MemoryConnector::new();
    let handle = ChatService::spawn(config, connector.clone(), target).expect("spawn");
    let server = servers.recv().await.expect("first link");
    settle().await;
    (handle, connector, servers, server)
}
