//! Chat service: the event loop around a [`ChatSession`].
//!
//! [`ChatService::spawn`] starts one task that owns the session and
//! multiplexes caller commands, link events, the typewriter tick, the
//! done-gating poll and the reconnect deadline. Callers interact through a
//! cloneable [`ChatHandle`]; each command is answered after the loop applied
//! it.

use std::sync::Arc;
use std::time::Duration;

use folio_chat_core::Persona;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::{ClientConfig, ConfigError};
use crate::connection::LinkEvent;
use crate::session::{ChatSession, ChatSnapshot, Delivery};
use crate::target::ChatTarget;
use crate::ws::Connector;

const COMMAND_CAPACITY: usize = 32;
const LINK_EVENT_CAPACITY: usize = 256;

/// Errors returned by [`ChatHandle`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Invalid configuration or target.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The event loop has stopped.
    #[error("chat service stopped")]
    Stopped,
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

enum Command {
    Connect(oneshot::Sender<()>),
    Disconnect(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
    Send {
        content: String,
        persona: Option<Persona>,
        reply: oneshot::Sender<Delivery>,
    },
    SwitchTarget {
        target: ChatTarget,
        reply: oneshot::Sender<std::result::Result<(), ConfigError>>,
    },
    Snapshot(oneshot::Sender<ChatSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Constructor for the chat event loop.
#[derive(Debug)]
pub struct ChatService;

impl ChatService {
    /// Start a chat service for `target` and connect immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn spawn(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        target: ChatTarget,
    ) -> Result<ChatHandle> {
        let (link_tx, link_rx) = mpsc::channel(LINK_EVENT_CAPACITY);
        let mut session = ChatSession::new(config, connector, target, link_tx)?;
        session.connect();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());

        let task = tokio::spawn(run(session, command_rx, link_rx, snapshot_tx));

        Ok(ChatHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task: Arc::new(Mutex::new(Some(task))),
        })
    }
}

/// Cloneable handle to a running chat service.
#[derive(Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<ChatSnapshot>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ChatHandle {
    /// Send a user message.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service is gone.
    pub async fn send(&self, content: impl Into<String>) -> Result<Delivery> {
        self.send_as(content, None).await
    }

    /// Send a user message addressed to a persona.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service is gone.
    pub async fn send_as(
        &self,
        content: impl Into<String>,
        persona: Option<Persona>,
    ) -> Result<Delivery> {
        let content = content.into();
        self.request(|reply| Command::Send {
            content,
            persona,
            reply,
        })
        .await
    }

    /// Tear down the current conversation and start one for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection URL can be built for `target`, or if
    /// the service is gone.
    pub async fn switch_target(&self, target: ChatTarget) -> Result<()> {
        self.request(|reply| Command::SwitchTarget { target, reply })
            .await?
            .map_err(ServiceError::from)
    }

    /// Open the connection if none exists.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service is gone.
    pub async fn connect(&self) -> Result<()> {
        self.request(Command::Connect).await
    }

    /// Close the connection without reconnecting. The transcript is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service is gone.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(Command::Disconnect).await
    }

    /// Tear down the conversation: connection, pending text and transcript.
    ///
    /// Everything is cleared by the time this returns.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service is gone.
    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await
    }

    /// Current state, read from the event loop.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service is gone.
    pub async fn snapshot(&self) -> Result<ChatSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Receiver that observes every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the event loop and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Stopped`] if the service was already gone.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await?;
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Chat service task ended abnormally");
            }
        }
        Ok(())
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| ServiceError::Stopped)?;
        rx.await.map_err(|_| ServiceError::Stopped)
    }
}

impl std::fmt::Debug for ChatHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatHandle")
            .field("stopped", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}

// ===== Event loop =====

async fn run(
    mut session: ChatSession,
    mut commands: mpsc::Receiver<Command>,
    mut link_events: mpsc::Receiver<LinkEvent>,
    snapshots: watch::Sender<ChatSnapshot>,
) {
    let drain_period = session.config().drain_interval();
    let poll_period = session.config().done_poll_interval();
    let mut drain: Option<Interval> = None;
    let mut done_poll: Option<Interval> = None;

    tracing::debug!(chat_target = ?session.target(), "Chat service started");

    loop {
        sync_timer(&mut drain, session.needs_drain(), drain_period);
        sync_timer(&mut done_poll, session.needs_done_poll(), poll_period);
        let reconnect_at = session.reconnect_deadline();

        let changed = tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else { break };
                match apply(&mut session, command) {
                    Applied::Changed(changed) => changed,
                    Applied::Shutdown(reply) => {
                        session.close();
                        let _ = reply.send(());
                        break;
                    }
                }
            }

            Some(event) = link_events.recv() => session.handle_link_event(event),

            () = tick(&mut drain) => session.on_drain_tick(),

            () = tick(&mut done_poll) => session.on_done_poll(),

            () = sleep_until(reconnect_at) => {
                session.on_reconnect_due();
                true
            }
        };

        if changed {
            snapshots.send_replace(session.snapshot());
        }
    }

    session.close();
    snapshots.send_replace(session.snapshot());
    tracing::debug!("Chat service stopped");
}

enum Applied {
    Changed(bool),
    Shutdown(oneshot::Sender<()>),
}

fn apply(session: &mut ChatSession, command: Command) -> Applied {
    match command {
        Command::Connect(reply) => {
            let changed = session.connect();
            let _ = reply.send(());
            Applied::Changed(changed)
        }
        Command::Disconnect(reply) => {
            session.disconnect();
            let _ = reply.send(());
            Applied::Changed(true)
        }
        Command::Close(reply) => {
            session.close();
            let _ = reply.send(());
            Applied::Changed(true)
        }
        Command::Send {
            content,
            persona,
            reply,
        } => {
            let delivery = session.send_message(&content, persona);
            let _ = reply.send(delivery);
            Applied::Changed(matches!(delivery, Delivery::Sent | Delivery::Reconnecting))
        }
        Command::SwitchTarget { target, reply } => {
            let result = session.switch_target(target);
            let changed = result.is_ok();
            let _ = reply.send(result);
            Applied::Changed(changed)
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
            Applied::Changed(false)
        }
        Command::Shutdown(reply) => Applied::Shutdown(reply),
    }
}

/// Start or stop a periodic timer to match `wanted`.
fn sync_timer(timer: &mut Option<Interval>, wanted: bool, period: Duration) {
    match (timer.is_some(), wanted) {
        (false, true) => {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            *timer = Some(interval);
        }
        (true, false) => *timer = None,
        _ => {}
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
