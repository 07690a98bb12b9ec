//! Session core.
//!
//! [`ChatSession`] is the synchronous state machine behind one chat context.
//! It owns the connection manager, the decoder, the typewriter buffer and the
//! conversation, and applies inbound frames, timer ticks and user commands in
//! the order the event loop hands them over. Nothing here awaits.

use std::collections::BTreeSet;
use std::sync::Arc;

use folio_chat_core::{Persona, SessionId};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::{ClientConfig, ConfigError};
use crate::connection::{ConnectionManager, ConnectionStatus, LinkEvent};
use crate::conversation::{Conversation, Message};
use crate::decoder::{DecodeStats, FrameDecoder};
use crate::protocol::{ClientFrame, ServerFrame};
use crate::target::ChatTarget;
use crate::typewriter::TypewriterBuffer;
use crate::ws::Connector;

/// Outcome of a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// The message was added to the transcript and queued on the connection.
    Sent,
    /// There was no open connection; a connection attempt was started and the
    /// message was dropped.
    Reconnecting,
    /// The connection could not take the message; nothing was added.
    Failed,
    /// Empty or whitespace-only input.
    Ignored,
}

/// Point-in-time view of a session, for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatSnapshot {
    /// Transcript in order.
    pub messages: Vec<Message>,
    /// Personas whose reply is open but has no text yet.
    pub typing: Vec<Option<Persona>>,
    /// Connection indicator.
    pub status: ConnectionStatus,
    /// Session identifier assigned by the service, if any.
    pub session_id: Option<SessionId>,
    /// Current chat target.
    pub target: ChatTarget,
    /// Inbound frame counters.
    pub decode_stats: DecodeStats,
}

/// Synchronous chat state machine.
#[derive(Debug)]
pub struct ChatSession {
    config: ClientConfig,
    target: ChatTarget,
    connection: ConnectionManager,
    decoder: FrameDecoder,
    typewriter: TypewriterBuffer,
    conversation: Conversation,
    /// Personas whose `done` arrived but whose text is still draining.
    pending_done: BTreeSet<Option<Persona>>,
}

impl ChatSession {
    /// Create a session for `target`. Link events are reported on `events`.
    ///
    /// No connection is opened until [`connect`](Self::connect) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        target: ChatTarget,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let url = config.chat_url(&target)?;
        let connection = ConnectionManager::new(
            connector,
            url,
            config.reconnect_delay(),
            config.reconnect_on_close,
            events,
        );

        Ok(Self {
            config,
            target,
            connection,
            decoder: FrameDecoder::new(),
            typewriter: TypewriterBuffer::new(),
            conversation: Conversation::new(),
            pending_done: BTreeSet::new(),
        })
    }

    // ===== Connection =====

    /// Open the connection if none exists.
    pub fn connect(&mut self) -> bool {
        self.connection.connect()
    }

    /// Close the connection. The transcript is kept and no reconnect follows.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Called by the event loop once the reconnect deadline has passed.
    pub fn on_reconnect_due(&mut self) {
        self.connection.on_reconnect_due();
    }

    /// Apply one event from the link pump. Returns `true` if the snapshot changed.
    pub fn handle_link_event(&mut self, event: LinkEvent) -> bool {
        let before = (self.connection.status(), self.connection.generation());
        let changed = match self.connection.handle(event) {
            Some(text) => self.handle_frame(&text),
            None => false,
        };
        changed || before != (self.connection.status(), self.connection.generation())
    }

    // ===== Inbound frames =====

    /// Decode and apply one raw inbound frame. Malformed frames change nothing.
    pub fn handle_frame(&mut self, raw: &str) -> bool {
        let Some(frame) = self.decoder.decode(raw) else {
            return false;
        };

        match frame {
            ServerFrame::System {
                content,
                session_id,
            } => {
                if let Some(session_id) = session_id {
                    self.connection.set_session_id(session_id);
                }
                self.conversation
                    .add_message(Message::assistant(content, None));
            }
            ServerFrame::Typing { persona, .. } => {
                if self.pending_done.remove(&persona) {
                    self.finish_reply(persona);
                }
                let id = self.conversation.open_stream(persona);
                tracing::debug!(persona = ?persona, message_id = %id, "Assistant typing");
            }
            ServerFrame::Stream {
                content, persona, ..
            } => {
                // Display happens on drain ticks.
                self.typewriter.append(content, persona);
                return false;
            }
            ServerFrame::Done {
                persona, content, ..
            } => {
                if let Some(content) = content {
                    self.typewriter.append(content, persona);
                }
                tracing::debug!(persona = ?persona, "Assistant reply complete");
                self.pending_done.insert(persona);
                self.on_done_poll();
            }
            ServerFrame::Error { content } => {
                tracing::warn!(error = %content, "Chat service reported an error");
                self.conversation
                    .add_message(Message::assistant(content, None));
                for persona in self.conversation.streaming_personas() {
                    self.pending_done.insert(persona);
                }
                self.on_done_poll();
            }
        }
        true
    }

    // ===== Timers =====

    /// One typewriter tick: move up to `chars_per_tick` characters into the
    /// transcript. Returns `true` if any text was revealed.
    pub fn on_drain_tick(&mut self) -> bool {
        let mut changed = false;
        for item in self.typewriter.drain(self.config.chars_per_tick) {
            changed |= self
                .conversation
                .update_last_message(&item.content, item.persona);
        }
        changed
    }

    /// One done-gating poll: close every pending persona whose buffered text
    /// has fully drained. Returns `true` if any message closed.
    pub fn on_done_poll(&mut self) -> bool {
        let ready: Vec<Option<Persona>> = self
            .pending_done
            .iter()
            .copied()
            .filter(|persona| !self.typewriter.has_pending(*persona))
            .collect();

        let mut changed = false;
        for persona in ready {
            self.pending_done.remove(&persona);
            changed |= self.conversation.set_streaming(false, persona);
        }
        changed
    }

    /// Close the persona's finished reply at once, revealing whatever text of
    /// it is still buffered.
    fn finish_reply(&mut self, persona: Option<Persona>) {
        let rest = self.typewriter.take_persona(persona);
        if !rest.is_empty() {
            self.conversation.update_last_message(&rest, persona);
        }
        self.conversation.set_streaming(false, persona);
        tracing::debug!(persona = ?persona, flushed = rest.len(), "Closed reply ahead of next turn");
    }

    /// Whether the typewriter timer must run.
    #[must_use]
    pub fn needs_drain(&self) -> bool {
        !self.typewriter.is_empty()
    }

    /// Whether the done-gating poll must run.
    #[must_use]
    pub fn needs_done_poll(&self) -> bool {
        !self.pending_done.is_empty()
    }

    /// When the pending reconnect fires, if one is pending.
    #[must_use]
    pub const fn reconnect_deadline(&self) -> Option<Instant> {
        self.connection.reconnect_deadline()
    }

    // ===== Commands =====

    /// Send a user message.
    ///
    /// The trimmed text is queued on the connection and, once queued, added to
    /// the transcript. With no open connection a connection attempt starts
    /// instead and the text is dropped.
    pub fn send_message(&mut self, content: &str, persona: Option<Persona>) -> Delivery {
        let content = content.trim();
        if content.is_empty() {
            return Delivery::Ignored;
        }

        if !self.connection.is_connected() {
            tracing::debug!(status = ?self.connection.status(), "Send while not connected");
            self.connection.connect();
            return Delivery::Reconnecting;
        }

        if let Err(e) = self.connection.send(&ClientFrame::new(content, persona)) {
            tracing::warn!(error = %e, "Failed to send chat message");
            return Delivery::Failed;
        }
        self.conversation.add_message(Message::user(content));
        Delivery::Sent
    }

    /// Tear down the current context and start a fresh one for `target`.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the session untouched, if no URL can be built
    /// for `target`.
    pub fn switch_target(&mut self, target: ChatTarget) -> Result<(), ConfigError> {
        let url = self.config.chat_url(&target)?;
        self.close();
        tracing::info!(chat_target = ?target, "Switching chat target");
        self.target = target;
        self.connection.set_url(url);
        self.connection.connect();
        Ok(())
    }

    /// Tear down the current context in one step: close the connection without
    /// reconnecting, drop undisplayed text, stop done gating and clear the
    /// transcript.
    pub fn close(&mut self) {
        self.connection.disconnect();
        self.typewriter.clear();
        self.pending_done.clear();
        self.conversation.clear();
    }

    // ===== Accessors =====

    /// Current view for rendering.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.conversation.snapshot(),
            typing: self.conversation.typing_personas(),
            status: self.connection.status(),
            session_id: self.connection.session_id().cloned(),
            target: self.target.clone(),
            decode_stats: self.decoder.stats(),
        }
    }

    /// The transcript.
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The typewriter buffer.
    #[must_use]
    pub const fn typewriter(&self) -> &TypewriterBuffer {
        &self.typewriter
    }

    /// Current connection status.
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Current chat target.
    #[must_use]
    pub const fn target(&self) -> &ChatTarget {
        &self.target
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}
