//! Wire types for the chat service.
//!
//! These types mirror the frames exchanged with the chat service over the
//! streaming connection.
//!
//! Endpoint: WS /api/v1/chat

use folio_chat_core::{ObjectId, Persona, SessionId};
use serde::{Deserialize, Serialize};

/// Version of the outbound frame convention implemented by [`ClientFrame`].
///
/// Version 1 is a JSON object carrying the user's text in `content` and an
/// optional `persona` routing hint. Bare-string frames are not produced.
pub const PROTOCOL_VERSION: u32 = 1;

// =============================================================================
// Client -> Server
// =============================================================================

/// The single frame the client ever sends: one user utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Free-form user text.
    pub content: String,
    /// Persona the user wants to answer; the service picks one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
}

impl ClientFrame {
    /// Build a frame for the given text.
    #[must_use]
    pub fn new(content: impl Into<String>, persona: Option<Persona>) -> Self {
        Self {
            content: content.into(),
            persona,
        }
    }
}

// =============================================================================
// Server -> Client
// =============================================================================

/// Frames sent by the chat service, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Welcome or informational text; always shown as a new assistant message.
    System {
        /// Message text.
        content: String,
        /// Session identifier assigned by the service.
        #[serde(default)]
        session_id: Option<SessionId>,
    },
    /// An assistant is about to stream a reply.
    Typing {
        /// Persona that will reply.
        #[serde(default)]
        persona: Option<Persona>,
        /// Object whose persona will reply (object chats).
        #[serde(default)]
        object_id: Option<ObjectId>,
    },
    /// A chunk of reply text.
    Stream {
        /// Text fragment to append.
        content: String,
        /// Persona the fragment belongs to.
        #[serde(default)]
        persona: Option<Persona>,
        /// Object the fragment belongs to (object chats).
        #[serde(default)]
        object_id: Option<ObjectId>,
    },
    /// The reply for a persona is complete.
    Done {
        /// Persona whose reply finished.
        #[serde(default)]
        persona: Option<Persona>,
        /// Object whose reply finished (object chats).
        #[serde(default)]
        object_id: Option<ObjectId>,
        /// Trailing text, usually empty.
        #[serde(default)]
        content: Option<String>,
    },
    /// Server-side failure, shown inline as an assistant message.
    Error {
        /// Error text.
        content: String,
    },
}

impl ServerFrame {
    /// Wire name of the frame kind, for diagnostics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::System { .. } => "system",
            Self::Typing { .. } => "typing",
            Self::Stream { .. } => "stream",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
