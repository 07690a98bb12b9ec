//! Conversation state.
//!
//! The ordered transcript of one chat context. Messages are only ever appended,
//! and a message's content only ever grows. In-flight assistant messages are
//! tracked per persona through an explicit index, so streaming updates find
//! their target without scanning the transcript.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use folio_chat_core::{MessageId, Persona};
use serde::Serialize;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person using the client.
    User,
    /// The chat service.
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Client-assigned identifier.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Persona that authored an assistant message, if attributed.
    pub persona: Option<Persona>,
    /// Text shown so far.
    pub content: String,
    /// Whether more content is expected.
    pub is_streaming: bool,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a finished user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, None, content.into(), false)
    }

    /// Create a finished assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>, persona: Option<Persona>) -> Self {
        Self::new(Role::Assistant, persona, content.into(), false)
    }

    /// Create an empty assistant message that is still streaming.
    #[must_use]
    pub fn streaming(persona: Option<Persona>) -> Self {
        Self::new(Role::Assistant, persona, String::new(), true)
    }

    fn new(role: Role, persona: Option<Persona>, content: String, is_streaming: bool) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            persona,
            content,
            is_streaming,
            timestamp: Utc::now(),
        }
    }

    /// Check if this is a user message.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Ordered transcript plus in-flight indexes.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Transcript position of every message.
    positions: HashMap<MessageId, usize>,
    /// The streaming message of each persona.
    in_flight: HashMap<Option<Persona>, MessageId>,
    /// Newest assistant message of each persona.
    latest: HashMap<Option<Persona>, MessageId>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the end of the transcript.
    ///
    /// A streaming assistant message becomes its persona's in-flight message;
    /// if that persona already had one, the older one is closed first so at
    /// most one message per persona is streaming.
    pub fn add_message(&mut self, mut message: Message) -> MessageId {
        let id = message.id;
        if message.role == Role::User {
            message.is_streaming = false;
        } else {
            if message.is_streaming {
                if let Some(previous) = self.in_flight.insert(message.persona, id) {
                    tracing::debug!(
                        persona = ?message.persona,
                        previous = %previous,
                        "Closing superseded streaming message"
                    );
                    self.set_flag(previous, false);
                }
            }
            self.latest.insert(message.persona, id);
        }

        self.positions.insert(id, self.messages.len());
        self.messages.push(message);
        id
    }

    /// Return the persona's in-flight message, creating an empty one if needed.
    pub fn open_stream(&mut self, persona: Option<Persona>) -> MessageId {
        match self.in_flight.get(&persona) {
            Some(id) => *id,
            None => self.add_message(Message::streaming(persona)),
        }
    }

    /// Append `content` to the persona's in-flight message.
    ///
    /// Returns `false`, changing nothing, when the persona has no in-flight
    /// message.
    pub fn update_last_message(&mut self, content: &str, persona: Option<Persona>) -> bool {
        let target = self.in_flight.get(&persona).copied();
        let Some(message) = target.and_then(|id| self.get_mut(id)) else {
            tracing::debug!(persona = ?persona, len = content.len(), "No streaming message to update");
            return false;
        };
        message.content.push_str(content);
        true
    }

    /// Set the streaming flag of the persona's current message.
    ///
    /// Clearing closes the persona's in-flight message. Setting reopens the
    /// persona's newest assistant message when nothing is in flight. Returns
    /// `false` when there is no message to act on.
    pub fn set_streaming(&mut self, is_streaming: bool, persona: Option<Persona>) -> bool {
        if is_streaming {
            if self.in_flight.contains_key(&persona) {
                return true;
            }
            let Some(id) = self.latest.get(&persona).copied() else {
                return false;
            };
            self.in_flight.insert(persona, id);
            self.set_flag(id, true)
        } else {
            match self.in_flight.remove(&persona) {
                Some(id) => self.set_flag(id, false),
                None => false,
            }
        }
    }

    /// The persona's in-flight message.
    #[must_use]
    pub fn streaming_for(&self, persona: Option<Persona>) -> Option<&Message> {
        self.in_flight.get(&persona).and_then(|id| self.get(*id))
    }

    /// Personas that currently have an in-flight message.
    #[must_use]
    pub fn streaming_personas(&self) -> Vec<Option<Persona>> {
        self.in_flight.keys().copied().collect()
    }

    /// Personas whose in-flight message has no text yet, in persona order.
    #[must_use]
    pub fn typing_personas(&self) -> Vec<Option<Persona>> {
        let mut typing: Vec<Option<Persona>> = self
            .in_flight
            .iter()
            .filter(|(_, id)| self.get(**id).is_some_and(|m| m.content.is_empty()))
            .map(|(persona, _)| *persona)
            .collect();
        typing.sort_unstable();
        typing
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.positions.get(&id).and_then(|pos| self.messages.get(*pos))
    }

    /// All messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Copy of the transcript.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.positions.clear();
        self.in_flight.clear();
        self.latest.clear();
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let pos = *self.positions.get(&id)?;
        self.messages.get_mut(pos)
    }

    fn set_flag(&mut self, id: MessageId, is_streaming: bool) -> bool {
        match self.get_mut(id) {
            Some(message) => {
                message.is_streaming = is_streaming;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENG: Option<Persona> = Some(Persona::Engineer);
    const SPK: Option<Persona> = Some(Persona::Speaker);

    #[test]
    fn add_message_keeps_order() {
        let mut conv = Conversation::new();
        conv.add_message(Message::user("hi"));
        conv.add_message(Message::assistant("hello", None));

        let contents: Vec<&str> = conv.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello"]);
        assert!(conv.messages()[0].is_user());
    }

    #[test]
    fn user_messages_never_stream() {
        let mut conv = Conversation::new();
        let mut msg = Message::user("hi");
        msg.is_streaming = true;
        let id = conv.add_message(msg);

        assert!(!conv.get(id).unwrap().is_streaming);
        assert!(conv.streaming_for(None).is_none());
    }

    #[test]
    fn open_stream_is_idempotent_per_persona() {
        let mut conv = Conversation::new();
        let first = conv.open_stream(ENG);
        let again = conv.open_stream(ENG);
        let other = conv.open_stream(SPK);

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn update_targets_matching_persona() {
        let mut conv = Conversation::new();
        let eng = conv.open_stream(ENG);
        let spk = conv.open_stream(SPK);

        assert!(conv.update_last_message("code", ENG));
        assert!(conv.update_last_message("talk", SPK));

        assert_eq!(conv.get(eng).unwrap().content, "code");
        assert_eq!(conv.get(spk).unwrap().content, "talk");
    }

    #[test]
    fn typing_personas_excludes_messages_with_text() {
        let mut conv = Conversation::new();
        conv.open_stream(SPK);
        conv.open_stream(ENG);
        conv.open_stream(None);
        assert_eq!(conv.typing_personas(), vec![None, ENG, SPK]);

        conv.update_last_message("x", ENG);
        conv.set_streaming(false, None);
        assert_eq!(conv.typing_personas(), vec![SPK]);
    }

    #[test]
    fn update_without_match_is_noop() {
        let mut conv = Conversation::new();
        conv.add_message(Message::assistant("welcome", None));

        assert!(!conv.update_last_message("phantom", ENG));
        assert!(!conv.update_last_message("phantom", None));
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content, "welcome");
    }

    #[test]
    fn update_after_close_is_noop() {
        let mut conv = Conversation::new();
        let id = conv.open_stream(ENG);
        conv.update_last_message("done", ENG);
        assert!(conv.set_streaming(false, ENG));

        assert!(!conv.update_last_message(" extra", ENG));
        assert_eq!(conv.get(id).unwrap().content, "done");
        assert!(!conv.get(id).unwrap().is_streaming);
    }

    #[test]
    fn set_streaming_true_reopens_latest() {
        let mut conv = Conversation::new();
        let id = conv.open_stream(ENG);
        conv.set_streaming(false, ENG);

        assert!(conv.set_streaming(true, ENG));
        assert_eq!(conv.streaming_for(ENG).unwrap().id, id);
        assert!(!conv.set_streaming(true, SPK));
    }

    #[test]
    fn second_streaming_message_closes_first() {
        let mut conv = Conversation::new();
        let first = conv.add_message(Message::streaming(ENG));
        let second = conv.add_message(Message::streaming(ENG));

        assert!(!conv.get(first).unwrap().is_streaming);
        assert!(conv.get(second).unwrap().is_streaming);
        let streaming = conv
            .messages()
            .iter()
            .filter(|m| m.persona == ENG && m.is_streaming)
            .count();
        assert_eq!(streaming, 1);
    }

    #[test]
    fn chunking_does_not_change_final_content() {
        let text = "Append-only content grows monotonically";
        for chunk_size in 1..=text.len() {
            let mut conv = Conversation::new();
            let id = conv.open_stream(ENG);
            let mut previous_len = 0;

            for chunk in text.as_bytes().chunks(chunk_size) {
                let chunk = std::str::from_utf8(chunk).unwrap();
                conv.update_last_message(chunk, ENG);
                let current = &conv.get(id).unwrap().content;
                assert!(current.len() > previous_len);
                assert!(text.starts_with(current.as_str()));
                previous_len = current.len();
            }

            assert_eq!(conv.get(id).unwrap().content, text);
        }
    }

    #[test]
    fn clear_resets_indexes() {
        let mut conv = Conversation::new();
        conv.open_stream(ENG);
        conv.clear();

        assert!(conv.is_empty());
        assert!(conv.streaming_for(ENG).is_none());
        assert!(conv.streaming_personas().is_empty());
        assert!(!conv.set_streaming(true, ENG));
    }
}
