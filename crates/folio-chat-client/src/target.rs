//! Chat targets.

use folio_chat_core::ObjectId;
use serde::Serialize;

/// What the user is talking to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatTarget {
    /// The general-purpose multi-persona assistant.
    #[default]
    General,
    /// A specific content item with its own persona.
    Object {
        /// Object identifier understood by the service.
        id: ObjectId,
        /// Display title, sent so the service can greet by name.
        title: String,
    },
}

impl ChatTarget {
    /// Target a content item.
    #[must_use]
    pub fn object(id: ObjectId, title: impl Into<String>) -> Self {
        Self::Object {
            id,
            title: title.into(),
        }
    }

    /// The object identifier, for object targets.
    #[must_use]
    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::General => None,
            Self::Object { id, .. } => Some(id),
        }
    }
}
