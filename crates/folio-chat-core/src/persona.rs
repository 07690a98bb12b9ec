//! Assistant personas.
//!
//! A reply from the chat service can be attributed to one of a fixed set of
//! personas. Replies without attribution (single-persona chats, object chats,
//! system and error messages) carry `Option::<Persona>::None`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named assistant identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// Builds things.
    Engineer,
    /// Publishes things.
    Researcher,
    /// Presents things.
    Speaker,
    /// Teaches things.
    Educator,
}

impl Persona {
    /// Every persona, in display order.
    pub const ALL: [Self; 4] = [
        Self::Engineer,
        Self::Researcher,
        Self::Speaker,
        Self::Educator,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Engineer => "engineer",
            Self::Researcher => "researcher",
            Self::Speaker => "speaker",
            Self::Educator => "educator",
        }
    }

    /// Human-readable title shown next to the persona's messages.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::Engineer => "AI Engineer",
            Self::Researcher => "AI Researcher",
            Self::Speaker => "Tech Speaker",
            Self::Educator => "Educator",
        }
    }

    /// Accent color as a `#rrggbb` hex string.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Engineer => "#22d3ee",
            Self::Researcher => "#8b5cf6",
            Self::Speaker => "#f97316",
            Self::Educator => "#14b8a6",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| CoreError::UnknownPersona(s.to_string()))
    }
}
