//! Core types and utilities for folio-chat.
//!
//! This crate provides the foundational types shared by the chat client and its front ends:
//!
//! - **Identifiers**: Strongly-typed IDs for messages, server sessions, and chat objects
//! - **Personas**: The closed set of assistant identities a response can be attributed to
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use folio_chat_core::{MessageId, ObjectId, Persona};
//!
//! // Personas parse from their wire names
//! let persona: Persona = "researcher".parse().unwrap();
//! assert_eq!(persona.title(), "AI Researcher");
//!
//! // Message IDs are generated client-side
//! let id = MessageId::generate();
//! assert_ne!(id, MessageId::generate());
//!
//! // Object IDs name a specific content item to chat with
//! let object = ObjectId::new("project_apa_citation").unwrap();
//! assert_eq!(object.as_str(), "project_apa_citation");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod persona;

pub use error::{CoreError, Result};
pub use ids::{IdError, MessageId, ObjectId, SessionId};
pub use persona::Persona;
