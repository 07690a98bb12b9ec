//! Streaming chat client for the folio chat service.
//!
//! The client keeps one live connection to the chat service, decodes the
//! frames it sends, and reveals streamed reply text at a constant typing pace
//! while keeping each persona's reply in its own transcript message.
//!
//! # Modules
//!
//! - [`config`]: endpoint URLs and timing, from defaults and the environment
//! - [`protocol`] and [`decoder`]: wire frames and defensive decoding
//! - [`ws`] and [`connection`]: transport and the reconnecting connection manager
//! - [`typewriter`] and [`conversation`]: display buffering and the transcript
//! - [`session`] and [`service`]: the state machine and the task that drives it
//! - [`api`]: REST endpoints next to the chat socket
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use folio_chat_client::{ChatService, ChatTarget, ClientConfig, TungsteniteConnector};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let chat = ChatService::spawn(config, Arc::new(TungsteniteConnector), ChatTarget::General)?;
//!
//! let mut updates = chat.subscribe();
//! chat.send("What are you working on?").await?;
//! while updates.changed().await.is_ok() {
//!     let snapshot = updates.borrow_and_update().clone();
//!     if let Some(last) = snapshot.messages.last() {
//!         println!("{}", last.content);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod connection;
pub mod conversation;
pub mod decoder;
pub mod protocol;
pub mod service;
pub mod session;
pub mod target;
pub mod typewriter;
pub mod ws;

pub use api::{ApiClient, ApiError, ContactInfo, HealthStatus};
pub use config::{ClientConfig, ConfigError};
pub use connection::{ConnectionManager, ConnectionStatus, LinkEvent};
pub use conversation::{Conversation, Message, Role};
pub use decoder::{DecodeStats, FrameDecoder};
pub use protocol::{ClientFrame, ServerFrame, PROTOCOL_VERSION};
pub use service::{ChatHandle, ChatService, ServiceError};
pub use session::{ChatSession, ChatSnapshot, Delivery};
pub use target::ChatTarget;
pub use typewriter::{BufferItem, TypewriterBuffer};
pub use ws::{Connector, Link, TransportEvent, TungsteniteConnector, WsError, WsSender};

pub use folio_chat_core::{MessageId, ObjectId, Persona, SessionId};
