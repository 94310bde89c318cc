//! Realtime Chat Client Library
//!
//! A WebSocket chat client that keeps a local view of the conversation in
//! sync with an asynchronously arriving event stream.
//!
//! # Features
//! - Join with a username and user id
//! - Message history sync and live messages
//! - Online user presence snapshots
//! - Join/leave and typing system messages
//! - Self-expiring status notifications
//! - Sending messages and typing signals
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatClient` is the single actor owning the `ChatEngine`
//! - Each transport session is a background task reporting `SessionEvent`s
//! - Events from disposed sessions are recognized by `SessionId` and ignored
//! - No locks needed - all state access goes through the actor
//!
//! # Example
//! ```ignore
//! use tokio::sync::mpsc;
//! use chat_client_v1::{ChatClient, ChatHandle, ClientConfig, Identity};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::from_env().unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
//!
//!     let client = ChatClient::new(cmd_rx, &config);
//!     let mut updates = client.subscribe();
//!     tokio::spawn(client.run());
//!
//!     let chat = ChatHandle::new(cmd_tx);
//!     chat.join(Identity::new("bob", 1)).await.unwrap();
//!
//!     while updates.changed().await.is_ok() {
//!         println!("{:?}", updates.borrow().state);
//!     }
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod message;
pub mod notification;
pub mod presence;
pub mod router;
pub mod store;
pub mod transport;
pub mod types;
pub mod typing;

// Re-export main types for convenience
pub use client::{ChatClient, ChatHandle, ClientCommand};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, Connector, Transport};
pub use engine::{ChatEngine, ChatSnapshot, ChatView};
pub use error::{ClientError, ProtocolError, SendError, ValidationError};
pub use message::{Author, Message, OutboundRequest, RawEvent, SessionEvent, TransportEvent, User};
pub use notification::{Notification, NotificationCenter};
pub use presence::PresenceTracker;
pub use router::{Dispatched, EventRouter};
pub use store::MessageStore;
pub use transport::WsConnector;
pub use types::{ConnectionState, Identity, MessageId, SessionId};
pub use typing::TypingAggregator;
