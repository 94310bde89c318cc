//! Message protocol definitions
//!
//! JSON event protocol spoken with the chat backend. Every frame is an
//! envelope `{"event": <name>, "data": <payload>}`; payload shapes per event
//! are the typed structs below and are validated at the router boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MessageId, SessionId};

/// Inbound event names
pub mod events {
    pub const RECENT_MESSAGES: &str = "recentMessages";
    pub const NEW_MESSAGE: &str = "newMessage";
    pub const USER_JOINED: &str = "userJoined";
    pub const USER_LEFT: &str = "userLeft";
    pub const ONLINE_USERS: &str = "onlineUsers";
    pub const USER_TYPING: &str = "userTyping";
    pub const ERROR: &str = "error";
}

/// Username shown as the author of locally synthesized messages
pub const SYSTEM_AUTHOR: &str = "System";

/// A chat message as delivered by the backend (or synthesized locally)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    pub content: String,
    #[serde(rename = "user")]
    pub author: Author,
    #[serde(rename = "createdAt")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_system: bool,
}

impl Message {
    /// Synthesize a system message stamped with the local receipt time
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            author: Author {
                username: SYSTEM_AUTHOR.to_string(),
                id: None,
            },
            timestamp: Utc::now(),
            is_system: true,
        }
    }
}

/// Message author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// An online user in a presence snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Payload of `userJoined` / `userLeft`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserEventPayload {
    pub username: String,
}

/// Payload of `userTyping`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub username: String,
    pub is_typing: bool,
}

/// Payload of `error`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Inbound frame before validation
///
/// Only the envelope is checked here; `data` is decoded by the route
/// registered for `event`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "event")]
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RawEvent {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Client → Server request
///
/// Serialized with the same `event`/`data` envelope as inbound frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum OutboundRequest {
    /// Announce the local identity on a fresh connection
    JoinChat {
        username: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    /// Post a chat message
    SendMessage {
        content: String,
        #[serde(rename = "userId")]
        user_id: i64,
    },
    /// Local typing indicator
    Typing {
        username: String,
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },
}

/// Something the transport observed for a session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Transport-level connect succeeded
    Connected,
    /// Peer closed the session or the network failed
    Disconnected { reason: Option<String> },
    /// Transport could not connect at all
    ConnectFailed { reason: String },
    /// A text frame that is not a valid event envelope
    Malformed { error: String },
    /// A well-formed event envelope
    Frame(RawEvent),
}

/// A transport event tagged with the session that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: TransportEvent,
}

impl SessionEvent {
    pub fn new(session: SessionId, event: TransportEvent) -> Self {
        Self { session, event }
    }
}
