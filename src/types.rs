//! Basic type definitions for the chat client
//!
//! Provides newtype wrappers and small value types:
//! - `SessionId`: UUID-based identifier of one transport session
//! - `MessageId`: opaque backend message identifier
//! - `ConnectionState`: lifecycle of the connection
//! - `Identity`: who the local user claims to be

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Unique transport session identifier (newtype pattern)
///
/// Every call to `join` opens a session with a fresh id. Events coming
/// back from the transport are tagged with it so that callbacks from a
/// disposed session can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque message identifier assigned by the backend
///
/// Backends disagree on whether ids are strings or numbers, so both are
/// accepted and kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => Self(text),
            Raw::Number(n) => Self(n.to_string()),
        })
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection lifecycle as seen by the client
///
/// Exactly one value at a time, owned by the `ConnectionManager`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport session
    #[default]
    Disconnected,
    /// Session opened, waiting for the transport to connect
    Connecting,
    /// Transport connected, join request sent
    Connected,
    /// Backend has started streaming chat events
    Joined,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Joined => "joined",
        };
        f.write_str(label)
    }
}

/// Local user identity supplied before joining
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub user_id: i64,
}

impl Identity {
    /// Create an identity from raw user input (not yet validated)
    pub fn new(username: impl Into<String>, user_id: i64) -> Self {
        Self {
            username: username.into(),
            user_id,
        }
    }

    /// Validate the identity, returning a copy with the username trimmed
    ///
    /// Both a non-blank username and a positive user id are required.
    pub fn validated(&self) -> Result<Self, ValidationError> {
        let username = self.username.trim();
        if username.is_empty() || self.user_id <= 0 {
            return Err(ValidationError::MissingIdentity);
        }
        Ok(Self {
            username: username.to_string(),
            user_id: self.user_id,
        })
    }
}
