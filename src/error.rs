//! Error types for the chat client
//!
//! Defines client-level errors, local validation errors, inbound protocol
//! errors and outbound send errors. Uses thiserror for ergonomic error
//! definitions.

use thiserror::Error;

/// Client-level errors
///
/// None of these are fatal to the process: the engine always falls back to
/// `Disconnected`, from which the user can retry with a fresh join.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad local input, rejected before any transport action
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transport failed to connect or dropped the session
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound payload did not match its event's shape
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Explicit error event from the backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Action requires a joined session
    #[error("Not joined")]
    NotJoined,

    /// Outbound queue of the session is closed
    #[error(transparent)]
    Send(#[from] SendError),

    /// Channel send error (the client actor has shut down)
    #[error("Channel send error")]
    ChannelSend,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Text to surface to the user as a notification
    pub fn notice(&self) -> String {
        match self {
            ClientError::Validation(e) => e.to_string(),
            ClientError::Transport(reason) => format!("Connection failed: {}", reason),
            ClientError::Protocol(e) => format!("Ignored malformed '{}' event", e.event),
            ClientError::Backend(message) => message.clone(),
            ClientError::NotJoined => "Join the chat first".to_string(),
            ClientError::Send(_) => "Disconnected from server".to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

/// Local input validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username blank or user id not a positive integer
    #[error("Please enter both username and user ID")]
    MissingIdentity,

    /// Message content blank after trimming
    #[error("Message cannot be empty")]
    EmptyMessage,
}

/// Inbound payload failed validation for a known event
#[derive(Debug, Error)]
#[error("Malformed '{event}' payload: {source}")]
pub struct ProtocolError {
    /// Event name the payload arrived under
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}

/// Message send errors
///
/// Occurs when emitting through a session whose outbound channel is closed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
