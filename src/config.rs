//! Client configuration
//!
//! Defaults with environment overrides:
//! - `CHAT_SERVER_URL`: WebSocket endpoint of the chat backend
//! - `CHAT_NOTIFICATION_TTL_MS`: how long a notification stays visible

use std::env;
use std::time::Duration;

use crate::error::ClientError;

/// Default backend address
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3000";

/// Default notification display time
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// Channel buffer size for client commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub notification_ttl: Duration,
    pub command_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            notification_ttl: DEFAULT_NOTIFICATION_TTL,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CHAT_SERVER_URL") {
            config.server_url = url;
        }

        if let Some(ttl) = lookup("CHAT_NOTIFICATION_TTL_MS") {
            let millis: u64 = ttl.trim().parse().map_err(|_| {
                ClientError::Config(format!("CHAT_NOTIFICATION_TTL_MS is not a number: {}", ttl))
            })?;
            config.notification_ttl = Duration::from_millis(millis);
        }

        Ok(config)
    }

    /// Override the server URL
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }
}
