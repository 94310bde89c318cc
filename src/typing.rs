//! Typing indicators
//!
//! Turns inbound typing signals into one-shot system messages.

use crate::message::TypingPayload;
use crate::store::MessageStore;

/// Converts typing signals from other users into system messages
///
/// Stop signals and the local user's own signals are ignored. There is no
/// "currently typing" state: every start signal yields one message.
#[derive(Debug, Default)]
pub struct TypingAggregator {
    local_username: Option<String>,
}

impl TypingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the username whose signals are suppressed
    pub fn set_local_user(&mut self, username: Option<String>) {
        self.local_username = username;
    }

    /// Handle a typing signal
    ///
    /// Returns true if a system message was appended.
    pub fn on_signal(&self, signal: &TypingPayload, messages: &mut MessageStore) -> bool {
        if !signal.is_typing || self.local_username.as_deref() == Some(signal.username.as_str()) {
            return false;
        }
        messages.append_system(format!("{} is typing...", signal.username));
        true
    }
}
