//! Message history
//!
//! Append-only sequence of chat messages in arrival order.

use crate::message::Message;

/// Ordered message history for the current view
///
/// Entries are never reordered, edited or removed individually. The only
/// way to drop entries is `replace_history`, used for the initial sync of
/// a session. Duplicate ids are kept as separate entries.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
    /// Bumped on every history replacement
    generation: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole history with a snapshot from the backend
    pub fn replace_history(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.generation += 1;
    }

    /// Add a message to the end
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Synthesize and append a system message
    pub fn append_system(&mut self, text: impl Into<String>) {
        self.messages.push(Message::system(text));
    }

    /// All messages in insertion order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of history replacements so far
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
