//! Online user presence
//!
//! Tracks who is online as a full snapshot replaced on every update.

use crate::message::User;

/// Current online-user snapshot
///
/// No merging and no local uniqueness checks: each update wholly replaces
/// the previous list, exactly as the backend sent it.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    online: Vec<User>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the online set
    pub fn set_online(&mut self, users: Vec<User>) {
        self.online = users;
    }

    /// Users in the latest snapshot
    pub fn online(&self) -> &[User] {
        &self.online
    }

    pub fn count(&self) -> usize {
        self.online.len()
    }
}
