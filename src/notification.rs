//! Transient status notifications
//!
//! At most one notification is live at a time. Each one carries its own
//! expiry deadline; a newer notification replaces the old one together with
//! its deadline, so the latest always gets the full display time.

use std::time::Duration;

use tokio::time::Instant;

/// A status line shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub is_error: bool,
    pub expires_at: Instant,
}

/// Owner of the single live notification and its expiry timer
///
/// The timer is the `deadline`; whoever drives time (the client loop, or a
/// test) calls `expire` once it has passed.
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    current: Option<Notification>,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    /// Show a notification starting now
    pub fn notify(&mut self, text: impl Into<String>, is_error: bool) {
        self.notify_at(text, is_error, Instant::now());
    }

    /// Show a notification as of `now`, superseding any pending one
    pub fn notify_at(&mut self, text: impl Into<String>, is_error: bool, now: Instant) {
        self.current = Some(Notification {
            text: text.into(),
            is_error,
            expires_at: now + self.ttl,
        });
    }

    /// Clear the notification if its deadline has passed
    ///
    /// Returns true if a notification was cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.current {
            Some(n) if n.expires_at <= now => {
                self.current = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// When the live notification should be cleared
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|n| n.expires_at)
    }
}
