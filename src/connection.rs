//! Connection management
//!
//! `ConnectionManager` owns the single active transport session and the
//! connection state. The transport itself sits behind the `Connector` /
//! `Transport` traits so the engine can run against a real WebSocket or a
//! scripted one in tests.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{SendError, ValidationError};
use crate::message::{OutboundRequest, SessionEvent};
use crate::types::{ConnectionState, Identity, SessionId};

/// Outbound half of one transport session
pub trait Transport: Send {
    /// Queue a request for delivery to the backend
    fn emit(&mut self, request: OutboundRequest) -> Result<(), SendError>;

    /// Tear the session down. Calling it more than once is a no-op.
    fn close(&mut self);
}

/// Factory for transport sessions
pub trait Connector: Send {
    /// Start connecting a new session
    ///
    /// Returns immediately. The session reports its lifecycle and inbound
    /// frames on `events`, tagged with `session`.
    fn open(
        &mut self,
        session: SessionId,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Box<dyn Transport>;
}

struct ActiveSession {
    id: SessionId,
    identity: Identity,
    transport: Box<dyn Transport>,
}

/// Owner of the current transport session
///
/// Guarantees at most one live session: opening a new one always disposes
/// the previous one first. Events from any other session id are stale and
/// must be ignored by the caller (see `is_current`).
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    events: mpsc::UnboundedSender<SessionEvent>,
    session: Option<ActiveSession>,
    state: ConnectionState,
}

impl ConnectionManager {
    /// Create a manager that opens sessions through `connector` and routes
    /// their events into `events`
    pub fn new(connector: Box<dyn Connector>, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            connector,
            events,
            session: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Validate `identity` and open a fresh session for it
    ///
    /// On invalid input nothing is touched: no session is disposed or
    /// created and the state is unchanged.
    pub fn join(&mut self, identity: &Identity) -> Result<SessionId, ValidationError> {
        let identity = identity.validated()?;

        self.dispose();

        let id = SessionId::new();
        let transport = self.connector.open(id, self.events.clone());
        info!("Opening session {} for '{}'", id, identity.username);

        self.session = Some(ActiveSession {
            id,
            identity,
            transport,
        });
        self.state = ConnectionState::Connecting;
        Ok(id)
    }

    /// Close the current session, if any, and reset to `Disconnected`
    ///
    /// Returns true if a session was closed.
    pub fn dispose(&mut self) -> bool {
        self.state = ConnectionState::Disconnected;
        match self.session.take() {
            Some(mut session) => {
                session.transport.close();
                debug!("Disposed session {}", session.id);
                true
            }
            None => false,
        }
    }

    /// Check if `session` is the live session
    pub fn is_current(&self, session: SessionId) -> bool {
        self.session.as_ref().is_some_and(|s| s.id == session)
    }

    /// Transport connected: move to `Connected` and announce ourselves
    ///
    /// Returns false if the session was not waiting for a connect.
    pub fn on_connected(&mut self) -> Result<bool, SendError> {
        if self.state != ConnectionState::Connecting {
            return Ok(false);
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };

        self.state = ConnectionState::Connected;
        info!("Session {} connected", session.id);

        session.transport.emit(OutboundRequest::JoinChat {
            username: session.identity.username.clone(),
            user_id: session.identity.user_id,
        })?;
        Ok(true)
    }

    /// Backend answered the join: move `Connected` to `Joined`
    ///
    /// Returns true if the state changed.
    pub fn acknowledge(&mut self) -> bool {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Joined;
            if let Some(session) = &self.session {
                info!("Session {} joined as '{}'", session.id, session.identity.username);
            }
            true
        } else {
            false
        }
    }

    /// Transport dropped: release the session whatever the prior state
    pub fn on_disconnected(&mut self) {
        if let Some(session) = &self.session {
            info!("Session {} disconnected", session.id);
        }
        self.dispose();
    }

    /// Send a request over the live session
    pub fn emit(&mut self, request: OutboundRequest) -> Result<(), SendError> {
        match self.session.as_mut() {
            Some(session) => session.transport.emit(request),
            None => Err(SendError::ChannelClosed),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity of the live session
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("session", &self.session_id())
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
