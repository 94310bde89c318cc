//! Realtime synchronization engine
//!
//! `ChatEngine` composes the connection manager, the event router and the
//! local view (messages, presence, notifications, typing). Every method runs
//! to completion before the next one is called; the async client loop is
//! the only caller in production.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::connection::{ConnectionManager, Connector};
use crate::error::{ClientError, ValidationError};
use crate::message::{
    events, ErrorPayload, Message, OutboundRequest, RawEvent, SessionEvent, TransportEvent,
    TypingPayload, User, UserEventPayload,
};
use crate::notification::{Notification, NotificationCenter};
use crate::presence::PresenceTracker;
use crate::router::{Dispatched, EventRouter};
use crate::store::MessageStore;
use crate::typing::TypingAggregator;
use crate::types::{ConnectionState, Identity, SessionId};

/// Local view of the chat, mutated only by routed events and engine calls
#[derive(Debug)]
pub struct ChatView {
    pub messages: MessageStore,
    pub presence: PresenceTracker,
    pub notifications: NotificationCenter,
    pub typing: TypingAggregator,
}

impl ChatView {
    pub fn new(notification_ttl: Duration) -> Self {
        Self {
            messages: MessageStore::new(),
            presence: PresenceTracker::new(),
            notifications: NotificationCenter::new(notification_ttl),
            typing: TypingAggregator::new(),
        }
    }
}

/// Dispatch table for chat events
pub fn chat_router() -> EventRouter<ChatView> {
    EventRouter::new()
        .on(events::RECENT_MESSAGES, |view: &mut ChatView, history: Vec<Message>| {
            view.messages.replace_history(history)
        })
        .on(events::NEW_MESSAGE, |view: &mut ChatView, message: Message| {
            view.messages.append(message)
        })
        .on(events::USER_JOINED, |view: &mut ChatView, p: UserEventPayload| {
            view.messages.append_system(format!("{} joined the chat", p.username))
        })
        .on(events::USER_LEFT, |view: &mut ChatView, p: UserEventPayload| {
            view.messages.append_system(format!("{} left the chat", p.username))
        })
        .on(events::ONLINE_USERS, |view: &mut ChatView, users: Vec<User>| {
            view.presence.set_online(users)
        })
        .on(events::USER_TYPING, |view: &mut ChatView, signal: TypingPayload| {
            view.typing.on_signal(&signal, &mut view.messages);
        })
        .on(events::ERROR, |view: &mut ChatView, p: ErrorPayload| {
            let err = ClientError::Backend(p.message);
            warn!("{}", err);
            view.notifications.notify(err.notice(), true)
        })
}

/// Point-in-time copy of everything a renderer needs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSnapshot {
    pub state: ConnectionState,
    pub messages: Vec<Message>,
    pub online_users: Vec<User>,
    pub notification: Option<Notification>,
    /// Changes whenever the message list was replaced rather than appended to
    pub history_generation: u64,
}

/// The client-side sync engine
pub struct ChatEngine {
    connection: ConnectionManager,
    router: EventRouter<ChatView>,
    view: ChatView,
}

impl ChatEngine {
    pub fn new(
        connector: Box<dyn Connector>,
        events: mpsc::UnboundedSender<SessionEvent>,
        notification_ttl: Duration,
    ) -> Self {
        Self {
            connection: ConnectionManager::new(connector, events),
            router: chat_router(),
            view: ChatView::new(notification_ttl),
        }
    }

    /// Open a new session for `identity`, replacing any existing one
    ///
    /// Invalid input is reported as a notification and leaves everything
    /// else untouched.
    pub fn join(&mut self, identity: &Identity) -> Result<SessionId, ClientError> {
        let session = match self.connection.join(identity) {
            Ok(session) => session,
            Err(e) => {
                let err = ClientError::from(e);
                self.view.notifications.notify(err.notice(), true);
                return Err(err);
            }
        };

        let username = self.connection.identity().map(|i| i.username.clone());
        self.view.typing.set_local_user(username);
        Ok(session)
    }

    /// Drop the current session without waiting for the backend
    pub fn leave(&mut self) {
        if self.connection.dispose() {
            info!("Left the chat");
        }
        self.view.typing.set_local_user(None);
    }

    /// Send a chat message on the joined session
    pub fn send_message(&mut self, content: &str) -> Result<(), ClientError> {
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }
        let user_id = self.joined_identity()?.user_id;

        self.connection.emit(OutboundRequest::SendMessage {
            content: content.to_string(),
            user_id,
        })?;
        Ok(())
    }

    /// Tell the backend whether the local user is typing
    pub fn set_typing(&mut self, is_typing: bool) -> Result<(), ClientError> {
        let username = self.joined_identity()?.username.clone();

        self.connection.emit(OutboundRequest::Typing {
            username,
            is_typing,
        })?;
        Ok(())
    }

    /// Apply one event from the transport
    ///
    /// Events from any session other than the live one are ignored.
    pub fn handle(&mut self, event: SessionEvent) {
        if !self.connection.is_current(event.session) {
            debug!("Ignoring event from stale session {}", event.session);
            return;
        }

        match event.event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected { reason } => self.on_disconnected(reason),
            TransportEvent::ConnectFailed { reason } => self.on_connect_failed(reason),
            TransportEvent::Malformed { error } => {
                warn!("Dropping undecodable frame: {}", error);
                self.view
                    .notifications
                    .notify("Ignored malformed frame from server", true);
            }
            TransportEvent::Frame(raw) => self.on_frame(raw),
        }
    }

    /// Clear the notification if its time is up
    pub fn expire_notification(&mut self, now: Instant) -> bool {
        self.view.notifications.expire(now)
    }

    pub fn notification_deadline(&self) -> Option<Instant> {
        self.view.notifications.deadline()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn view(&self) -> &ChatView {
        &self.view
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            state: self.connection.state(),
            messages: self.view.messages.messages().to_vec(),
            online_users: self.view.presence.online().to_vec(),
            notification: self.view.notifications.current().cloned(),
            history_generation: self.view.messages.generation(),
        }
    }

    fn joined_identity(&self) -> Result<&Identity, ClientError> {
        if self.connection.state() != ConnectionState::Joined {
            return Err(ClientError::NotJoined);
        }
        self.connection.identity().ok_or(ClientError::NotJoined)
    }

    fn on_connected(&mut self) {
        match self.connection.on_connected() {
            Ok(true) => self.view.notifications.notify("Connected to server", false),
            Ok(false) => debug!("Ignoring repeated connect"),
            Err(e) => {
                warn!("Failed to send join request: {}", e);
                self.on_disconnected(Some(e.to_string()));
            }
        }
    }

    fn on_disconnected(&mut self, reason: Option<String>) {
        match &reason {
            Some(reason) => info!("Disconnected from server: {}", reason),
            None => info!("Disconnected from server"),
        }
        self.connection.on_disconnected();
        self.view
            .notifications
            .notify("Disconnected from server", true);
    }

    fn on_connect_failed(&mut self, reason: String) {
        self.connection.on_disconnected();
        let err = ClientError::Transport(reason);
        warn!("{}", err);
        self.view.notifications.notify(err.notice(), true);
    }

    fn on_frame(&mut self, raw: RawEvent) {
        let name = raw.name.clone();
        match self.router.dispatch(&mut self.view, raw) {
            Ok(Dispatched::Handled) => {
                debug!("Handled '{}'", name);
                // An error event may be the backend refusing the join
                if name != events::ERROR {
                    self.connection.acknowledge();
                }
            }
            Ok(Dispatched::Unknown) => {}
            Err(e) => {
                warn!("{}", e);
                let err = ClientError::from(e);
                self.view.notifications.notify(err.notice(), true);
            }
        }
    }
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("connection", &self.connection)
            .field("messages", &self.view.messages.len())
            .field("online", &self.view.presence.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::MockConnector;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(3);

    fn engine() -> (ChatEngine, MockConnector) {
        let connector = MockConnector::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = ChatEngine::new(Box::new(connector.clone()), tx, TTL);
        (engine, connector)
    }

    fn frame(session: SessionId, name: &str, data: serde_json::Value) -> SessionEvent {
        SessionEvent::new(session, TransportEvent::Frame(RawEvent::new(name, data)))
    }

    fn message_json(content: &str, username: &str, id: i64) -> serde_json::Value {
        json!({
            "content": content,
            "user": { "username": username, "id": id },
            "createdAt": "2024-05-01T12:00:00Z"
        })
    }

    /// Join as bob/1 and walk the session up to `Joined`
    fn joined() -> (ChatEngine, MockConnector, SessionId) {
        let (mut engine, connector) = engine();
        let session = engine.join(&Identity::new("bob", 1)).unwrap();
        engine.handle(SessionEvent::new(session, TransportEvent::Connected));
        engine.handle(frame(session, events::RECENT_MESSAGES, json!([])));
        assert_eq!(engine.state(), ConnectionState::Joined);
        (engine, connector, session)
    }

    fn contents(engine: &ChatEngine) -> Vec<String> {
        engine
            .view()
            .messages
            .messages()
            .iter()
            .map(|m| m.content.clone())
            .collect()
    }

    #[test]
    fn test_join_and_first_message() {
        let (mut engine, connector) = engine();

        let session = engine.join(&Identity::new("bob", 1)).unwrap();
        assert_eq!(engine.state(), ConnectionState::Connecting);

        engine.handle(SessionEvent::new(session, TransportEvent::Connected));
        assert_eq!(engine.state(), ConnectionState::Connected);
        assert_eq!(
            connector.sent(0),
            vec![OutboundRequest::JoinChat {
                username: "bob".to_string(),
                user_id: 1,
            }]
        );

        engine.handle(frame(session, events::RECENT_MESSAGES, json!([])));
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("hi", "bob", 1)));

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Joined);
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].content, "hi");
        assert_eq!(snapshot.messages[0].author.username, "bob");
    }

    #[test]
    fn test_invalid_join_notifies_without_transport() {
        let (mut engine, connector) = engine();

        let result = engine.join(&Identity::new("", 1));

        assert!(matches!(
            result,
            Err(ClientError::Validation(ValidationError::MissingIdentity))
        ));
        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert_eq!(connector.opened(), 0);

        let notification = engine.view().notifications.current().unwrap();
        assert!(notification.is_error);
        assert_eq!(notification.text, "Please enter both username and user ID");
    }

    #[test]
    fn test_stale_session_connect_ignored() {
        let (mut engine, connector) = engine();

        let first = engine.join(&Identity::new("bob", 1)).unwrap();
        let second = engine.join(&Identity::new("bob", 1)).unwrap();
        assert!(connector.is_closed(0));

        engine.handle(SessionEvent::new(first, TransportEvent::Connected));

        assert_eq!(engine.state(), ConnectionState::Connecting);
        assert!(connector.sent(0).is_empty());
        assert!(connector.sent(1).is_empty());

        engine.handle(SessionEvent::new(second, TransportEvent::Connected));
        assert_eq!(engine.state(), ConnectionState::Connected);
        assert_eq!(connector.sent(1).len(), 1);
    }

    #[test]
    fn test_stale_session_frames_and_disconnect_ignored() {
        let (mut engine, _connector) = engine();
        let first = engine.join(&Identity::new("bob", 1)).unwrap();
        let second = engine.join(&Identity::new("bob", 1)).unwrap();
        engine.handle(SessionEvent::new(second, TransportEvent::Connected));

        engine.handle(frame(first, events::NEW_MESSAGE, message_json("old", "amy", 2)));
        engine.handle(SessionEvent::new(
            first,
            TransportEvent::Disconnected { reason: None },
        ));

        assert!(engine.view().messages.is_empty());
        assert_eq!(engine.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_disconnect_resets_and_notifies() {
        let (mut engine, connector, session) = joined();

        engine.handle(SessionEvent::new(
            session,
            TransportEvent::Disconnected {
                reason: Some("transport close".to_string()),
            },
        ));

        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert!(connector.is_closed(0));
        let notification = engine.view().notifications.current().unwrap();
        assert_eq!(notification.text, "Disconnected from server");
        assert!(notification.is_error);

        // Rejoin works from here
        let again = engine.join(&Identity::new("bob", 1)).unwrap();
        assert_ne!(again, session);
        assert_eq!(engine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_disconnect_while_connecting() {
        let (mut engine, connector) = engine();
        let session = engine.join(&Identity::new("bob", 1)).unwrap();
        assert_eq!(engine.state(), ConnectionState::Connecting);

        engine.handle(SessionEvent::new(
            session,
            TransportEvent::Disconnected { reason: None },
        ));

        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert!(connector.is_closed(0));
        let notification = engine.view().notifications.current().unwrap();
        assert_eq!(notification.text, "Disconnected from server");
        assert!(notification.is_error);
    }

    #[test]
    fn test_disconnect_before_history() {
        let (mut engine, connector) = engine();
        let session = engine.join(&Identity::new("bob", 1)).unwrap();
        engine.handle(SessionEvent::new(session, TransportEvent::Connected));
        assert_eq!(engine.state(), ConnectionState::Connected);

        engine.handle(SessionEvent::new(
            session,
            TransportEvent::Disconnected {
                reason: Some("server shutting down".to_string()),
            },
        ));

        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert!(connector.is_closed(0));
        let notification = engine.view().notifications.current().unwrap();
        assert_eq!(notification.text, "Disconnected from server");
        assert!(notification.is_error);
        assert!(matches!(engine.send_message("hi"), Err(ClientError::NotJoined)));
    }

    #[test]
    fn test_connect_failure() {
        let (mut engine, _connector) = engine();
        let session = engine.join(&Identity::new("bob", 1)).unwrap();

        engine.handle(SessionEvent::new(
            session,
            TransportEvent::ConnectFailed {
                reason: "connection refused".to_string(),
            },
        ));

        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert_eq!(
            engine.view().notifications.current().unwrap().text,
            "Connection failed: connection refused"
        );
    }

    #[test]
    fn test_history_replaced_then_appended() {
        let (mut engine, _connector, session) = joined();
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("m0", "amy", 2)));

        engine.handle(frame(
            session,
            events::RECENT_MESSAGES,
            json!([message_json("m1", "amy", 2), message_json("m2", "bob", 1)]),
        ));
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("m3", "amy", 2)));

        assert_eq!(contents(&engine), vec!["m1", "m2", "m3"]);
        assert_eq!(engine.snapshot().history_generation, 2);
    }

    #[test]
    fn test_join_and_leave_system_messages() {
        let (mut engine, _connector, session) = joined();

        engine.handle(frame(session, events::USER_JOINED, json!({ "username": "amy" })));
        engine.handle(frame(session, events::USER_LEFT, json!({ "username": "amy" })));

        assert_eq!(
            contents(&engine),
            vec!["amy joined the chat", "amy left the chat"]
        );
        assert!(engine.view().messages.messages().iter().all(|m| m.is_system));
    }

    #[test]
    fn test_own_typing_signal_produces_nothing() {
        let (mut engine, _connector, session) = joined();

        engine.handle(frame(
            session,
            events::USER_TYPING,
            json!({ "username": "bob", "isTyping": true }),
        ));
        assert!(engine.view().messages.is_empty());

        engine.handle(frame(
            session,
            events::USER_TYPING,
            json!({ "username": "amy", "isTyping": true }),
        ));
        assert_eq!(contents(&engine), vec!["amy is typing..."]);
    }

    #[test]
    fn test_online_users_fully_replaced() {
        let (mut engine, _connector, session) = joined();

        engine.handle(frame(
            session,
            events::ONLINE_USERS,
            json!([{ "id": 1, "username": "a" }]),
        ));
        engine.handle(frame(
            session,
            events::ONLINE_USERS,
            json!([{ "id": 1, "username": "a" }, { "id": 2, "username": "b" }]),
        ));

        let online = engine.snapshot().online_users;
        assert_eq!(
            online,
            vec![
                User {
                    id: 1,
                    username: "a".to_string()
                },
                User {
                    id: 2,
                    username: "b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_error_event_is_verbatim_and_not_an_ack() {
        let (mut engine, _connector) = engine();
        let session = engine.join(&Identity::new("bob", 1)).unwrap();
        engine.handle(SessionEvent::new(session, TransportEvent::Connected));

        engine.handle(frame(session, events::ERROR, json!({ "message": "User not found" })));

        assert_eq!(engine.state(), ConnectionState::Connected);
        let notification = engine.view().notifications.current().unwrap();
        assert_eq!(notification.text, "User not found");
        assert!(notification.is_error);
    }

    #[test]
    fn test_malformed_payload_dropped_and_reported() {
        let (mut engine, _connector, session) = joined();
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("ok", "amy", 2)));

        engine.handle(frame(session, events::NEW_MESSAGE, json!({ "content": 5 })));
        engine.handle(frame(session, events::ONLINE_USERS, json!("everyone")));

        assert_eq!(contents(&engine), vec!["ok"]);
        assert_eq!(engine.state(), ConnectionState::Joined);
        assert_eq!(
            engine.view().notifications.current().unwrap().text,
            "Ignored malformed 'onlineUsers' event"
        );
    }

    #[test]
    fn test_undecodable_frame_leaves_session_intact() {
        let (mut engine, connector, session) = joined();
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("ok", "amy", 2)));
        let before = engine.snapshot();

        engine.handle(SessionEvent::new(
            session,
            TransportEvent::Malformed {
                error: "JSON error: expected value at line 1 column 1".to_string(),
            },
        ));

        let after = engine.snapshot();
        assert_eq!(after.state, ConnectionState::Joined);
        assert_eq!(after.messages, before.messages);
        assert_eq!(after.history_generation, before.history_generation);
        assert!(!connector.is_closed(0));
        let notification = after.notification.unwrap();
        assert_eq!(notification.text, "Ignored malformed frame from server");
        assert!(notification.is_error);

        // Later frames on the same session still apply
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("next", "amy", 2)));
        assert_eq!(contents(&engine), vec!["ok", "next"]);
    }

    #[test]
    fn test_unknown_event_dropped_silently() {
        let (mut engine, _connector, session) = joined();

        engine.handle(frame(session, "reactionAdded", json!({ "emoji": "+1" })));

        assert!(engine.view().messages.is_empty());
        assert_eq!(
            engine.view().notifications.current().unwrap().text,
            "Connected to server"
        );
    }

    #[test]
    fn test_send_message_preconditions() {
        let (mut engine, connector) = engine();
        assert!(matches!(
            engine.send_message("hi"),
            Err(ClientError::NotJoined)
        ));

        let session = engine.join(&Identity::new("bob", 1)).unwrap();
        engine.handle(SessionEvent::new(session, TransportEvent::Connected));
        assert!(matches!(
            engine.send_message("hi"),
            Err(ClientError::NotJoined)
        ));

        engine.handle(frame(session, events::ONLINE_USERS, json!([])));
        assert!(matches!(
            engine.send_message("   "),
            Err(ClientError::Validation(ValidationError::EmptyMessage))
        ));

        engine.send_message("hello there").unwrap();
        assert_eq!(
            connector.sent(0).last(),
            Some(&OutboundRequest::SendMessage {
                content: "hello there".to_string(),
                user_id: 1,
            })
        );
    }

    #[test]
    fn test_set_typing_emits_request() {
        let (mut engine, connector, _session) = joined();

        engine.set_typing(true).unwrap();

        assert_eq!(
            connector.sent(0).last(),
            Some(&OutboundRequest::Typing {
                username: "bob".to_string(),
                is_typing: true,
            })
        );
    }

    #[test]
    fn test_leave_disposes_session() {
        let (mut engine, connector, session) = joined();

        engine.leave();

        assert_eq!(engine.state(), ConnectionState::Disconnected);
        assert!(connector.is_closed(0));
        engine.handle(frame(session, events::NEW_MESSAGE, message_json("late", "amy", 2)));
        assert!(engine.view().messages.is_empty());
        assert!(matches!(engine.send_message("hi"), Err(ClientError::NotJoined)));
    }

    #[test]
    fn test_notification_superseded_by_later_event() {
        let (mut engine, _connector, session) = joined();
        let connected_deadline = engine.notification_deadline().unwrap();

        engine.handle(frame(session, events::ERROR, json!({ "message": "Slow down" })));

        let deadline = engine.notification_deadline().unwrap();
        assert!(deadline >= connected_deadline);
        assert!(!engine.expire_notification(deadline - Duration::from_millis(1)));
        assert_eq!(
            engine.view().notifications.current().unwrap().text,
            "Slow down"
        );
        assert!(engine.expire_notification(deadline));
        assert!(engine.snapshot().notification.is_none());
    }
}
