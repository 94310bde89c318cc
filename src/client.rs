//! ChatClient Actor implementation
//!
//! The single task that owns the `ChatEngine`. User commands, transport
//! events and the notification timer all funnel into one loop, so engine
//! operations never interleave. After every step the loop publishes a fresh
//! `ChatSnapshot` on a watch channel.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::connection::Connector;
use crate::engine::{ChatEngine, ChatSnapshot};
use crate::error::ClientError;
use crate::message::SessionEvent;
use crate::transport::WsConnector;
use crate::types::Identity;

/// Commands sent from handles to the ChatClient actor
#[derive(Debug)]
pub enum ClientCommand {
    /// Join the chat, replacing any current session
    Join {
        identity: Identity,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    /// Send a chat message
    SendMessage {
        content: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    /// Local user started or stopped typing
    Typing { is_typing: bool },
    /// Drop the current session
    Leave,
}

/// The ChatClient actor
pub struct ChatClient {
    engine: ChatEngine,
    /// Command receiver channel
    receiver: mpsc::Receiver<ClientCommand>,
    /// Events from every session the engine opens
    events: mpsc::UnboundedReceiver<SessionEvent>,
    updates: watch::Sender<ChatSnapshot>,
}

impl ChatClient {
    /// Create a client that talks to the backend in `config`
    pub fn new(receiver: mpsc::Receiver<ClientCommand>, config: &ClientConfig) -> Self {
        let connector = WsConnector::new(config.server_url.clone());
        Self::with_connector(receiver, Box::new(connector), config.notification_ttl)
    }

    /// Create a client over an arbitrary transport
    pub fn with_connector(
        receiver: mpsc::Receiver<ClientCommand>,
        connector: Box<dyn Connector>,
        notification_ttl: Duration,
    ) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        let engine = ChatEngine::new(connector, events_tx, notification_ttl);
        let (updates, _) = watch::channel(engine.snapshot());
        Self {
            engine,
            receiver,
            events,
            updates,
        }
    }

    /// Watch the chat state
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.updates.subscribe()
    }

    /// Run the ChatClient event loop
    ///
    /// Runs until every command sender is dropped, then leaves the chat.
    pub async fn run(mut self) {
        info!("ChatClient started");

        loop {
            let deadline = self.engine.notification_deadline();

            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(event) = self.events.recv() => {
                    self.engine.handle(event);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.engine.expire_notification(Instant::now()) {
                        debug!("Notification expired");
                    }
                }
            }

            self.publish();
        }

        self.engine.leave();
        self.publish();
        info!("ChatClient shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Join { identity, reply } => {
                let result = self.engine.join(&identity).map(|_| ());
                let _ = reply.send(result);
            }
            ClientCommand::SendMessage { content, reply } => {
                let result = self.engine.send_message(&content);
                if let Err(e) = &result {
                    debug!("Message not sent: {}", e);
                }
                let _ = reply.send(result);
            }
            ClientCommand::Typing { is_typing } => {
                if let Err(e) = self.engine.set_typing(is_typing) {
                    debug!("Typing signal not sent: {}", e);
                }
            }
            ClientCommand::Leave => self.engine.leave(),
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.engine.snapshot());
    }
}

/// Cloneable handle for driving a running `ChatClient`
#[derive(Debug, Clone)]
pub struct ChatHandle {
    sender: mpsc::Sender<ClientCommand>,
}

impl ChatHandle {
    pub fn new(sender: mpsc::Sender<ClientCommand>) -> Self {
        Self { sender }
    }

    /// Join the chat as `identity`
    ///
    /// Returns once the session is opened (not once it is joined); watch
    /// the snapshot for the connection state.
    pub async fn join(&self, identity: Identity) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        self.send(ClientCommand::Join { identity, reply }).await?;
        response.await.map_err(|_| ClientError::ChannelSend)?
    }

    /// Send a chat message
    pub async fn send_message(&self, content: impl Into<String>) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        self.send(ClientCommand::SendMessage {
            content: content.into(),
            reply,
        })
        .await?;
        response.await.map_err(|_| ClientError::ChannelSend)?
    }

    /// Report whether the local user is typing
    pub async fn set_typing(&self, is_typing: bool) -> Result<(), ClientError> {
        self.send(ClientCommand::Typing { is_typing }).await
    }

    /// Leave the chat
    pub async fn leave(&self) -> Result<(), ClientError> {
        self.send(ClientCommand::Leave).await
    }

    async fn send(&self, cmd: ClientCommand) -> Result<(), ClientError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| ClientError::ChannelSend)
    }
}
