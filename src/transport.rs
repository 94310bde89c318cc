//! WebSocket transport
//!
//! Each session is a background task that connects to the backend, turns
//! incoming text frames into `SessionEvent`s and writes queued outbound
//! requests as JSON text frames.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::connection::{Connector, Transport};
use crate::error::{ClientError, SendError};
use crate::message::{OutboundRequest, RawEvent, SessionEvent, TransportEvent};
use crate::types::SessionId;

/// Opens WebSocket sessions against a fixed backend URL
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WsConnector {
    fn open(
        &mut self,
        session: SessionId,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Box<dyn Transport> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(self.url.clone(), session, outbound_rx, events));
        Box::new(WsTransport {
            outbound: outbound_tx,
            task,
        })
    }
}

/// Handle to one running WebSocket session
struct WsTransport {
    outbound: mpsc::UnboundedSender<OutboundRequest>,
    task: JoinHandle<()>,
}

impl Transport for WsTransport {
    fn emit(&mut self, request: OutboundRequest) -> Result<(), SendError> {
        self.outbound
            .send(request)
            .map_err(|_| SendError::ChannelClosed)
    }

    fn close(&mut self) {
        // Aborting a finished task is a no-op
        self.task.abort();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drive one session until either side closes
async fn run_session(
    url: String,
    session: SessionId,
    mut outbound: mpsc::UnboundedReceiver<OutboundRequest>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let report = |event: TransportEvent| {
        if events.send(SessionEvent::new(session, event)).is_err() {
            debug!("Event receiver gone, dropping event for {}", session);
        }
    };

    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let err = ClientError::from(e);
            warn!("Session {} failed to connect to {}: {}", session, url, err);
            report(TransportEvent::ConnectFailed {
                reason: err.to_string(),
            });
            return;
        }
    };

    info!("Session {} connected to {}", session, url);
    report(TransportEvent::Connected);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<RawEvent>(&text) {
                        Ok(raw) => report(TransportEvent::Frame(raw)),
                        Err(e) => {
                            let err = ClientError::from(e);
                            warn!("Undecodable frame on {}: {}", session, err);
                            report(TransportEvent::Malformed {
                                error: err.to_string(),
                            });
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server sent close frame on {}", session);
                    break frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty());
                }
                Some(Ok(_)) => {
                    // Binary, ping and pong frames carry no chat events
                }
                Some(Err(e)) => {
                    let err = ClientError::from(e);
                    error!("Session {} dropped: {}", session, err);
                    break Some(err.to_string());
                }
                None => break None,
            },
            request = outbound.recv() => match request {
                Some(request) => match serde_json::to_string(&request) {
                    Ok(json) => {
                        if let Err(e) = ws_sender.send(Message::Text(json.into())).await {
                            let err = ClientError::from(e);
                            error!("Send failed on {}: {}", session, err);
                            break Some(err.to_string());
                        }
                    }
                    Err(e) => {
                        // Continue - don't break on serialization errors
                        error!("Failed to serialize request: {}", ClientError::from(e));
                    }
                },
                None => {
                    // Transport handle dropped: the session was disposed
                    debug!("Outbound channel closed, closing {}", session);
                    let _ = ws_sender.close().await;
                    return;
                }
            },
        }
    };

    report(TransportEvent::Disconnected { reason });
    debug!("Session task ended for {}", session);
}
