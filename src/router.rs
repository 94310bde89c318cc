//! Inbound event routing
//!
//! A dispatch table from event name to a typed handler. Each route decodes
//! the frame's `data` into the payload type its handler expects before the
//! handler runs, so handlers only ever see validated payloads.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ProtocolError;
use crate::message::RawEvent;

type Route<C> = Box<dyn Fn(&mut C, serde_json::Value) -> Result<(), serde_json::Error> + Send + Sync>;

/// Outcome of dispatching one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A route decoded the payload and ran its handler
    Handled,
    /// No route for this event name; the frame was dropped
    Unknown,
}

/// Event name → (payload decoder + handler) table over a context `C`
///
/// Frames are handled one at a time in the order `dispatch` is called.
pub struct EventRouter<C> {
    routes: HashMap<&'static str, Route<C>>,
}

impl<C: 'static> EventRouter<C> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a handler for `event`, decoding its payload as `P`
    pub fn on<P, F>(mut self, event: &'static str, handler: F) -> Self
    where
        P: DeserializeOwned + 'static,
        F: Fn(&mut C, P) + Send + Sync + 'static,
    {
        let route: Route<C> = Box::new(move |ctx: &mut C, data: serde_json::Value| {
            let payload = serde_json::from_value::<P>(data)?;
            handler(ctx, payload);
            Ok(())
        });
        self.routes.insert(event, route);
        self
    }

    /// Route one frame to its handler
    ///
    /// Unknown events are dropped. A payload that fails to decode is
    /// reported as a `ProtocolError` and the handler does not run.
    pub fn dispatch(&self, ctx: &mut C, raw: RawEvent) -> Result<Dispatched, ProtocolError> {
        let Some(route) = self.routes.get(raw.name.as_str()) else {
            debug!("Dropping unknown event '{}'", raw.name);
            return Ok(Dispatched::Unknown);
        };

        route(ctx, raw.data).map_err(|source| ProtocolError {
            event: raw.name,
            source,
        })?;

        Ok(Dispatched::Handled)
    }
}

impl<C: 'static> Default for EventRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for EventRouter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut events: Vec<_> = self.routes.keys().collect();
        events.sort();
        f.debug_struct("EventRouter").field("events", &events).finish()
    }
}
