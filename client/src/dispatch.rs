//! Handler table for inbound events, keyed by event name

use serde_json::Value;
use std::collections::HashMap;

/// Handlers take the session context by `&mut` at call time, so the table
/// itself can live inside that context.
pub type Handler<C> = fn(&mut C, Value, u64) -> Result<(), serde_json::Error>;

pub struct Dispatcher<C> {
    handlers: HashMap<&'static str, Handler<C>>,
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn on(&mut self, event: &'static str, handler: Handler<C>) -> &mut Self {
        self.handlers.insert(event, handler);
        self
    }

    /// `None` for events nobody registered for
    pub fn handler(&self, event: &str) -> Option<Handler<C>> {
        self.handlers.get(event).copied()
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}
