//! Topic subscription callbacks.
//!
//! Handlers persist for the life of the session and are replayed by
//! `resubscribe` after a reconnect. Dispatch snapshots the matching
//! handlers and runs each callback in a detached task so a slow callback
//! cannot stall the receive loop.

use crate::topic_matching::topic_matches_filter;
use crate::types::{Message, QoS};
use parking_lot::RwLock;
use std::sync::Arc;

/// Callback invoked with each message delivered to a subscription.
pub type MessageCallback = Arc<dyn Fn(Message) + Send + Sync>;

#[derive(Clone)]
struct TopicHandler {
    filter: String,
    granted_qos: QoS,
    callback: MessageCallback,
}

/// The persisted set of topic handlers.
#[derive(Default)]
pub struct CallbackManager {
    handlers: RwLock<Vec<TopicHandler>>,
}

impl CallbackManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a handler with the QoS the broker granted at SUBACK.
    pub fn register(&self, filter: impl Into<String>, granted_qos: QoS, callback: MessageCallback) {
        self.handlers.write().push(TopicHandler {
            filter: filter.into(),
            granted_qos,
            callback,
        });
    }

    /// Removes every handler whose filter equals `filter` exactly. Two
    /// subscriptions to the same filter share fate. Returns whether any
    /// handler was removed.
    pub fn unregister(&self, filter: &str) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|handler| handler.filter != filter);
        handlers.len() < before
    }

    /// Records the QoS granted by the most recent SUBACK for `filter`.
    pub fn set_granted_qos(&self, filter: &str, granted_qos: QoS) {
        for handler in self.handlers.write().iter_mut() {
            if handler.filter == filter {
                handler.granted_qos = granted_qos;
            }
        }
    }

    /// The persisted (filter, granted QoS) pairs, for resubscription.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.handlers
            .read()
            .iter()
            .map(|handler| (handler.filter.clone(), handler.granted_qos))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }

    /// Fans a message out to every handler whose filter matches its topic.
    pub fn dispatch(&self, message: &Message) {
        let matching: Vec<MessageCallback> = self
            .handlers
            .read()
            .iter()
            .filter(|handler| topic_matches_filter(&message.topic, &handler.filter))
            .map(|handler| Arc::clone(&handler.callback))
            .collect();

        for callback in matching {
            let message = message.clone();
            tokio::spawn(async move {
                callback(message);
            });
        }
    }
}
