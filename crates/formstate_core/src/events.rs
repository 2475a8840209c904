//! Event feed for observing persisted form mutations.
//!
//! The feed emits events after a write reaches the store, enabling:
//! - Reactive UI refreshes (reload a list after a save)
//! - Audit logging
//!
//! Events fire only for persisted writes; buffered-only edits are
//! invisible here.

use formstate_store::RecordId;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// A single event from the form-event feed.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    /// A record was saved or deleted in the given context.
    Saved {
        /// The context the write happened in; empty for the root.
        context: String,
        /// Id of the affected record, when known.
        id: Option<RecordId>,
    },
    /// A single field mutation was persisted by auto-save.
    FieldUpdated {
        /// The field path as declared in the rule catalog.
        changed: String,
        /// The context the field belongs to; empty for the root.
        context: String,
        /// Id of the record the field was written to.
        id: Option<RecordId>,
    },
}

impl FormEvent {
    /// Creates a saved event.
    pub fn saved(context: impl Into<String>, id: Option<RecordId>) -> Self {
        Self::Saved {
            context: context.into(),
            id,
        }
    }

    /// Creates a field-updated event.
    pub fn field_updated(
        changed: impl Into<String>,
        context: impl Into<String>,
        id: Option<RecordId>,
    ) -> Self {
        Self::FieldUpdated {
            changed: changed.into(),
            context: context.into(),
            id,
        }
    }
}

/// Distributes form events to subscribers.
///
/// Thread-safe; supports multiple subscribers and preserves emit order
/// per subscriber.
pub struct EventFeed {
    subscribers: RwLock<Vec<Sender<FormEvent>>>,
}

impl EventFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver for all future events. Dropping the receiver
    /// unsubscribes on the next emit.
    pub fn subscribe(&self) -> Receiver<FormEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all subscribers, pruning disconnected ones.
    pub fn emit(&self, event: FormEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new()
    }
}
