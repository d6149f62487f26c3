//! Change notifications
//!
//! Every successful commit or delete publishes a [`ChangeEvent`]. Subscribers
//! are either bounded channels ([`Subscription`]) or handler callbacks.
//! Publishing never blocks and never fails: a full channel drops the event,
//! a disconnected one is pruned, and a failing handler is logged. None of
//! these reach the committer.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::id::StableId;

/// What happened to a definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A committed change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub id: StableId,
    pub kind: ChangeKind,
    /// Top-level fields whose committed value changed, sorted
    pub changed_fields: Vec<String>,
    /// Revision after the change; for deletes, the last revision
    pub revision: u64,
    pub at: DateTime<Utc>,
}

/// Error a handler may return; logged and counted, never propagated
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Arc<dyn Fn(&ChangeEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Handle for removing a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

#[derive(Clone)]
enum Sink {
    Channel(Sender<ChangeEvent>),
    Handler(Handler),
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriberId,
    sink: Sink,
}

/// Publish/subscribe hub for change events
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    capacity: usize,
    next_id: AtomicU64,

    // Stats (atomic, no locks)
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    handler_failures: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

impl EventBus {
    /// Create a bus whose channel subscribers buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribe with a bounded channel
    ///
    /// Dropping the subscription unsubscribes it on the next publish.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = bounded(self.capacity);
        let id = self.next_id();
        self.subscribers.write().push(Subscriber {
            id,
            sink: Sink::Channel(sender),
        });
        Subscription { id, receiver }
    }

    /// Subscribe with a callback run synchronously on publish
    pub fn on_change<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&ChangeEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.subscribers.write().push(Subscriber {
            id,
            sink: Sink::Handler(Arc::new(handler)),
        });
        id
    }

    /// Remove a subscriber; false if it was already gone
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver an event to every subscriber - never blocks, never fails
    pub fn publish(&self, event: ChangeEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);

        // Dispatch outside the lock so handlers may subscribe or unsubscribe.
        let subscribers = self.subscribers.read().clone();
        let mut disconnected = Vec::new();

        for subscriber in &subscribers {
            match &subscriber.sink {
                Sink::Channel(sender) => match sender.try_send(event.clone()) {
                    Ok(()) => {
                        self.delivered.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!(id = %event.id, subscriber = subscriber.id.0, "subscriber full, event dropped");
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        disconnected.push(subscriber.id);
                    }
                },
                Sink::Handler(handler) => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
                    match outcome {
                        Ok(Ok(())) => {
                            self.delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(e)) => {
                            self.handler_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(id = %event.id, subscriber = subscriber.id.0, error = %e, "change handler failed");
                        }
                        Err(_) => {
                            self.handler_failures.fetch_add(1, Ordering::Relaxed);
                            warn!(id = %event.id, subscriber = subscriber.id.0, "change handler panicked");
                        }
                    }
                }
            }
        }

        if !disconnected.is_empty() {
            self.subscribers
                .write()
                .retain(|s| !disconnected.contains(&s.id));
            trace!(pruned = disconnected.len(), "disconnected subscribers removed");
        }
        trace!(id = %event.id, kind = ?event.kind, "change published");
    }

    /// Current delivery counters
    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Events handed to `publish`
    pub published: u64,
    /// Successful deliveries, counted per subscriber
    pub delivered: u64,
    /// Deliveries skipped because a channel was full
    pub dropped: u64,
    /// Handlers that returned an error or panicked
    pub handler_failures: u64,
}

/// Channel end of a subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, without blocking
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// All buffered events
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Underlying receiver, for `select!` loops
    pub fn receiver(&self) -> &Receiver<ChangeEvent> {
        &self.receiver
    }
}
