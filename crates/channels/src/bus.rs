//! Process-local publish/subscribe bus for connection events.
//!
//! Delivery is synchronous and in registration order per topic. `publish`
//! snapshots the subscriber list before invoking anyone, so a subscriber
//! added while a topic is being delivered is first called on the next
//! publish of that topic. A subscription released mid-round is skipped for
//! the rest of the round.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use tracing::{debug, trace};

#[cfg(feature = "metrics")]
use chatmux_metrics::{bus as bus_metrics, counter, gauge, labels};

use crate::{Credential, transport::TransportEvent};

// ── Topics ──────────────────────────────────────────────────────────────────

/// Event kinds published by connection handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Connecting,
    Authenticated,
    ConnectionOpened,
    Disconnect,
    Message,
    UnableToStart,
}

impl Topic {
    pub const ALL: &'static [Topic] = &[
        Self::Connecting,
        Self::Authenticated,
        Self::ConnectionOpened,
        Self::Disconnect,
        Self::Message,
        Self::UnableToStart,
    ];

    /// Wire name of the topic.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "client.connecting",
            Self::Authenticated => "client.authenticated",
            Self::ConnectionOpened => "client.connectionOpened",
            Self::Disconnect => "client.disconnect",
            Self::Message => "client.message",
            Self::UnableToStart => "client.unableToStart",
        }
    }

    pub fn of(event: &TransportEvent) -> Self {
        match event {
            TransportEvent::Connecting => Self::Connecting,
            TransportEvent::Authenticated(_) => Self::Authenticated,
            TransportEvent::ConnectionOpened => Self::ConnectionOpened,
            TransportEvent::Disconnect { .. } => Self::Disconnect,
            TransportEvent::Message(_) => Self::Message,
            TransportEvent::UnableToStart { .. } => Self::UnableToStart,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport event tagged with the connection it came from.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub credential: Credential,
    pub event: TransportEvent,
}

impl BusEvent {
    pub fn new(credential: Credential, event: TransportEvent) -> Self {
        Self { credential, event }
    }

    pub fn topic(&self) -> Topic {
        Topic::of(&self.event)
    }
}

/// Which connections a subscriber wants to hear from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Credential(Credential),
}

impl Scope {
    fn matches(&self, credential: &Credential) -> bool {
        match self {
            Self::All => true,
            Self::Credential(c) => c == credential,
        }
    }
}

// ── Bus ─────────────────────────────────────────────────────────────────────

type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

struct SubscriberEntry {
    id: u64,
    scope: Scope,
    handler: Handler,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct BusInner {
    topics: Mutex<HashMap<Topic, Vec<Arc<SubscriberEntry>>>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl BusInner {
    fn remove(&self, topic: Topic, id: u64) -> bool {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = topics.get_mut(&topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            topics.remove(&topic);
        }
        #[cfg(feature = "metrics")]
        if removed {
            gauge!(bus_metrics::SUBSCRIPTIONS).decrement(1.0);
        }
        removed
    }
}

/// Topic-based event bus. Cheap to clone; clones share subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`, limited to events from `scope`.
    ///
    /// The returned [`Subscription`] must be kept for as long as the handler
    /// should run; releasing or dropping it unsubscribes.
    pub fn subscribe<F>(&self, topic: Topic, scope: Scope, handler: F) -> Subscription
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        let entry = Arc::new(SubscriberEntry {
            id,
            scope,
            handler: Arc::new(handler),
            active: Arc::clone(&active),
        });
        {
            let mut topics = self.inner.topics.lock().unwrap_or_else(|e| e.into_inner());
            topics.entry(topic).or_default().push(entry);
        }
        #[cfg(feature = "metrics")]
        gauge!(bus_metrics::SUBSCRIPTIONS).increment(1.0);
        trace!(topic = %topic, id, "bus subscription added");

        Subscription {
            topic,
            id,
            bus: Arc::downgrade(&self.inner),
            active,
        }
    }

    /// Deliver `event` to every matching subscriber of its topic.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish(&self, event: BusEvent) -> usize {
        let topic = event.topic();
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        counter!(bus_metrics::EVENTS_PUBLISHED_TOTAL, labels::TOPIC => topic.as_str())
            .increment(1);

        let snapshot: Vec<Arc<SubscriberEntry>> = {
            let topics = self.inner.topics.lock().unwrap_or_else(|e| e.into_inner());
            topics.get(&topic).cloned().unwrap_or_default()
        };

        let mut delivered = 0;
        for entry in &snapshot {
            if !entry.active.load(Ordering::Acquire) || !entry.scope.matches(&event.credential) {
                continue;
            }
            (entry.handler)(&event);
            delivered += 1;
        }

        debug!(
            topic = %topic,
            credential = %event.credential,
            receivers = delivered,
            "bus event published"
        );
        delivered
    }

    /// Number of live subscriptions on `topic`, regardless of scope.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        let topics = self.inner.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.get(&topic).map_or(0, Vec::len)
    }

    /// Number of live subscriptions across all topics.
    pub fn total_subscribers(&self) -> usize {
        let topics = self.inner.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.values().map(Vec::len).sum()
    }

    /// Total events published since the bus was created.
    pub fn events_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.total_subscribers())
            .field("events_published", &self.events_published())
            .finish()
    }
}

// ── Subscription ────────────────────────────────────────────────────────────

/// Token for one registered handler. Owned by whoever subscribed.
#[must_use = "dropping a subscription unsubscribes its handler"]
pub struct Subscription {
    topic: Topic,
    id: u64,
    bus: Weak<BusInner>,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// False once released, or when the bus itself is gone.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.bus.strong_count() > 0
    }

    /// Remove the handler. It is not invoked again, including for the rest
    /// of a publish round that is currently running.
    ///
    /// Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        self.release()
    }

    fn release(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let removed = self
            .bus
            .upgrade()
            .is_some_and(|bus| bus.remove(self.topic, self.id));
        trace!(topic = %self.topic, id = self.id, removed, "bus subscription released");
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
