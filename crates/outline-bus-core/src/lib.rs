#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **outline-bus-core** – Core event bus abstraction for the outline engine.
//!
//! Topic = `container_id`. Subscribers receive every event published after
//! subscription, in strictly increasing `sequence` order for the container
//! they subscribed to (spec §4.6, §5). Delivery is at-least-once within a
//! subscriber's session; `sequence` is the de-dup key if needed. No ordering
//! is promised across containers.

use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use outline_types::{ContainerId, Event};
use tokio::sync::broadcast;

/// Ring buffer capacity for a single container's topic before the slowest
/// subscriber starts lagging.
const DEFAULT_TOPIC_BUFFER: usize = 1024;

/// Core event bus abstraction for publishing and subscribing to outline
/// events, one broadcast topic per container.
///
/// All implementations must be thread-safe and support multiple concurrent
/// subscribers per container.
pub trait EventBus: Send + Sync {
    /// Publish a committed event to its container's topic.
    ///
    /// This must complete quickly and not block the caller. If subscribers
    /// are slow or absent, the bus may drop the oldest buffered events to
    /// maintain responsiveness (spec §4.6 at-least-once / best-effort
    /// buffering).
    fn publish(&self, event: Event) -> Result<()>;

    /// Subscribe to a container's live event stream.
    ///
    /// Returns a receiver that observes every event published for
    /// `container_id` after this call, in sequence order.
    fn subscribe(&self, container_id: ContainerId) -> broadcast::Receiver<Event>;

    /// Current number of active subscribers for a container's topic.
    fn subscriber_count(&self, container_id: ContainerId) -> usize;
}

/// Simple in-memory, broadcast-only event bus using per-container Tokio
/// channels, created lazily on first publish or subscribe.
#[derive(Debug, Clone)]
pub struct InMemoryBus {
    topics: Arc<DashMap<ContainerId, broadcast::Sender<Event>>>,
    buffer: usize,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new(DEFAULT_TOPIC_BUFFER)
    }
}

impl InMemoryBus {
    /// Create a new bus whose per-container topics buffer up to `buffer`
    /// events for slow subscribers.
    pub fn new(buffer: usize) -> Self {
        Self { topics: Arc::new(DashMap::new()), buffer }
    }

    fn topic(&self, container_id: ContainerId) -> broadcast::Sender<Event> {
        self.topics
            .entry(container_id)
            .or_insert_with(|| broadcast::channel(self.buffer).0)
            .clone()
    }
}

impl EventBus for InMemoryBus {
    fn publish(&self, event: Event) -> Result<()> {
        let container_id = event.container_id();
        let tx = self.topic(container_id);
        // Ignore send errors from zero subscribers; the bus is fire-and-forget.
        let _ = tx.send(event);
        Ok(())
    }

    fn subscribe(&self, container_id: ContainerId) -> broadcast::Receiver<Event> {
        self.topic(container_id).subscribe()
    }

    fn subscriber_count(&self, container_id: ContainerId) -> usize {
        self.topics
            .get(&container_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

/// Wraps a `broadcast::Receiver<Event>` to filter out events whose
/// `event_id` originator matches the subscriber's own session, implementing
/// the echo-suppression convention of spec §9.
pub struct EchoFilteredReceiver {
    inner: broadcast::Receiver<Event>,
    own_originator: String,
}

/// Errors surfaced while draining an echo-filtered subscription.
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// The subscriber fell behind and missed `n` buffered events.
    #[error("lagged behind by {0} events")]
    Lagged(u64),
    /// The topic has no more senders (the bus was dropped).
    #[error("event bus closed")]
    Closed,
}

impl EchoFilteredReceiver {
    /// Wrap a raw receiver, suppressing events originated by `own_originator`.
    pub fn new(inner: broadcast::Receiver<Event>, own_originator: impl Into<String>) -> Self {
        Self { inner, own_originator: own_originator.into() }
    }

    /// Await the next non-echo event.
    pub async fn recv(&mut self) -> Result<Event, RecvError> {
        loop {
            match self.inner.recv().await {
                Ok(event) if event.event_id.is_from(&self.own_originator) => continue,
                Ok(event) => return Ok(event),
                Err(broadcast::error::RecvError::Lagged(n)) => return Err(RecvError::Lagged(n)),
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use outline_types::{EventId, EventPayload, Sequence, UserId};
    use uuid::Uuid;

    fn sample_event(container_id: ContainerId, originator: &str, seq: u64) -> Event {
        Event {
            event_id: EventId::new(Uuid::new_v4(), originator).unwrap(),
            payload: EventPayload::NodeContentChanged {
                node_id: Uuid::new_v4().into(),
                content: "hello".into(),
                container_id,
            },
            user_id: UserId::from("u1"),
            created_at: Utc::now(),
            sequence: Sequence(seq),
        }
    }

    #[tokio::test]
    async fn subscribers_see_events_for_their_container_in_order() {
        let bus = InMemoryBus::new(16);
        let c1 = ContainerId::new();
        let mut rx = bus.subscribe(c1);

        bus.publish(sample_event(c1, "s1", 1)).unwrap();
        bus.publish(sample_event(c1, "s1", 2)).unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.sequence, Sequence(1));
        assert_eq!(second.sequence, Sequence(2));
    }

    #[tokio::test]
    async fn containers_are_isolated_topics() {
        let bus = InMemoryBus::new(16);
        let c1 = ContainerId::new();
        let c2 = ContainerId::new();
        let mut rx1 = bus.subscribe(c1);
        let mut rx2 = bus.subscribe(c2);

        bus.publish(sample_event(c1, "s1", 1)).unwrap();

        let got = rx1.recv().await.unwrap();
        assert_eq!(got.container_id(), c1);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn echo_filter_suppresses_own_originator() {
        let bus = InMemoryBus::new(16);
        let c1 = ContainerId::new();
        let raw = bus.subscribe(c1);
        let mut filtered = EchoFilteredReceiver::new(raw, "session-a");

        bus.publish(sample_event(c1, "session-a", 1)).unwrap();
        bus.publish(sample_event(c1, "session-b", 2)).unwrap();

        let received = filtered.recv().await.unwrap();
        assert_eq!(received.sequence, Sequence(2));
    }

    #[tokio::test]
    async fn subscriber_count_tracks_active_subscriptions() {
        let bus = InMemoryBus::new(16);
        let c1 = ContainerId::new();
        assert_eq!(bus.subscriber_count(c1), 0);
        let _rx1 = bus.subscribe(c1);
        let _rx2 = bus.subscribe(c1);
        assert_eq!(bus.subscriber_count(c1), 2);
    }
}
