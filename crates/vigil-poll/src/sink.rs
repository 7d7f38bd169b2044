//! Event Fan-out Contract (C7): the `Publish(Event)` callback.

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use vigil_core::Event;

/// The scheduler is the sole producer; implementations hand events to
/// whatever external transport exists (SSE broadcaster, test collector).
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: Event);
}

/// Fans events out to every subscriber, grounded on the teacher's
/// `broadcast::Sender` terminal-output pattern. Lagging subscribers miss
/// events rather than back-pressuring the scheduler.
pub struct BroadcastEventSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<Event>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn publish(&self, event: Event) {
        // No subscribers is not an error; the event is simply dropped.
        let _ = self.tx.send(event);
    }
}

/// In-memory collector used by tests to assert on emitted events without
/// standing up a transport.
#[derive(Default)]
pub struct CollectorEventSink {
    events: Mutex<Vec<Event>>,
}

impl CollectorEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for CollectorEventSink {
    async fn publish(&self, event: Event) {
        self.events.lock().await.push(event);
    }
}
