//! In-memory event bus.
//!
//! MemoryEventBus stores events in a Vec for replay and uses a broadcast
//! channel for live subscribers.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use pathwise_core::events::RuntimeEvent;
use pathwise_core::traits::EventPublisher;

/// Monotonic sequence number assigned to each published event.
pub type EventSeq = u64;

pub struct MemoryEventBus {
    events: RwLock<Vec<(EventSeq, RuntimeEvent)>>,
    next_seq: AtomicU64,
    tx: broadcast::Sender<(EventSeq, RuntimeEvent)>,
}

impl MemoryEventBus {
    /// Create a bus whose broadcast channel buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            events: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(EventSeq, RuntimeEvent)> {
        self.tx.subscribe()
    }

    /// Stored events with a sequence number of at least `seq`.
    pub async fn events_from(&self, seq: EventSeq) -> Vec<(EventSeq, RuntimeEvent)> {
        self.events
            .read()
            .await
            .iter()
            .filter(|(s, _)| *s >= seq)
            .cloned()
            .collect()
    }

    pub async fn events_for_student(&self, student_id: Uuid) -> Vec<RuntimeEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|(_, e)| e.student_id() == student_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn current_seq(&self) -> EventSeq {
        self.next_seq.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for MemoryEventBus {
    async fn publish(&self, event: RuntimeEvent) -> Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.events.write().await.push((seq, event.clone()));

        // No receivers is fine.
        let _ = self.tx.send((seq, event));
        Ok(())
    }
}
