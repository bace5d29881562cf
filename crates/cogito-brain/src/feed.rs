//! Change feed: every state update and record insert is broadcast to
//! subscribers (the SSE endpoint holds one `Receiver` per client).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use cogito_types::{ChangeEvent, ChangeKind};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Cheap to clone; clones share the channel and the sequence counter.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
    seq: Arc<AtomicU64>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event. Dropped when nobody is subscribed.
    pub fn publish(&self, kind: ChangeKind, record_id: Option<Uuid>) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let event = ChangeEvent {
            seq,
            kind,
            record_id,
            timestamp: Utc::now(),
        };
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Sequence number the next event will carry.
    pub fn next_seq(&self) -> u64 {
        self.seq.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
