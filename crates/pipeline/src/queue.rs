//! Bounded in-memory event queue.
//!
//! Producers never block: when the queue is full the incoming event is
//! dropped and counted (tail-drop), preserving the latency expectations of
//! events already queued.

use std::sync::Arc;

use monitor_core::Event;
use parking_lot::RwLock;
use serde::Serialize;
use telemetry::{Counter, Gauge};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default queue capacity.
pub const DEFAULT_QUEUE_SIZE: usize = 100_000;

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: Counter,
    dropped: Counter,
    pending: Gauge,
}

/// Queue accounting snapshot.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub pending: u64,
}

/// Producer side of the queue. Shared by the ingest handlers.
pub struct EventQueue {
    tx: RwLock<Option<mpsc::Sender<Event>>>,
    counters: Arc<QueueCounters>,
}

/// Consumer side; owned by the single batcher.
pub struct QueueReceiver {
    rx: mpsc::Receiver<Event>,
    counters: Arc<QueueCounters>,
}

impl EventQueue {
    /// Creates a queue of the given capacity and its sole receiver.
    pub fn new(capacity: usize) -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(QueueCounters::default());

        let queue = Self {
            tx: RwLock::new(Some(tx)),
            counters: counters.clone(),
        };
        let receiver = QueueReceiver { rx, counters };
        (queue, receiver)
    }

    /// Non-blocking enqueue. A full or closed queue drops the event and
    /// bumps the `dropped` counter.
    pub fn enqueue(&self, event: Event) {
        let guard = self.tx.read();
        let Some(tx) = guard.as_ref() else {
            self.counters.dropped.inc();
            return;
        };

        match tx.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.inc();
                self.counters.pending.inc();
            }
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                self.counters.dropped.inc();
            }
        }
    }

    /// Signals EOF to the consumer. Events already queued are still
    /// delivered; idempotent.
    pub fn close(&self) {
        self.tx.write().take();
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.counters.enqueued.get(),
            dropped: self.counters.dropped.get(),
            pending: self.counters.pending.get(),
        }
    }
}

impl QueueReceiver {
    /// Awaits the next event. After [`EventQueue::close`], buffered events
    /// drain first, then `None` marks the end of the stream.
    pub async fn recv(&mut self) -> Option<Event> {
        let event = self.rx.recv().await?;
        self.counters.pending.dec();
        Some(event)
    }
}
