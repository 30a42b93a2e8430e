//! Background batcher: the queue's sole consumer.
//!
//! Collects events into a buffer and flushes on size, on a timer, or on
//! shutdown. A failed flush is logged and discarded; ingestion has already
//! been acknowledged and the store is the system of record.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clickhouse_client::{insert_events, StoreClient};
use monitor_core::{Event, Result};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::queue::QueueReceiver;

/// Destination for flushed batches. A trait seam so the batcher can be
/// exercised without a live store.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn write_batch(&self, events: &[Event]) -> Result<usize>;
}

#[async_trait]
impl EventSink for StoreClient {
    async fn write_batch(&self, events: &[Event]) -> Result<usize> {
        insert_events(self, events).await
    }
}

/// Batcher configuration.
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Flush as soon as the buffer reaches this size.
    pub batch_size: usize,
    /// Flush a non-empty buffer at least this often.
    pub flush_interval: Duration,
    /// Deadline for one flush; independent of any request context.
    pub flush_timeout: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            flush_interval: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(30),
        }
    }
}

/// Single background consumer of an [`crate::queue::EventQueue`].
pub struct Batcher {
    sink: Arc<dyn EventSink>,
    config: BatcherConfig,
}

impl Batcher {
    pub fn new(sink: Arc<dyn EventSink>, config: BatcherConfig) -> Self {
        Self { sink, config }
    }

    /// Spawns the consumer loop. Exactly one batcher runs per queue.
    pub fn spawn(self, receiver: QueueReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(receiver))
    }

    async fn run(self, mut receiver: QueueReceiver) {
        let mut ticker = tokio::time::interval(self.config.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buffer: Vec<Event> = Vec::with_capacity(self.config.batch_size);

        loop {
            tokio::select! {
                maybe = receiver.recv() => match maybe {
                    Some(event) => {
                        buffer.push(event);
                        if buffer.len() >= self.config.batch_size {
                            self.flush(&mut buffer).await;
                        }
                    }
                    // Queue closed: everything buffered upstream has been
                    // drained into us already.
                    None => break,
                },
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer).await;
                    }
                }
            }
        }

        self.flush(&mut buffer).await;
        info!("batcher stopped");
    }

    async fn flush(&self, buffer: &mut Vec<Event>) {
        if buffer.is_empty() {
            return;
        }
        let batch = std::mem::take(buffer);

        match tokio::time::timeout(self.config.flush_timeout, self.sink.write_batch(&batch)).await
        {
            Ok(Ok(count)) => info!(count, "flushed events"),
            Ok(Err(e)) => {
                error!(count = batch.len(), error = %e, "flush failed, dropping batch");
            }
            Err(_) => {
                error!(count = batch.len(), "flush timed out, dropping batch");
            }
        }
    }
}
