//! Ingestion pipeline: bounded queue and background batcher.

pub mod batcher;
pub mod queue;

pub use batcher::{Batcher, BatcherConfig, EventSink};
pub use queue::{EventQueue, QueueReceiver, QueueStats, DEFAULT_QUEUE_SIZE};
