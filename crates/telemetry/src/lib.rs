//! Telemetry: tracing initialization and metric primitives.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::{Counter, Gauge};
pub use tracing_setup::init_tracing_from_env;
