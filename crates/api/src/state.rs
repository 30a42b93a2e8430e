//! Application state shared across handlers.

use std::sync::Arc;

use clickhouse_client::StoreClient;
use pipeline::EventQueue;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Ingest queue; handlers only ever enqueue.
    pub queue: Arc<EventQueue>,
    /// Analytical store handle.
    pub store: Arc<StoreClient>,
    /// Shared secret for `X-Api-Key`; empty disables authentication.
    pub api_key: String,
}

impl AppState {
    pub fn new(queue: Arc<EventQueue>, store: Arc<StoreClient>, api_key: impl Into<String>) -> Self {
        Self {
            queue,
            store,
            api_key: api_key.into(),
        }
    }
}
