//! ClickHouse client wrapper with a retrying connect protocol.

use std::time::Duration;

use clickhouse::{Client, Compression};
use monitor_core::{Error, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::sql::{CompiledQuery, SqlValue};

/// Upper bound on the linear backoff between connection attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Handle to the analytical store.
#[derive(Clone)]
pub struct StoreClient {
    inner: Client,
    database: String,
}

impl StoreClient {
    /// Builds a client without touching the network. Used by [`connect`]
    /// and by tests that never reach the store.
    pub fn new(config: &StoreConfig) -> Self {
        let inner = Client::default()
            .with_url(config.url())
            .with_database(&config.database)
            .with_user(&config.username)
            .with_password(&config.password)
            .with_compression(Compression::Lz4)
            .with_option("max_execution_time", &config.max_execution_secs.to_string());

        Self {
            inner,
            database: config.database.clone(),
        }
    }

    /// Connects with up to `connect_attempts` liveness pings, sleeping
    /// `attempt x 1s` (capped) between tries.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = Self::new(config);

        let mut last_error = String::new();
        for attempt in 1..=config.connect_attempts {
            match client.ping().await {
                Ok(()) => {
                    info!(addr = %config.url(), database = %config.database, "connected to clickhouse");
                    return Ok(client);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(attempt, error = %last_error, "failed to ping clickhouse");
                    let backoff = Duration::from_secs(u64::from(attempt)).min(MAX_BACKOFF);
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        Err(Error::ConnectExhausted {
            attempts: config.connect_attempts,
            message: last_error,
        })
    }

    /// Liveness check.
    pub async fn ping(&self) -> Result<()> {
        self.inner
            .query("SELECT 1")
            .fetch_one::<u8>()
            .await
            .map(|_| ())
            .map_err(|e| Error::store(e.to_string()))
    }

    /// Returns the inner clickhouse client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// The configured database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Fully qualified events table.
    pub fn events_table(&self) -> String {
        format!("{}.events", self.database)
    }

    /// Runs a compiled query expecting exactly one row.
    pub async fn fetch_one<T>(&self, query: &CompiledQuery) -> Result<T>
    where
        T: clickhouse::Row + for<'b> Deserialize<'b>,
    {
        self.bound(query)
            .fetch_one::<T>()
            .await
            .map_err(|e| Error::store(e.to_string()))
    }

    /// Runs a compiled query returning all rows.
    pub async fn fetch_all<T>(&self, query: &CompiledQuery) -> Result<Vec<T>>
    where
        T: clickhouse::Row + for<'b> Deserialize<'b>,
    {
        self.bound(query)
            .fetch_all::<T>()
            .await
            .map_err(|e| Error::store(e.to_string()))
    }

    fn bound(&self, query: &CompiledQuery) -> clickhouse::query::Query {
        let mut q = self.inner.query(&query.sql);
        for arg in &query.args {
            q = match arg {
                SqlValue::Str(v) => q.bind(v.as_str()),
                SqlValue::I64(v) => q.bind(*v),
                SqlValue::U64(v) => q.bind(*v),
                SqlValue::F64(v) => q.bind(*v),
            };
        }
        q
    }
}
