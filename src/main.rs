//! Monitor event pipeline
//!
//! Ingests monitoring events over HTTP, hands them to ClickHouse in
//! batches, and serves the query/analytics surfaces for dashboards.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use api::{router, AppState};
use clickhouse_client::{init_schema, StoreClient, StoreConfig};
use pipeline::{Batcher, BatcherConfig, EventQueue};
use telemetry::init_tracing_from_env;

/// How long shutdown waits for the batcher to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_http_port")]
    http_port: u16,

    /// Shared secret for request auth; empty disables the check.
    #[serde(default)]
    api_key: String,

    #[serde(default = "default_batch_size")]
    batch_size: usize,

    #[serde(default = "default_flush_interval_secs")]
    flush_interval_secs: u64,

    #[serde(default = "default_queue_size")]
    queue_size: usize,

    #[serde(default)]
    clickhouse: StoreConfig,
}

fn default_http_port() -> u16 {
    8080
}

fn default_batch_size() -> usize {
    1000
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_queue_size() -> usize {
    100_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            api_key: String::new(),
            batch_size: default_batch_size(),
            flush_interval_secs: default_flush_interval_secs(),
            queue_size: default_queue_size(),
            clickhouse: StoreConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("starting monitor v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    // Connect to ClickHouse; retry with backoff happens inside.
    let store = Arc::new(
        StoreClient::connect(&config.clickhouse)
            .await
            .context("failed to connect to clickhouse")?,
    );

    if let Err(e) = init_schema(&store).await {
        // The table usually already exists; keep starting.
        error!("failed to initialize schema: {e}");
    }

    let (queue, receiver) = EventQueue::new(config.queue_size);
    let queue = Arc::new(queue);

    let batcher = Batcher::new(
        store.clone(),
        BatcherConfig {
            batch_size: config.batch_size,
            flush_interval: Duration::from_secs(config.flush_interval_secs),
            ..Default::default()
        },
    );
    let batcher_handle = batcher.spawn(receiver);

    let state = AppState::new(queue.clone(), store.clone(), config.api_key.clone());
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port)
        .parse()
        .context("invalid listen address")?;

    info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    // The server stops before the queue closes, so no enqueues can race
    // the drain.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("shutting down");

    queue.close();
    match tokio::time::timeout(DRAIN_TIMEOUT, batcher_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("batcher task failed: {e}"),
        Err(_) => error!("batcher did not drain within {DRAIN_TIMEOUT:?}"),
    }

    info!("shutdown complete");
    Ok(())
}

/// Load configuration from defaults and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(config::Environment::default().try_parsing(true))
        .build()
        .context("failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    // Flat variable names for the nested store block.
    if let Ok(addr) = std::env::var("CLICKHOUSE_ADDR") {
        config.clickhouse.addr = addr;
    }
    if let Ok(database) = std::env::var("CLICKHOUSE_DATABASE") {
        config.clickhouse.database = database;
    }
    if let Ok(username) = std::env::var("CLICKHOUSE_USERNAME") {
        config.clickhouse.username = username;
    }
    if let Ok(password) = std::env::var("CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = password;
    }

    // FLUSH_INTERVAL accepts "5" or "5s".
    if let Ok(raw) = std::env::var("FLUSH_INTERVAL") {
        if let Some(secs) = parse_flush_interval(&raw) {
            config.flush_interval_secs = secs;
        }
    }

    Ok(config)
}

fn parse_flush_interval(raw: &str) -> Option<u64> {
    raw.trim().trim_end_matches('s').parse().ok()
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received ctrl+c");
        }
        _ = terminate => {
            info!("received terminate signal");
        }
    }
}
