//! Store client configuration.

use serde::{Deserialize, Serialize};

/// ClickHouse client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// HTTP interface address, `host:port` or a full URL.
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Database name.
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Per-statement execution-time ceiling in seconds.
    #[serde(default = "default_max_execution_secs")]
    pub max_execution_secs: u64,
    /// Connection attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_addr() -> String {
    "localhost:8123".to_string()
}

fn default_database() -> String {
    "monitor".to_string()
}

fn default_username() -> String {
    "default".to_string()
}

fn default_max_execution_secs() -> u64 {
    60
}

fn default_connect_attempts() -> u32 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            database: default_database(),
            username: default_username(),
            password: String::new(),
            max_execution_secs: default_max_execution_secs(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

impl StoreConfig {
    /// The address as a URL; a bare `host:port` gets an `http://` scheme.
    pub fn url(&self) -> String {
        if self.addr.starts_with("http://") || self.addr.starts_with("https://") {
            self.addr.clone()
        } else {
            format!("http://{}", self.addr)
        }
    }
}
