//! Unified error type for the monitor services.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("store error: {0}")]
    Store(String),

    #[error("failed to connect to clickhouse after {attempts} attempts: {message}")]
    ConnectExhausted { attempts: u32, message: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status this error surfaces as.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::PayloadTooLarge => 413,
            Self::Store(_) | Self::Internal(_) => 500,
            // Startup-only; never reaches an HTTP response.
            Self::ConnectExhausted { .. } => 500,
        }
    }
}
