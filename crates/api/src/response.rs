//! Standard response envelope.
//!
//! Every non-ingest endpoint answers with
//! `{success, message, pagination?, data}`; messages are lowercased.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use monitor_core::Error;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

pub const DEFAULT_SUCCESS_MESSAGE: &str = "request was successful";

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub data: T,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "is_zero", default)]
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub previous: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

/// Success envelope without pagination.
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        success: true,
        message: DEFAULT_SUCCESS_MESSAGE.to_string(),
        pagination: None,
        data,
    })
    .into_response()
}

/// Success envelope with a total count and pagination links.
pub fn ok_with_count<T: Serialize>(
    data: T,
    count: u64,
    next: Option<String>,
    previous: Option<String>,
) -> Response {
    Json(Envelope {
        success: true,
        message: DEFAULT_SUCCESS_MESSAGE.to_string(),
        pagination: Some(Pagination {
            count,
            next,
            previous,
        }),
        data,
    })
    .into_response()
}

/// An error that renders as the failure envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized")
    }

    /// 500 with a stable message; the underlying cause goes to the log,
    /// not to the client.
    pub fn internal_with_cause(message: impl Into<String>, cause: &Error) -> Self {
        let message = message.into();
        error!(error = %cause, "{message}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.message.to_lowercase();
        warn!(status = self.status.as_u16(), "{message}");

        (
            self.status,
            Json(Envelope {
                success: false,
                message,
                pagination: None,
                data: serde_json::Value::Null,
            }),
        )
            .into_response()
    }
}

/// Maps a query-path failure: compiler rejections pass through as 400,
/// everything else becomes a 500 with `context` as the client-facing
/// message and the cause logged.
pub fn query_error(context: &'static str) -> impl FnOnce(Error) -> ApiError {
    move |err| match err {
        Error::BadRequest(_) => ApiError::from(err),
        other => ApiError::internal_with_cause(context, &other),
    }
}
