//! Request-ID decoration.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Request ID carried in request extensions for downstream logging.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Assigns a UUID to every request and echoes it as `X-Request-ID`.
pub async fn set_request_id(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("X-Request-ID", value);
    }
    response
}
