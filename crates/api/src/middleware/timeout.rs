//! JSON body for requests cut off by the timeout layer.
//!
//! `TimeoutLayer` answers with an empty 408. Layered just outside it,
//! [`timeout_detail`] gives that response the usual `{"detail": ...}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const REQUEST_TIMED_OUT: &str = "Request timed out";

/// Used with `axum::middleware::map_response`.
pub async fn timeout_detail(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }

    tracing::warn!("Request timed out");
    (
        StatusCode::REQUEST_TIMEOUT,
        Json(json!({ "detail": REQUEST_TIMED_OUT })),
    )
        .into_response()
}
