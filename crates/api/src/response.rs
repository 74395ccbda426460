//! Shared response envelope for API handlers.
//!
//! Every successful entity and status response is wrapped in
//! [`ApiResponse`]. Use it instead of ad-hoc `serde_json::json!` bodies.

use axum::http::StatusCode;
use serde::Serialize;

pub const RESULT_STATUS_SUCCESS: &str = "success";

/// Standard `{ "result_data": [...], "result_status": ..., "result_code": ... }`
/// envelope. `result_data` is always a list; single items are wrapped.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub result_data: Vec<T>,
    pub result_status: &'static str,
    pub result_code: u16,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(result_data: Vec<T>) -> Self {
        Self {
            result_data,
            result_status: RESULT_STATUS_SUCCESS,
            result_code: StatusCode::OK.as_u16(),
        }
    }

    pub fn single(item: T) -> Self {
        Self::success(vec![item])
    }
}
