//! Internal-error diagnostics.
//!
//! Every 500 response carries an [`ErrorDiagnostics`] extension. Outside
//! production the body becomes
//! `{"detail": {"title": ..., "description": ..., "traceback": ...}}`; in
//! production the generic `{"detail": "Internal Server Error"}` is kept.

use std::any::Any;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::{ErrorDiagnostics, INTERNAL_SERVER_ERROR};
use crate::state::AppState;

pub async fn expose_error_diagnostics(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if state.config.production {
        return response;
    }

    match response.extensions().get::<ErrorDiagnostics>().cloned() {
        Some(diagnostics) => {
            (response.status(), Json(json!({ "detail": diagnostics }))).into_response()
        }
        None => response,
    }
}

/// Response for a panicking handler, used with `CatchPanicLayer::custom`.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!(panic = %message, "Handler panicked");

    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": INTERNAL_SERVER_ERROR })),
    )
        .into_response();
    response.extensions_mut().insert(ErrorDiagnostics {
        title: "Panic".to_string(),
        description: message.clone(),
        traceback: message,
    });
    response
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use ptt_db::MemoryOda;
    use tower::ServiceExt;
    use tower_http::catch_panic::CatchPanicLayer;

    use super::*;
    use crate::config::ServerConfig;
    use crate::error::AppError;

    async fn failing() -> Result<(), AppError> {
        Err(AppError::InternalError("unit of work lost".into()))
    }

    async fn panicking() -> &'static str {
        panic!("boom")
    }

    fn app(production: bool) -> Router {
        let state = AppState {
            oda: Arc::new(MemoryOda::new()),
            config: Arc::new(ServerConfig {
                production,
                ..ServerConfig::default()
            }),
        };
        Router::new()
            .route("/fail", get(failing))
            .route("/panic", get(panicking))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(from_fn_with_state(state.clone(), expose_error_diagnostics))
            .with_state(state)
    }

    async fn call(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn exposes_diagnostics_outside_production() {
        let (status, json) = call(app(false), "/fail").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["detail"]["title"], "InternalError");
        assert!(json["detail"]["traceback"]
            .as_str()
            .unwrap()
            .contains("unit of work lost"));
    }

    #[tokio::test]
    async fn keeps_generic_body_in_production() {
        let (status, json) = call(app(true), "/fail").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["detail"], INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn panics_become_diagnosed_500s() {
        let (status, json) = call(app(false), "/panic").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["detail"]["title"], "Panic");
        assert_eq!(json["detail"]["description"], "boom");
    }
}
