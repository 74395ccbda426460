#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use ptt_core::entity::{EntityDocument, EntityKind, Metadata};
use ptt_core::history::StatusRecord;
use ptt_db::MemoryOda;
use serde_json::{json, Value};
use tower::ServiceExt;

use ptt_api::config::{OdaBackendType, ServerConfig};
use ptt_api::router::build_app_router;
use ptt_api::state::AppState;

/// Prefix every API route is nested under in tests.
pub const PREFIX: &str = "/ska-oso-ptt-services/ptt/api/v1";

/// Build a test `ServerConfig` backed by the in-memory ODA.
///
/// Uses `http://localhost:3000` as the only CORS origin so preflight
/// behaviour is deterministic.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        kube_namespace: "ska-oso-ptt-services".to_string(),
        api_major_version: "1".to_string(),
        production: false,
        oda_backend: OdaBackendType::Memory,
        database_url: String::new(),
        db_max_connections: 1,
        oda_data_dir: None,
    }
}

/// Build the full application router over `oda`, with the same middleware
/// stack production uses.
pub fn build_test_app(oda: MemoryOda) -> Router {
    build_test_app_with(oda, test_config())
}

pub fn build_test_app_with(oda: MemoryOda, config: ServerConfig) -> Router {
    let state = AppState {
        oda: Arc::new(oda),
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// `2024-03-{day} 12:00:00 UTC`.
pub fn day(day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

/// An entity document of `kind` with the given id, version and audit data.
pub fn document(
    kind: EntityKind,
    id: &str,
    version: i32,
    created_by: &str,
    created_day: u32,
) -> EntityDocument {
    let mut body = json!({
        "telescope": "ska_mid",
        "metadata": {
            "version": version,
            "created_by": created_by,
            "created_on": day(created_day),
            "last_modified_by": created_by,
            "last_modified_on": day(created_day),
        },
    });
    body[kind.id_field()] = json!(id);
    EntityDocument::from_json(kind, body).unwrap()
}

/// A status row for `id` at `version`, recorded on `recorded_day`.
pub fn status(
    kind: EntityKind,
    id: &str,
    version: i32,
    previous: &str,
    current: &str,
    recorded_day: u32,
) -> StatusRecord {
    StatusRecord {
        kind,
        entity_ref: id.to_string(),
        entity_version: version,
        previous_status: previous.to_string(),
        current_status: current.to_string(),
        metadata: Metadata::created("DefaultUser", day(recorded_day)),
    }
}

/// Two SBDs with status history:
///
/// - `sbd-mvp01-20220923-00001`: versions 1 and 2 by `DefaultUser`, created
///   on days 1 and 2, status `Draft` then `Ready` on version 2.
/// - `sbd-mvp01-20220923-00002`: version 1 by `Alice`, created on day 5,
///   status `Draft`.
pub async fn seeded_sbds() -> MemoryOda {
    let oda = MemoryOda::new();
    let kind = EntityKind::Sbd;

    oda.insert_entity(document(kind, "sbd-mvp01-20220923-00001", 1, "DefaultUser", 1))
        .await;
    oda.insert_entity(document(kind, "sbd-mvp01-20220923-00001", 2, "DefaultUser", 2))
        .await;
    oda.insert_entity(document(kind, "sbd-mvp01-20220923-00002", 1, "Alice", 5))
        .await;

    oda.insert_status(status(kind, "sbd-mvp01-20220923-00001", 1, "Draft", "Draft", 1))
        .await;
    oda.insert_status(status(kind, "sbd-mvp01-20220923-00001", 2, "Draft", "Draft", 2))
        .await;
    oda.insert_status(status(kind, "sbd-mvp01-20220923-00001", 2, "Draft", "Ready", 3))
        .await;
    oda.insert_status(status(kind, "sbd-mvp01-20220923-00002", 1, "Draft", "Draft", 5))
        .await;

    oda
}

/// Send a GET request to the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a PUT request with a JSON body.
pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    put_raw(app, uri, body.to_string()).await
}

/// Send a PUT request with an arbitrary `application/json` body.
pub async fn put_raw(app: Router, uri: &str, body: impl Into<Body>) -> Response<Body> {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
