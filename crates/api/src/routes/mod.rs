pub mod entity;
pub mod health;
pub mod status;

use axum::Router;
use ptt_core::entity::{Eb, Prj, Sbd, Sbi};

use crate::state::AppState;

/// Build the route tree nested under the API prefix
/// (`/{KUBE_NAMESPACE}/ptt/api/v{MAJOR}`).
///
/// Route hierarchy:
///
/// ```text
/// /sbds                                list with status
/// /sbds/{id}                           get with status, update
/// /sbds/{id}/status                    current status, record status
/// /sbds/status/history                 status history
///
/// /sbis/...  /ebs/...  /prjs/...       same shape as /sbds
///
/// /status/get_entity                   status catalogue for an entity kind
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sbds", entity::router::<Sbd>())
        .nest("/sbis", entity::router::<Sbi>())
        .nest("/ebs", entity::router::<Eb>())
        .nest("/prjs", entity::router::<Prj>())
        .nest("/status", status::router())
}
