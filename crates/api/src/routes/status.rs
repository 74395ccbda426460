use axum::routing::get;
use axum::Router;

use crate::handlers::status;
use crate::state::AppState;

/// Routes mounted at `/status`.
///
/// ```text
/// GET    /get_entity?entity_name=    -> get_entity
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/get_entity", get(status::get_entity))
}
