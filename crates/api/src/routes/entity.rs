//! Route definitions shared by the four entity collections.

use axum::routing::get;
use axum::Router;
use ptt_core::entity::Tracked;

use crate::handlers::{entity, status};
use crate::state::AppState;

/// Routes mounted at `/{collection}` for the entity kind `E`.
///
/// ```text
/// GET    /                    -> list
/// GET    /{id}                -> get_by_id
/// PUT    /{id}                -> update
/// GET    /{id}/status         -> get_status
/// PUT    /{id}/status         -> put_status
/// GET    /status/history      -> history
/// ```
pub fn router<E: Tracked>() -> Router<AppState> {
    Router::new()
        .route("/", get(entity::list::<E>))
        .route("/{id}", get(entity::get_by_id::<E>).put(entity::update::<E>))
        .route(
            "/{id}/status",
            get(status::get_status::<E>).put(status::put_status::<E>),
        )
        .route("/status/history", get(status::history::<E>))
}
