use std::sync::Arc;

use ptt_db::Oda;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The ODA every request opens its unit of work against.
    pub oda: Arc<dyn Oda>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
