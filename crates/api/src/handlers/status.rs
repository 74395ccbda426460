//! Handlers for entity status: the per-entity status endpoints, the status
//! history listing and the status catalogue.

use axum::extract::{Path, State};
use axum::Json;
use indexmap::IndexMap;
use ptt_core::entity::{EntityKind, Tracked};
use ptt_core::error::CoreError;
use ptt_core::history::{StatusRecord, StatusUpdate};
use ptt_core::query::StatusQuery;
use ptt_core::status::catalogue;
use ptt_db::latest_status;
use serde::Serialize;
use serde_json::Value;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::extract::{JsonBody, QueryArgs};
use crate::query::{EntityNameParams, StatusHistoryParams, VersionParams};
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /{collection}/{id}/status
pub async fn get_status<E: Tracked>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryArgs(params): QueryArgs<VersionParams>,
) -> AppResult<Json<ApiResponse<StatusRecord>>> {
    let mut uow = state.oda.uow().await?;
    let record = uow
        .status_history(E::KIND)
        .current(&id, params.version)
        .await?;
    Ok(Json(ApiResponse::single(record)))
}

/// PUT /{collection}/{id}/status
///
/// Records a status transition. The version is taken from the body, then the
/// `version` query parameter, then the entity's latest version, and must name
/// a stored version. `previous_status` defaults to the latest recorded status.
pub async fn put_status<E: Tracked>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    QueryArgs(params): QueryArgs<VersionParams>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<Json<ApiResponse<StatusRecord>>> {
    let kind = E::KIND;
    let update = StatusUpdate::from_json(kind, &id, &body)?;

    let mut uow = state.oda.uow().await?;
    let requested = update.entity_version.or(params.version);
    let version = uow.entities(kind).get(&id, requested).await?.version();
    let previous = latest_status(uow.as_mut(), kind, &id).await?;

    let record = update.into_record(kind, version, &previous);
    let stored = uow.status_history(kind).add(record).await?;
    uow.commit().await?;

    tracing::info!(
        kind = %kind,
        entity_ref = %stored.entity_ref,
        version = stored.entity_version,
        previous_status = %stored.previous_status,
        current_status = %stored.current_status,
        "Recorded status change"
    );
    Ok(Json(ApiResponse::single(stored)))
}

/// GET /{collection}/status/history
pub async fn history<E: Tracked>(
    State(state): State<AppState>,
    QueryArgs(params): QueryArgs<StatusHistoryParams>,
) -> AppResult<Json<ApiResponse<StatusRecord>>> {
    params
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    let query = StatusQuery::new(params.entity_id.as_deref(), params.version)?;

    let mut uow = state.oda.uow().await?;
    let records = uow.status_history(E::KIND).query(&query).await?;
    if records.is_empty() {
        return Err(CoreError::not_found(query.entity_id).into());
    }

    Ok(Json(ApiResponse::success(records)))
}

/// Status catalogue for one entity kind.
#[derive(Debug, Serialize)]
pub struct EntityStatuses {
    pub entity_type: &'static str,
    pub statuses: IndexMap<&'static str, &'static str>,
}

/// GET /status/get_entity?entity_name=
pub async fn get_entity(
    QueryArgs(params): QueryArgs<EntityNameParams>,
) -> AppResult<Json<EntityStatuses>> {
    let name = params.entity_name.ok_or_else(|| {
        AppError::Unprocessable(CoreError::missing_field("entity_name").to_string())
    })?;
    let kind: EntityKind = name.parse()?;

    Ok(Json(EntityStatuses {
        entity_type: kind.as_str(),
        statuses: catalogue(kind),
    }))
}
