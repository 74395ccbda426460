//! Handlers for the entity collections (`/sbds`, `/sbis`, `/ebs`, `/prjs`).
//!
//! Each handler is generic over a [`Tracked`] marker so one implementation
//! serves all four collections.

use axum::extract::{Path, State};
use axum::Json;
use ptt_core::entity::{EntityDocument, Metadata, Tracked};
use ptt_core::error::CoreError;
use ptt_core::history::StatusRecord;
use ptt_core::query::{QueryParams, RawQueryParams};
use ptt_db::latest_status;
use serde_json::Value;

use crate::error::AppResult;
use crate::extract::{JsonBody, QueryArgs};
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /{collection}
///
/// Entities matching the query, each with the current status of its version
/// appended.
pub async fn list<E: Tracked>(
    State(state): State<AppState>,
    QueryArgs(raw): QueryArgs<RawQueryParams>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let params = QueryParams::from_raw(&raw)?;

    let mut uow = state.oda.uow().await?;
    let documents = uow.entities(E::KIND).query(&params).await?;

    let mut items = Vec::with_capacity(documents.len());
    for document in &documents {
        let status = uow
            .status_history(E::KIND)
            .current(document.id(), Some(document.version()))
            .await?;
        items.push(document.with_status(&status.current_status));
    }

    tracing::debug!(kind = %E::KIND, count = items.len(), "Listed entities with status");
    Ok(Json(ApiResponse::success(items)))
}

/// GET /{collection}/{id}
pub async fn get_by_id<E: Tracked>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let mut uow = state.oda.uow().await?;
    let document = uow.entities(E::KIND).get(&id, None).await?;
    let status = uow
        .status_history(E::KIND)
        .current(&id, Some(document.version()))
        .await?;

    Ok(Json(ApiResponse::single(
        document.with_status(&status.current_status),
    )))
}

/// PUT /{collection}/{id}
///
/// Stores the body as the next version of an existing entity. The new
/// version starts with the entity's latest recorded status.
pub async fn update<E: Tracked>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> AppResult<Json<ApiResponse<Value>>> {
    let kind = E::KIND;
    let document = EntityDocument::from_json(kind, body)?;
    if document.id() != id {
        return Err(CoreError::Mismatch {
            path: id,
            body: document.id().to_string(),
        }
        .into());
    }

    let mut uow = state.oda.uow().await?;
    let status = latest_status(uow.as_mut(), kind, &id).await?;
    let stored = uow.entities(kind).add(document).await?;
    uow.status_history(kind)
        .add(StatusRecord {
            kind,
            entity_ref: stored.id().to_string(),
            entity_version: stored.version(),
            previous_status: status.clone(),
            current_status: status.clone(),
            metadata: Metadata::default(),
        })
        .await?;
    uow.commit().await?;

    tracing::info!(
        kind = %kind,
        id = stored.id(),
        version = stored.version(),
        status = %status,
        "Stored new entity version"
    );
    Ok(Json(ApiResponse::single(stored.with_status(&status))))
}
