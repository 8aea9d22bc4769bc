//! Record collection handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use crmdesk_core::{NewRecord, Record, RecordPatch};
use crmdesk_redis::CollectionEvent;
use serde_json::Value;

use super::{parse_resource, ApiError};
use crate::state::AppState;

pub async fn list_records(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let kind = parse_resource(&resource)?;
    let records = state.store.fetch_collection(kind).await?;
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let kind = parse_resource(&resource)?;
    let new = NewRecord::from_json(kind, &body)?;
    let record = state.store.create_record(&new).await?;

    state.broadcast(CollectionEvent::invalidated(kind.resource()));

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Record>, ApiError> {
    let kind = parse_resource(&resource)?;
    let patch = RecordPatch::from_json(kind, &body)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("Patch has no changes"));
    }
    let record = state.store.update_record(kind, &id, &patch).await?;

    state.broadcast(CollectionEvent::invalidated(kind.resource()));

    Ok(Json(record))
}
