//! Stage board handler.

use axum::{
    extract::{Path, State},
    Json,
};
use crmdesk_core::board::{to_columns, ColumnSummary};
use serde::Serialize;

use super::{parse_resource, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub resource: String,
    pub value_field: &'static str,
    pub columns: Vec<ColumnSummary>,
}

pub async fn get_board(
    State(state): State<AppState>,
    Path(resource): Path<String>,
) -> Result<Json<BoardResponse>, ApiError> {
    let kind = parse_resource(&resource)?;
    let records = state.store.fetch_collection(kind).await?;
    let stages = kind.default_stages();
    let field = kind.value_field();

    let columns = to_columns(&records, &stages)
        .iter()
        .map(|column| column.summary(field))
        .collect();

    Ok(Json(BoardResponse {
        resource: kind.resource().to_string(),
        value_field: field,
        columns,
    }))
}
