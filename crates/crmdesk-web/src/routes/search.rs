//! Fuzzy search handler.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use crmdesk_core::search::{default_keys, EmptyReason, ExactFilters, SearchIndex};
use crmdesk_core::Record;
use serde::Serialize;

use super::{parse_resource, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub records: Vec<Record>,
    pub empty_reason: Option<EmptyReason>,
}

/// `q` is the free-text query; every other parameter is an exact filter.
pub async fn search_records(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
) -> Result<Json<SearchResponse>, ApiError> {
    let kind = parse_resource(&resource)?;
    let query = params.remove("q").unwrap_or_default();
    let filters: ExactFilters = params;

    let snapshot = Arc::new(state.store.fetch_collection(kind).await?);
    let index = SearchIndex::build(snapshot, default_keys(kind), state.search_threshold);
    let outcome = index.compose(&query, &filters);

    Ok(Json(SearchResponse {
        total: outcome.records.len(),
        records: outcome.records.into_iter().cloned().collect(),
        empty_reason: outcome.empty_reason,
        query,
    }))
}
