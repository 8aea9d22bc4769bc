//! Route handlers.

pub mod board;
pub mod records;
pub mod search;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crmdesk_core::{CrmError, EntityKind, StoreError};
use serde_json::json;
use tracing::warn;

/// Error response with a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) => StatusCode::CONFLICT,
            StoreError::Status { status, .. } if (400..500).contains(status) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            StoreError::Status { .. } | StoreError::Transport(_) | StoreError::Decode(_) => StatusCode::BAD_GATEWAY,
            StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %err, "Store failure");
        }
        Self::new(status, err.to_string())
    }
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        match err {
            CrmError::Store(e) => e.into(),
            CrmError::Validation(_)
            | CrmError::InvalidRecord(_)
            | CrmError::UnknownStage(_)
            | CrmError::DuplicateTag(_)
            | CrmError::DuplicateCustomField(_) => Self::bad_request(err.to_string()),
            CrmError::RecordNotFound(_) => Self::not_found(err.to_string()),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

/// Resolve a `{resource}` path segment.
pub fn parse_resource(resource: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_str(resource).ok_or_else(|| ApiError::not_found(format!("Unknown resource: {}", resource)))
}
