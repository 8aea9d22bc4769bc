//! Centralized error types for CRMDesk.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::EntityKind;

/// Field name → message map produced by step validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Drop every error whose field is in `fields`.
    pub fn clear_fields<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) {
        for field in fields {
            self.0.remove(field);
        }
    }

    /// Merge `other` in, replacing messages for fields present in both.
    pub fn extend(&mut self, other: FieldErrors) {
        self.0.extend(other.0);
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Failure reported by a record or draft store implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// A submission that did not produce a persisted record.
///
/// The draft is always left intact so the user can correct and resubmit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmitError {
    #[error("Step {step} is invalid: {errors}")]
    Invalid { step: usize, errors: FieldErrors },

    #[error("A submission is already in flight")]
    InFlight,

    #[error("Failed to save record: {0}")]
    Store(#[from] StoreError),
}

/// An optimistic stage change the backend rejected.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not move record {record_id} to '{attempted_stage}', restored to '{restored_stage}': {source}")]
pub struct ReconciliationError {
    pub record_id: String,
    pub attempted_stage: String,
    pub restored_stage: String,
    #[source]
    pub source: StoreError,
}

/// Loading a record collection failed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to load {kind} collection: {source}")]
pub struct FetchError {
    pub kind: EntityKind,
    #[source]
    pub source: StoreError,
}

/// Main error type for CRMDesk operations.
#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Tag already present: {0}")]
    DuplicateTag(String),

    #[error("Custom field already exists: {0}")]
    DuplicateCustomField(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for CRMDesk operations.
pub type CrmResult<T> = Result<T, CrmError>;

impl CrmError {
    /// Create a single-field validation error.
    pub fn validation(field: impl Into<String>, msg: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field, msg);
        Self::Validation(errors)
    }

    /// Create an invalid record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether a view can keep rendering after this error.
    ///
    /// Only a failed collection load (and broken local setup) may block a view.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fetch(_) | Self::Config(_) | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_clear_only_named_fields() {
        let mut errors = FieldErrors::new();
        errors.insert("firstName", "First name is required");
        errors.insert("company", "Company name is required");
        errors.clear_fields(["firstName", "email"]);
        assert!(!errors.contains("firstName"));
        assert_eq!(errors.get("company"), Some("Company name is required"));
    }

    #[test]
    fn test_recoverable_classes() {
        let fetch = CrmError::Fetch(FetchError {
            kind: EntityKind::Deal,
            source: StoreError::Transport("down".into()),
        });
        assert!(!fetch.is_recoverable());
        assert!(CrmError::Submit(SubmitError::InFlight).is_recoverable());
        assert!(CrmError::validation("email", "bad").is_recoverable());
    }

    #[test]
    fn test_field_errors_display() {
        let mut errors = FieldErrors::new();
        errors.insert("b", "two");
        errors.insert("a", "one");
        assert_eq!(errors.to_string(), "a: one; b: two");
    }
}
