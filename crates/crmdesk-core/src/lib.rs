//! CRMDesk Core Library
//!
//! Domain models and pipeline logic shared by the Lead, Deal, Account and
//! Contact screens: the multi-step record wizard, the stage board and the
//! fuzzy search composer.

pub mod board;
pub mod client;
pub mod collection;
pub mod config;
pub mod error;
pub mod record;
pub mod search;
pub mod store;
pub mod wizard;

pub use error::{CrmError, CrmResult, FetchError, FieldErrors, ReconciliationError, StoreError, SubmitError};
pub use record::{EntityKind, FieldMap, FieldValue, NewRecord, Record, RecordPatch, StageDef};
pub use store::{DraftStore, RecordStore};
