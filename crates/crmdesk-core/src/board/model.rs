//! Pipeline board models.

use serde::Serialize;

use crate::error::ReconciliationError;
use crate::record::{Record, StageDef};

/// Which column a group of records belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKey<'a> {
    Stage(&'a StageDef),
    /// Catch-all for records whose stage the board does not know.
    Unassigned,
}

/// A read-only stage column.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineColumn<'a> {
    pub key: ColumnKey<'a>,
    pub records: Vec<&'a Record>,
}

impl<'a> PipelineColumn<'a> {
    pub fn stage_id(&self) -> Option<&'a str> {
        match self.key {
            ColumnKey::Stage(stage) => Some(stage.id.as_str()),
            ColumnKey::Unassigned => None,
        }
    }

    pub fn name(&self) -> &'a str {
        match self.key {
            ColumnKey::Stage(stage) => stage.name.as_str(),
            ColumnKey::Unassigned => "Unassigned",
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.records.iter().any(|r| r.id == record_id)
    }

    /// Sum of a numeric field over the column (e.g. stage value).
    pub fn total(&self, field: &str) -> f64 {
        self.records.iter().filter_map(|r| r.number(field)).sum()
    }

    /// Owned summary for serialisation.
    pub fn summary(&self, value_field: &str) -> ColumnSummary {
        ColumnSummary {
            stage_id: self.stage_id().map(str::to_string),
            name: self.name().to_string(),
            count: self.len(),
            total: self.total(value_field),
            record_ids: self.records.iter().map(|r| r.id.clone()).collect(),
        }
    }
}

/// Serialisable column digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub stage_id: Option<String>,
    pub name: String,
    pub count: usize,
    pub total: f64,
    pub record_ids: Vec<String>,
}

/// Per-gesture drag state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { record_id: String },
}

/// Where a dragged card was released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Column(String),
    Outside,
}

/// Result of releasing a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// A stage change was applied optimistically and awaits confirmation.
    Moved(MoveTicket),
    /// Dropped back onto its own column.
    Unchanged,
    /// Dropped outside any known column, or no drag was active.
    Ignored,
}

/// Lifecycle of an optimistic stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    Pending,
    Committed,
    RolledBack,
}

/// One optimistic stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveTransaction {
    pub id: u64,
    pub record_id: String,
    pub from_stage: String,
    pub to_stage: String,
    pub state: TxnState,
}

/// Handle for confirming a pending move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTicket {
    pub txn_id: u64,
    pub epoch: u64,
    pub record_id: String,
    pub to_stage: String,
}

/// What a confirmation did to the board.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Committed(MoveTransaction),
    RolledBack(ReconciliationError),
    /// The board was unmounted or reset since the move; ignored.
    Stale,
}
