//! Pipeline board: stage columns, drag gestures and optimistic moves.
//!
//! The board reads a frozen snapshot of the collection. The only divergence
//! it allows is an overlay of optimistic stage changes, each tracked as a
//! [`MoveTransaction`] that ends either committed or rolled back. A fresh
//! snapshot from the store replaces everything except still-pending moves.

pub mod model;

pub use model::{
    ColumnKey, ColumnSummary, ConfirmOutcome, DragState, DropOutcome, DropTarget,
    MoveTicket, MoveTransaction, PipelineColumn, TxnState,
};

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CrmError, CrmResult, ReconciliationError, StoreError};
use crate::record::{EntityKind, Record, RecordPatch, StageDef};
use crate::store::RecordStore;

/// Group records into stage columns, in stage order.
///
/// Records whose stage is not in `stages` land in a trailing
/// [`ColumnKey::Unassigned`] column, which only exists when needed.
pub fn to_columns<'a>(records: &'a [Record], stages: &'a [StageDef]) -> Vec<PipelineColumn<'a>> {
    to_columns_by(records, stages, |r| r.stage.as_str())
}

/// [`to_columns`] with the stage of each record supplied by `stage_of`.
pub fn to_columns_by<'a, I, F>(records: I, stages: &'a [StageDef], stage_of: F) -> Vec<PipelineColumn<'a>>
where
    I: IntoIterator<Item = &'a Record>,
    F: Fn(&'a Record) -> &'a str,
{
    let mut columns: Vec<PipelineColumn<'a>> = stages
        .iter()
        .map(|stage| PipelineColumn {
            key: ColumnKey::Stage(stage),
            records: Vec::new(),
        })
        .collect();
    let mut unassigned = Vec::new();

    for record in records {
        let stage = stage_of(record);
        match stages.iter().position(|s| s.id == stage) {
            Some(i) => columns[i].records.push(record),
            None => unassigned.push(record),
        }
    }

    if !unassigned.is_empty() {
        columns.push(PipelineColumn {
            key: ColumnKey::Unassigned,
            records: unassigned,
        });
    }
    columns
}

/// Outcome of a bulk stage change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkMoveReport {
    pub committed: Vec<String>,
    pub unchanged: Vec<String>,
    /// Selected ids that are no longer in the snapshot.
    pub missing: Vec<String>,
    #[serde(skip)]
    pub rolled_back: Vec<ReconciliationError>,
}

/// Board session over one collection snapshot.
pub struct PipelineBoard {
    kind: EntityKind,
    stages: Vec<StageDef>,
    snapshot: Arc<Vec<Record>>,
    overlay: HashMap<String, String>,
    transactions: Vec<MoveTransaction>,
    selection: BTreeSet<String>,
    drag: DragState,
    notices: Vec<ReconciliationError>,
    epoch: u64,
    next_txn: u64,
}

impl PipelineBoard {
    pub fn new(kind: EntityKind, stages: Vec<StageDef>, snapshot: Arc<Vec<Record>>) -> Self {
        Self {
            kind,
            stages,
            snapshot,
            overlay: HashMap::new(),
            transactions: Vec::new(),
            selection: BTreeSet::new(),
            drag: DragState::Idle,
            notices: Vec::new(),
            epoch: 0,
            next_txn: 1,
        }
    }

    /// Board with the kind's default stages.
    pub fn with_default_stages(kind: EntityKind, snapshot: Arc<Vec<Record>>) -> Self {
        Self::new(kind, kind.default_stages(), snapshot)
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    pub fn snapshot(&self) -> &Arc<Vec<Record>> {
        &self.snapshot
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn transactions(&self) -> &[MoveTransaction] {
        &self.transactions
    }

    pub fn has_pending(&self) -> bool {
        self.transactions.iter().any(|t| t.state == TxnState::Pending)
    }

    /// Columns as currently displayed, optimistic moves included.
    ///
    /// Records are the snapshot's own; their `stage` field still holds the
    /// last fetched value while a move is in flight.
    pub fn columns(&self) -> Vec<PipelineColumn<'_>> {
        to_columns_by(self.snapshot.iter(), &self.stages, |r| {
            self.overlay.get(&r.id).map(String::as_str).unwrap_or(r.stage.as_str())
        })
    }

    pub fn record(&self, record_id: &str) -> Option<&Record> {
        self.snapshot.iter().find(|r| r.id == record_id)
    }

    /// Displayed stage of a record.
    pub fn stage_of(&self, record_id: &str) -> Option<&str> {
        let record = self.record(record_id)?;
        Some(
            self.overlay
                .get(record_id)
                .map(String::as_str)
                .unwrap_or(record.stage.as_str()),
        )
    }

    fn is_known_stage(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s.id == stage)
    }
}

/// Drag gesture.
impl PipelineBoard {
    /// Mark a record as the active drag payload.
    pub fn begin_drag(&mut self, record_id: &str) -> CrmResult<()> {
        if self.record(record_id).is_none() {
            return Err(CrmError::RecordNotFound(record_id.to_string()));
        }
        debug!(record_id, "Drag started");
        self.drag = DragState::Dragging {
            record_id: record_id.to_string(),
        };
        Ok(())
    }

    pub fn cancel_drag(&mut self) {
        if let DragState::Dragging { record_id } = std::mem::take(&mut self.drag) {
            debug!(record_id = %record_id, "Drag cancelled");
        }
    }

    /// Release the active drag. Always returns the board to idle.
    pub fn drop_on(&mut self, target: DropTarget) -> DropOutcome {
        let DragState::Dragging { record_id } = std::mem::take(&mut self.drag) else {
            return DropOutcome::Ignored;
        };

        match target {
            DropTarget::Outside => {
                debug!(record_id = %record_id, "Dropped outside any column");
                DropOutcome::Ignored
            }
            DropTarget::Column(stage) if !self.is_known_stage(&stage) => {
                debug!(record_id = %record_id, stage = %stage, "Dropped on unknown column");
                DropOutcome::Ignored
            }
            DropTarget::Column(stage) => match self.move_record(&record_id, &stage) {
                Ok(outcome) => outcome,
                // the record vanished from the snapshot mid-drag
                Err(_) => DropOutcome::Ignored,
            },
        }
    }
}

/// Optimistic transactions.
impl PipelineBoard {
    /// Apply a stage change optimistically and open a pending transaction.
    pub fn move_record(&mut self, record_id: &str, stage: &str) -> CrmResult<DropOutcome> {
        if !self.is_known_stage(stage) {
            return Err(CrmError::UnknownStage(stage.to_string()));
        }
        let from_stage = self
            .stage_of(record_id)
            .ok_or_else(|| CrmError::RecordNotFound(record_id.to_string()))?
            .to_string();
        if from_stage == stage {
            return Ok(DropOutcome::Unchanged);
        }

        let txn_id = self.next_txn;
        self.next_txn += 1;
        self.transactions.push(MoveTransaction {
            id: txn_id,
            record_id: record_id.to_string(),
            from_stage: from_stage.clone(),
            to_stage: stage.to_string(),
            state: TxnState::Pending,
        });
        self.overlay.insert(record_id.to_string(), stage.to_string());

        debug!(record_id, from = %from_stage, to = stage, txn_id, "Optimistic stage change");

        Ok(DropOutcome::Moved(MoveTicket {
            txn_id,
            epoch: self.epoch,
            record_id: record_id.to_string(),
            to_stage: stage.to_string(),
        }))
    }

    /// Settle a pending move with the store's answer.
    pub fn confirm(&mut self, ticket: &MoveTicket, result: Result<Record, StoreError>) -> ConfirmOutcome {
        if ticket.epoch != self.epoch {
            debug!(txn_id = ticket.txn_id, "Ignoring confirmation for a previous board session");
            return ConfirmOutcome::Stale;
        }
        let Some(pos) = self
            .transactions
            .iter()
            .position(|t| t.id == ticket.txn_id && t.state == TxnState::Pending)
        else {
            return ConfirmOutcome::Stale;
        };

        let is_latest = self.is_latest_for_record(pos);

        match result {
            Ok(stored) => {
                let txn = &mut self.transactions[pos];
                txn.state = TxnState::Committed;
                let txn = txn.clone();
                if is_latest && stored.stage != txn.to_stage {
                    self.overlay.insert(txn.record_id.clone(), stored.stage.clone());
                }
                info!(record_id = %txn.record_id, stage = %txn.to_stage, "Stage change committed");
                ConfirmOutcome::Committed(txn)
            }
            Err(source) => {
                let txn = &mut self.transactions[pos];
                txn.state = TxnState::RolledBack;
                let txn = txn.clone();

                if is_latest {
                    match self.last_good_stage(pos) {
                        Some(stage) => self.restore_stage(&txn.record_id, &stage),
                        None => {
                            self.overlay.remove(&txn.record_id);
                        }
                    }
                }
                let restored_stage = self
                    .stage_of(&txn.record_id)
                    .unwrap_or(txn.from_stage.as_str())
                    .to_string();

                let err = ReconciliationError {
                    record_id: txn.record_id.clone(),
                    attempted_stage: txn.to_stage.clone(),
                    restored_stage,
                    source,
                };
                warn!(error = %err, "Stage change rolled back");
                self.notices.push(err.clone());
                ConfirmOutcome::RolledBack(err)
            }
        }
    }

    fn is_latest_for_record(&self, pos: usize) -> bool {
        let txn = &self.transactions[pos];
        !self.transactions[pos + 1..]
            .iter()
            .any(|t| t.record_id == txn.record_id && t.state != TxnState::RolledBack)
    }

    /// Target stage of the newest earlier move of the same record that was
    /// not rolled back. `None` means the snapshot stage is the last good one.
    fn last_good_stage(&self, pos: usize) -> Option<String> {
        let record_id = &self.transactions[pos].record_id;
        self.transactions[..pos]
            .iter()
            .rev()
            .find(|t| &t.record_id == record_id && t.state != TxnState::RolledBack)
            .map(|t| t.to_stage.clone())
    }

    fn restore_stage(&mut self, record_id: &str, stage: &str) {
        let fetched = self.record(record_id).map(|r| r.stage == stage);
        match fetched {
            Some(true) | None => {
                self.overlay.remove(record_id);
            }
            Some(false) => {
                self.overlay.insert(record_id.to_string(), stage.to_string());
            }
        }
    }

    /// Full drop gesture against a store: optimistic move, persist, settle.
    ///
    /// `Ok(None)` means nothing changed (same column, unknown column).
    /// A rejected update is rolled back and returned as
    /// [`CrmError::Reconciliation`], which is recoverable.
    pub async fn drop_on_column(
        &mut self,
        store: &dyn RecordStore,
        record_id: &str,
        stage: &str,
    ) -> CrmResult<Option<MoveTransaction>> {
        self.begin_drag(record_id)?;
        let DropOutcome::Moved(ticket) = self.drop_on(DropTarget::Column(stage.to_string())) else {
            return Ok(None);
        };
        self.persist(store, &ticket).await
    }

    async fn persist(&mut self, store: &dyn RecordStore, ticket: &MoveTicket) -> CrmResult<Option<MoveTransaction>> {
        let result = store
            .update_record(self.kind, &ticket.record_id, &RecordPatch::stage(&ticket.to_stage))
            .await;
        match self.confirm(ticket, result) {
            ConfirmOutcome::Committed(txn) => Ok(Some(txn)),
            ConfirmOutcome::RolledBack(err) => Err(CrmError::Reconciliation(err)),
            ConfirmOutcome::Stale => Ok(None),
        }
    }

    /// Move every selected record to `stage`, each in its own transaction.
    ///
    /// The selection is consumed up front. Selected ids missing from the
    /// snapshot are reported, not moved.
    pub async fn move_selected(&mut self, store: &dyn RecordStore, stage: &str) -> CrmResult<BulkMoveReport> {
        if !self.is_known_stage(stage) {
            return Err(CrmError::UnknownStage(stage.to_string()));
        }

        let mut report = BulkMoveReport::default();
        let mut tickets = Vec::new();
        for id in std::mem::take(&mut self.selection) {
            match self.move_record(&id, stage) {
                Ok(DropOutcome::Moved(ticket)) => tickets.push(ticket),
                Ok(_) => report.unchanged.push(id),
                Err(e) => {
                    debug!(record_id = %id, error = %e, "Skipping selected record");
                    report.missing.push(id);
                }
            }
        }

        for ticket in tickets {
            let result = store
                .update_record(self.kind, &ticket.record_id, &RecordPatch::stage(&ticket.to_stage))
                .await;
            match self.confirm(&ticket, result) {
                ConfirmOutcome::Committed(txn) => report.committed.push(txn.record_id),
                ConfirmOutcome::RolledBack(err) => report.rolled_back.push(err),
                ConfirmOutcome::Stale => {}
            }
        }

        Ok(report)
    }
}

/// Snapshot lifecycle.
impl PipelineBoard {
    /// Swap in a freshly fetched collection.
    pub fn replace_snapshot(&mut self, snapshot: Arc<Vec<Record>>) {
        self.snapshot = snapshot;
        self.transactions.retain(|t| t.state == TxnState::Pending);

        let snapshot = Arc::clone(&self.snapshot);
        let exists = |id: &str| snapshot.iter().any(|r| r.id == id);

        self.overlay.clear();
        for txn in &self.transactions {
            if exists(&txn.record_id) {
                self.overlay.insert(txn.record_id.clone(), txn.to_stage.clone());
            }
        }
        self.selection.retain(|id| exists(id));
        if let DragState::Dragging { record_id } = &self.drag {
            if !exists(record_id) {
                self.drag = DragState::Idle;
            }
        }
        debug!(records = self.snapshot.len(), pending = self.transactions.len(), "Board snapshot replaced");
    }

    /// Tear down the session; confirmations issued before this are ignored.
    pub fn unmount(&mut self) {
        self.epoch += 1;
        self.transactions.clear();
        self.overlay.clear();
        self.selection.clear();
        self.drag = DragState::Idle;
    }

    /// Drain queued rollback notices.
    pub fn take_notices(&mut self) -> Vec<ReconciliationError> {
        std::mem::take(&mut self.notices)
    }

    pub fn has_notices(&self) -> bool {
        !self.notices.is_empty()
    }
}

/// Selection.
impl PipelineBoard {
    /// Flip selection of one record; returns whether it is now selected.
    pub fn toggle_select(&mut self, record_id: &str) -> bool {
        if self.selection.remove(record_id) {
            false
        } else {
            self.selection.insert(record_id.to_string());
            true
        }
    }

    pub fn select_all<'r>(&mut self, records: impl IntoIterator<Item = &'r Record>) {
        self.selection.extend(records.into_iter().map(|r| r.id.clone()));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn is_selected(&self, record_id: &str) -> bool {
        self.selection.contains(record_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn record(id: &str, stage: &str, value: f64) -> Record {
        let mut fields = crate::record::FieldMap::new();
        fields.insert("value".into(), FieldValue::Number(value));
        Record {
            id: id.into(),
            kind: EntityKind::Deal,
            stage: stage.into(),
            fields,
            custom_fields: Default::default(),
            tags: Vec::new(),
            created_at: None,
            updated_at: None,
        }
    }

    fn board() -> PipelineBoard {
        PipelineBoard::with_default_stages(
            EntityKind::Deal,
            Arc::new(vec![
                record("1", "qualification", 100.0),
                record("2", "proposal", 250.0),
                record("3", "qualification", 50.0),
            ]),
        )
    }

    #[test]
    fn test_columns_follow_stage_order() {
        let records = vec![record("a", "negotiation", 1.0), record("b", "qualification", 2.0)];
        let stages = EntityKind::Deal.default_stages();
        let columns = to_columns(&records, &stages);
        let ids: Vec<&str> = columns.iter().filter_map(|c| c.stage_id()).collect();
        assert_eq!(ids, vec!["qualification", "proposal", "negotiation", "closed-won", "closed-lost"]);
        assert!(columns[0].contains("b"));
        assert!(columns[2].contains("a"));
    }

    #[test]
    fn test_unknown_stage_goes_to_catch_all() {
        let records = vec![record("a", "legacy-stage", 1.0)];
        let stages = EntityKind::Deal.default_stages();
        let columns = to_columns(&records, &stages);
        let last = columns.last().unwrap();
        assert_eq!(last.key, ColumnKey::Unassigned);
        assert!(last.contains("a"));
    }

    #[test]
    fn test_column_totals() {
        let board = board();
        let columns = board.columns();
        assert_eq!(columns[0].total("value"), 150.0);
        assert_eq!(columns[0].summary("value").record_ids, vec!["1", "3"]);
    }

    #[test]
    fn test_drop_outside_is_noop() {
        let mut board = board();
        board.begin_drag("1").unwrap();
        assert_eq!(board.drop_on(DropTarget::Outside), DropOutcome::Ignored);
        assert_eq!(board.drag_state(), &DragState::Idle);
        assert_eq!(board.stage_of("1"), Some("qualification"));
        assert!(board.transactions().is_empty());
    }

    #[test]
    fn test_drop_without_drag_ignored() {
        let mut board = board();
        assert_eq!(board.drop_on(DropTarget::Column("proposal".into())), DropOutcome::Ignored);
    }

    #[test]
    fn test_drop_on_same_column_unchanged() {
        let mut board = board();
        board.begin_drag("2").unwrap();
        assert_eq!(board.drop_on(DropTarget::Column("proposal".into())), DropOutcome::Unchanged);
    }

    #[test]
    fn test_optimistic_move_then_rollback() {
        let mut board = board();
        board.begin_drag("1").unwrap();
        let DropOutcome::Moved(ticket) = board.drop_on(DropTarget::Column("proposal".into())) else {
            panic!("expected a move");
        };
        assert_eq!(board.stage_of("1"), Some("proposal"));
        assert!(board.columns()[1].contains("1"));

        let outcome = board.confirm(&ticket, Err(StoreError::Status { status: 422, body: "locked".into() }));
        let ConfirmOutcome::RolledBack(err) = outcome else {
            panic!("expected rollback");
        };
        assert_eq!(err.restored_stage, "qualification");
        assert_eq!(board.stage_of("1"), Some("qualification"));
        assert_eq!(board.transactions()[0].state, TxnState::RolledBack);
        assert_eq!(board.take_notices().len(), 1);
    }

    #[test]
    fn test_confirm_after_unmount_is_stale() {
        let mut board = board();
        let DropOutcome::Moved(ticket) = board.move_record("1", "proposal").unwrap() else {
            panic!("expected a move");
        };
        board.unmount();
        let outcome = board.confirm(&ticket, Ok(record("1", "proposal", 100.0)));
        assert_eq!(outcome, ConfirmOutcome::Stale);
        assert_eq!(board.stage_of("1"), Some("qualification"));
    }

    #[test]
    fn test_refresh_keeps_pending_drops_committed() {
        let mut board = board();
        let DropOutcome::Moved(first) = board.move_record("1", "proposal").unwrap() else {
            panic!("expected a move");
        };
        let DropOutcome::Moved(_second) = board.move_record("3", "negotiation").unwrap() else {
            panic!("expected a move");
        };
        board.confirm(&first, Ok(record("1", "proposal", 100.0)));

        board.replace_snapshot(Arc::new(vec![
            record("1", "proposal", 100.0),
            record("2", "proposal", 250.0),
            record("3", "qualification", 50.0),
        ]));
        assert_eq!(board.transactions().len(), 1);
        assert_eq!(board.stage_of("3"), Some("negotiation"));
        assert_eq!(board.stage_of("1"), Some("proposal"));
    }

    #[test]
    fn test_rollback_of_superseded_move_keeps_newer_stage() {
        let mut board = board();
        let DropOutcome::Moved(first) = board.move_record("1", "proposal").unwrap() else {
            panic!("expected a move");
        };
        let DropOutcome::Moved(_second) = board.move_record("1", "negotiation").unwrap() else {
            panic!("expected a move");
        };
        board.confirm(&first, Err(StoreError::Transport("timeout".into())));
        assert_eq!(board.stage_of("1"), Some("negotiation"));
    }

    #[test]
    fn test_rollback_chain_returns_to_snapshot_stage() {
        let mut board = board();
        let DropOutcome::Moved(first) = board.move_record("1", "proposal").unwrap() else {
            panic!("expected a move");
        };
        let DropOutcome::Moved(second) = board.move_record("1", "negotiation").unwrap() else {
            panic!("expected a move");
        };

        board.confirm(&first, Err(StoreError::Transport("timeout".into())));
        assert_eq!(board.stage_of("1"), Some("negotiation"));

        let ConfirmOutcome::RolledBack(err) = board.confirm(&second, Err(StoreError::Transport("timeout".into())))
        else {
            panic!("expected rollback");
        };
        assert_eq!(err.restored_stage, "qualification");
        assert_eq!(board.stage_of("1"), Some("qualification"));
        assert!(!board.overlay.contains_key("1"));
    }

    #[test]
    fn test_rollback_falls_back_to_committed_move() {
        let mut board = board();
        let DropOutcome::Moved(first) = board.move_record("1", "proposal").unwrap() else {
            panic!("expected a move");
        };
        let DropOutcome::Moved(second) = board.move_record("1", "negotiation").unwrap() else {
            panic!("expected a move");
        };
        board.confirm(&first, Ok(record("1", "proposal", 100.0)));
        board.confirm(&second, Err(StoreError::Transport("timeout".into())));
        assert_eq!(board.stage_of("1"), Some("proposal"));
    }

    #[test]
    fn test_rollback_of_newer_move_shows_older_pending_target() {
        let mut board = board();
        let DropOutcome::Moved(first) = board.move_record("1", "proposal").unwrap() else {
            panic!("expected a move");
        };
        let DropOutcome::Moved(second) = board.move_record("1", "negotiation").unwrap() else {
            panic!("expected a move");
        };
        board.confirm(&second, Err(StoreError::Transport("timeout".into())));
        assert_eq!(board.stage_of("1"), Some("proposal"));

        board.confirm(&first, Ok(record("1", "proposal", 100.0)));
        assert_eq!(board.stage_of("1"), Some("proposal"));
        assert!(!board.has_pending());
    }

    #[test]
    fn test_selection() {
        let mut board = board();
        assert!(board.toggle_select("1"));
        assert!(!board.toggle_select("1"));
        let snapshot = Arc::clone(board.snapshot());
        board.select_all(snapshot.iter());
        assert_eq!(board.selected().len(), 3);

        board.replace_snapshot(Arc::new(vec![record("2", "proposal", 1.0)]));
        assert_eq!(board.selected().iter().collect::<Vec<_>>(), vec!["2"]);

        board.clear_selection();
        assert!(board.selected().is_empty());
    }

    #[test]
    fn test_move_to_unknown_stage_rejected() {
        let mut board = board();
        assert!(matches!(board.move_record("1", "nowhere"), Err(CrmError::UnknownStage(_))));
    }
}
