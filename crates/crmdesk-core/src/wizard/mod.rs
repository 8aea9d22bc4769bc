//! Multi-step record wizard.
//!
//! The pure step logic lives in [`engine`]; [`Wizard`] is the stateful
//! session around it. A session owns its draft, talks to an injected
//! [`DraftStore`] for auto-save and hands the finished record to a
//! [`RecordStore`] on submit.

pub mod autosave;
pub mod engine;
pub mod model;
pub mod schemas;
pub mod validation;

pub use autosave::{AutoSaver, DEFAULT_DEBOUNCE};
pub use engine::{advance, retreat, validate_all, validate_step};
pub use model::{
    CrossFieldRule, FieldRule, Format, StepDef, StepValidation, WizardDraft, WizardMode, WizardSchema,
    WizardSeed,
};
pub use schemas::{deal_wizard, lead_wizard};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{CrmResult, StoreError, SubmitError};
use crate::record::{EntityKind, FieldValue, NewRecord, Record, RecordPatch};
use crate::store::{DraftStore, RecordStore};

/// Default draft namespace.
pub const DEFAULT_NAMESPACE: &str = "crmdesk";

/// What a prepared submission will send to the record store.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitPayload {
    Create(NewRecord),
    Update { id: String, patch: RecordPatch },
}

impl SubmitPayload {
    pub async fn send(&self, kind: EntityKind, store: &dyn RecordStore) -> Result<Record, StoreError> {
        match self {
            Self::Create(record) => store.create_record(record).await,
            Self::Update { id, patch } => store.update_record(kind, id, patch).await,
        }
    }
}

/// A wizard session.
pub struct Wizard {
    schema: WizardSchema,
    mode: WizardMode,
    drafts: Arc<dyn DraftStore>,
    draft_key: String,
    draft: WizardDraft,
    furthest_step: usize,
    in_flight: Arc<AtomicBool>,
    autosave: Option<AutoSaver>,
}

impl Wizard {
    pub fn new(schema: WizardSchema, mode: WizardMode, drafts: Arc<dyn DraftStore>) -> Self {
        let draft_key = format!("{}:{}", DEFAULT_NAMESPACE, schema.kind.draft_key());
        let draft = schema.initial_draft();
        Self {
            schema,
            mode,
            drafts,
            draft_key,
            draft,
            furthest_step: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
            autosave: None,
        }
    }

    /// Store drafts under `<namespace>:<entity>-draft`.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.draft_key = format!("{}:{}", namespace, self.schema.kind.draft_key());
        self
    }

    /// Enable debounced auto-save. Edit sessions never auto-save.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_autosave(mut self, debounce: Duration) -> Self {
        if self.mode.is_create() {
            self.autosave = Some(AutoSaver::spawn(
                Arc::clone(&self.drafts),
                self.draft_key.clone(),
                debounce,
            ));
        } else {
            debug!("Auto-save disabled for edit session");
        }
        self
    }

    pub fn schema(&self) -> &WizardSchema {
        &self.schema
    }

    pub fn mode(&self) -> &WizardMode {
        &self.mode
    }

    pub fn draft(&self) -> &WizardDraft {
        &self.draft
    }

    pub fn draft_key(&self) -> &str {
        &self.draft_key
    }

    pub fn current_step(&self) -> usize {
        self.draft.current_step
    }

    pub fn current_step_def(&self) -> Option<&StepDef> {
        self.schema.step(self.draft.current_step)
    }

    pub fn is_last_step(&self) -> bool {
        self.draft.current_step >= self.schema.last_step()
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Percent of steps reached, for progress display.
    pub fn progress(&self) -> u8 {
        let total = self.schema.step_count().max(1);
        (((self.draft.current_step + 1) * 100) / total).min(100) as u8
    }

    /// Start at step 0 from defaults, then the seed or else a stored draft.
    ///
    /// A stored draft that cannot be parsed is removed and ignored.
    pub async fn initialize(&mut self, seed: Option<WizardSeed>) -> &WizardDraft {
        let mut draft = self.schema.initial_draft();

        if let Some(seed) = seed {
            draft.fields.extend(seed.fields);
            draft.tags = seed.tags;
            draft.custom_fields = seed.custom_fields;
        } else if self.mode.is_create() {
            if let Some(stored) = self.load_stored_draft().await {
                draft.fields.extend(stored.fields);
                draft.tags = stored.tags;
                draft.custom_fields = stored.custom_fields;
            }
        }

        self.draft = draft;
        self.furthest_step = 0;
        self.in_flight.store(false, Ordering::Release);
        &self.draft
    }

    async fn load_stored_draft(&self) -> Option<WizardDraft> {
        let raw = match self.drafts.get(&self.draft_key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key = %self.draft_key, error = %e, "Failed to read stored draft");
                return None;
            }
        };
        match serde_json::from_str::<WizardDraft>(&raw) {
            Ok(stored) => {
                info!(key = %self.draft_key, "Restored draft");
                Some(stored)
            }
            Err(e) => {
                warn!(key = %self.draft_key, error = %e, "Discarding corrupt draft");
                if let Err(e) = self.drafts.remove(&self.draft_key).await {
                    warn!(key = %self.draft_key, error = %e, "Failed to remove corrupt draft");
                }
                None
            }
        }
    }
}

/// Draft edits. Every edit marks the draft dirty, clears the field's error
/// and schedules an auto-save.
impl Wizard {
    pub fn set_field(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.draft.fields.insert(name.to_string(), value.into());
        self.touched(name);
    }

    pub fn clear_field(&mut self, name: &str) {
        self.draft.fields.remove(name);
        self.touched(name);
    }

    /// Add a trimmed, non-empty, not yet present tag.
    pub fn add_tag(&mut self, tag: &str) -> CrmResult<()> {
        let tag = validation::check_tag(&self.draft.tags, tag)?;
        self.draft.tags.push(tag);
        self.touched("tags");
        Ok(())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.draft.tags.len();
        self.draft.tags.retain(|t| t != tag);
        let removed = self.draft.tags.len() != before;
        if removed {
            self.touched("tags");
        }
        removed
    }

    /// Add a custom field; an existing name is rejected.
    pub fn add_custom_field(&mut self, name: &str, value: &str) -> CrmResult<()> {
        let (name, value) = validation::check_custom_field(&self.draft.custom_fields, name, value)?;
        self.draft.custom_fields.insert(name, value);
        self.touched("customFields");
        Ok(())
    }

    pub fn remove_custom_field(&mut self, name: &str) -> bool {
        let removed = self.draft.custom_fields.remove(name).is_some();
        if removed {
            self.touched("customFields");
        }
        removed
    }

    fn touched(&mut self, field: &str) {
        self.draft.is_dirty = true;
        self.draft.errors.remove(field);
        self.schedule_autosave();
    }

    fn schedule_autosave(&self) {
        let Some(saver) = &self.autosave else { return };
        if !self.schema.has_user_content(&self.draft) {
            saver.cancel();
            return;
        }
        match serde_json::to_string(&self.draft) {
            Ok(snapshot) => saver.save(snapshot),
            Err(e) => warn!(error = %e, "Failed to serialise draft"),
        }
    }

    /// Write any pending auto-save now.
    pub async fn flush_draft(&self) {
        if let Some(saver) = &self.autosave {
            saver.flush().await;
        }
    }
}

/// Step navigation.
impl Wizard {
    pub fn validate_step(&self, step: usize) -> StepValidation {
        engine::validate_step(&self.schema, &self.draft, step)
    }

    /// Try to move forward; returns whether the step changed.
    pub fn advance(&mut self) -> bool {
        let before = self.draft.current_step;
        self.draft = engine::advance(&self.schema, std::mem::take(&mut self.draft));
        self.furthest_step = self.furthest_step.max(self.draft.current_step);
        self.draft.current_step != before
    }

    pub fn retreat(&mut self) {
        self.draft = engine::retreat(std::mem::take(&mut self.draft));
    }

    /// Jump to a step already reached. Returns whether the jump happened.
    pub fn go_to(&mut self, step: usize) -> bool {
        if step > self.furthest_step || step >= self.schema.step_count() {
            return false;
        }
        self.draft.current_step = step;
        true
    }
}

/// Clears the session's in-flight flag on drop unless disarmed, so a
/// cancelled submit future leaves the session submittable.
struct InFlight(Option<Arc<AtomicBool>>);

impl InFlight {
    fn arm(flag: &Arc<AtomicBool>) -> Self {
        Self(Some(Arc::clone(flag)))
    }

    fn disarm(&mut self) {
        self.0 = None;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(flag) = self.0.take() {
            flag.store(false, Ordering::Release);
        }
    }
}

/// Submission.
impl Wizard {
    /// Validate every step and build the store payload.
    ///
    /// On success the session is marked in flight until
    /// [`complete_submit`](Self::complete_submit) runs.
    pub fn prepare_submit(&mut self) -> Result<SubmitPayload, SubmitError> {
        if self.in_flight.load(Ordering::Acquire) {
            return Err(SubmitError::InFlight);
        }

        if let Err((step, errors)) = engine::validate_all(&self.schema, &self.draft) {
            engine::replace_step_errors(&self.schema, &mut self.draft, step, errors.clone());
            self.draft.current_step = step;
            debug!(step, errors = %errors, "Submit blocked by validation");
            return Err(SubmitError::Invalid { step, errors });
        }

        let record = self.schema.to_record(&self.draft);
        let payload = match &self.mode {
            WizardMode::Create => SubmitPayload::Create(record),
            WizardMode::Edit { record_id } => SubmitPayload::Update {
                id: record_id.clone(),
                patch: RecordPatch {
                    stage: None,
                    fields: record.fields,
                    tags: Some(record.tags),
                    custom_fields: Some(record.custom_fields),
                },
            },
        };
        self.in_flight.store(true, Ordering::Release);
        Ok(payload)
    }

    /// Settle a prepared submission with the store's answer.
    ///
    /// On failure the draft is kept for a retry. On success the draft slot
    /// is cleared and the session reset.
    pub async fn complete_submit(&mut self, result: Result<Record, StoreError>) -> Result<Record, SubmitError> {
        self.in_flight.store(false, Ordering::Release);
        match result {
            Ok(record) => {
                info!(kind = %self.schema.kind, id = %record.id, "Record saved from wizard");
                self.clear_draft_slot().await;
                self.reset();
                Ok(record)
            }
            Err(e) => {
                warn!(kind = %self.schema.kind, error = %e, "Wizard submit failed");
                Err(SubmitError::Store(e))
            }
        }
    }

    pub async fn submit(&mut self, store: &dyn RecordStore) -> Result<Record, SubmitError> {
        let payload = self.prepare_submit()?;
        let mut in_flight = InFlight::arm(&self.in_flight);
        let result = payload.send(self.schema.kind, store).await;
        in_flight.disarm();
        self.complete_submit(result).await
    }

    /// Submit a shared session without holding its lock across the network
    /// call. A second concurrent submit gets [`SubmitError::InFlight`].
    pub async fn submit_shared(wizard: &Arc<Mutex<Wizard>>, store: &dyn RecordStore) -> Result<Record, SubmitError> {
        let (kind, payload, mut in_flight) = {
            let mut session = wizard.lock().await;
            let payload = session.prepare_submit()?;
            (session.schema.kind, payload, InFlight::arm(&session.in_flight))
        };
        let result = payload.send(kind, store).await;
        let mut session = wizard.lock().await;
        in_flight.disarm();
        session.complete_submit(result).await
    }

    /// Throw the draft away and remove the stored slot.
    pub async fn discard(&mut self) {
        self.clear_draft_slot().await;
        self.reset();
        debug!(key = %self.draft_key, "Draft discarded");
    }

    async fn clear_draft_slot(&self) {
        if !self.mode.is_create() {
            return;
        }
        match &self.autosave {
            Some(saver) => saver.discard().await,
            None => {
                if let Err(e) = self.drafts.remove(&self.draft_key).await {
                    warn!(key = %self.draft_key, error = %e, "Failed to remove draft");
                }
            }
        }
    }

    fn reset(&mut self) {
        self.draft = self.schema.initial_draft();
        self.furthest_step = 0;
        self.in_flight.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldMap;
    use crate::store::{MemoryDraftStore, MemoryRecordStore};
    use async_trait::async_trait;

    /// Record store whose writes never answer.
    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn fetch_collection(&self, _kind: EntityKind) -> Result<Vec<Record>, StoreError> {
            Ok(Vec::new())
        }

        async fn create_record(&self, _record: &NewRecord) -> Result<Record, StoreError> {
            std::future::pending().await
        }

        async fn update_record(&self, _kind: EntityKind, _id: &str, _patch: &RecordPatch) -> Result<Record, StoreError> {
            std::future::pending().await
        }
    }

    fn lead_session(drafts: Arc<MemoryDraftStore>) -> Wizard {
        Wizard::new(lead_wizard(), WizardMode::Create, drafts)
    }

    fn fill_lead(wizard: &mut Wizard) {
        wizard.set_field("firstName", "Jane");
        wizard.set_field("lastName", "Doe");
        wizard.set_field("email", "jane@acme.com");
        wizard.set_field("company", "Acme");
    }

    #[tokio::test]
    async fn test_initialize_hydrates_stored_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let stored = WizardDraft::new().with_field("firstName", "Stored").at_step(2);
        drafts
            .set("crmdesk:lead-draft", &serde_json::to_string(&stored).unwrap())
            .await
            .unwrap();

        let mut wizard = lead_session(drafts);
        let draft = wizard.initialize(None).await;
        assert_eq!(draft.text("firstName"), "Stored");
        assert_eq!(draft.current_step, 0);
        assert_eq!(draft.text("status"), "new");
    }

    #[tokio::test]
    async fn test_seed_wins_over_stored_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let stored = WizardDraft::new().with_field("firstName", "Stored");
        drafts
            .set("crmdesk:lead-draft", &serde_json::to_string(&stored).unwrap())
            .await
            .unwrap();

        let mut wizard = lead_session(drafts);
        let mut seed = FieldMap::new();
        seed.insert("firstName".into(), FieldValue::text("Seeded"));
        assert_eq!(wizard.initialize(Some(seed.into())).await.text("firstName"), "Seeded");
    }

    #[tokio::test]
    async fn test_corrupt_draft_removed() {
        let drafts = Arc::new(MemoryDraftStore::new());
        drafts.set("crmdesk:lead-draft", "{not json").await.unwrap();

        let mut wizard = lead_session(drafts.clone());
        let draft = wizard.initialize(None).await;
        assert!(draft.non_blank("firstName").is_none());
        assert_eq!(drafts.get("crmdesk:lead-draft").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_edit_clears_field_error() {
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.initialize(None).await;
        assert!(!wizard.advance());
        assert!(wizard.draft().errors.contains("firstName"));

        wizard.set_field("firstName", "J");
        assert!(!wizard.draft().errors.contains("firstName"));
        assert!(wizard.draft().errors.contains("lastName"));
        assert!(wizard.draft().is_dirty);
    }

    #[tokio::test]
    async fn test_go_to_only_reached_steps() {
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.initialize(None).await;
        assert!(!wizard.go_to(2));
        fill_lead(&mut wizard);
        assert!(wizard.advance());
        assert!(wizard.advance());
        assert!(wizard.go_to(0));
        assert!(wizard.go_to(2));
        assert!(!wizard.go_to(3));
    }

    #[tokio::test]
    async fn test_tags_and_custom_fields() {
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.add_tag(" hot ").unwrap();
        assert!(wizard.add_tag("hot").is_err());
        wizard.add_custom_field("region", "EMEA").unwrap();
        assert!(wizard.add_custom_field("region", "APAC").is_err());
        assert_eq!(wizard.draft().custom_fields["region"], "EMEA");
        assert!(wizard.remove_tag("hot"));
        assert!(wizard.remove_custom_field("region"));
    }

    #[tokio::test]
    async fn test_submit_jumps_to_first_invalid_step() {
        let store = MemoryRecordStore::new();
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.initialize(None).await;
        wizard.set_field("firstName", "Jane");
        wizard.set_field("lastName", "Doe");
        wizard.set_field("email", "jane@acme.com");
        wizard.advance();
        wizard.advance();
        wizard.advance();

        let err = wizard.submit(&store).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid { step: 1, .. }));
        assert_eq!(wizard.current_step(), 1);
        assert!(wizard.draft().errors.contains("company"));
        assert_eq!(store.len(EntityKind::Lead).await, 0);
    }

    #[tokio::test]
    async fn test_prepare_twice_is_in_flight() {
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.initialize(None).await;
        fill_lead(&mut wizard);
        wizard.prepare_submit().unwrap();
        assert_eq!(wizard.prepare_submit().unwrap_err(), SubmitError::InFlight);

        let err = wizard
            .complete_submit(Err(StoreError::Status { status: 500, body: "boom".into() }))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::Store(_)));
        assert!(!wizard.is_submitting());
        assert_eq!(wizard.draft().text("firstName"), "Jane");
    }

    #[tokio::test]
    async fn test_edit_mode_submits_patch() {
        let store = MemoryRecordStore::new();
        let existing = store
            .create_record(&NewRecord::new(EntityKind::Lead).with_field("name", "Old"))
            .await
            .unwrap();

        let mut wizard = Wizard::new(
            lead_wizard(),
            WizardMode::Edit { record_id: existing.id.clone() },
            Arc::new(MemoryDraftStore::new()),
        );
        wizard.initialize(Some(WizardSeed::from(&existing))).await;
        fill_lead(&mut wizard);

        let saved = wizard.submit(&store).await.unwrap();
        assert_eq!(saved.id, existing.id);
        assert_eq!(saved.text("name").as_deref(), Some("Jane Doe"));
        assert_eq!(store.len(EntityKind::Lead).await, 1);
    }

    #[tokio::test]
    async fn test_discard_resets_and_clears_slot() {
        let drafts = Arc::new(MemoryDraftStore::new());
        drafts.set("crmdesk:lead-draft", "{}").await.unwrap();
        let mut wizard = lead_session(drafts.clone());
        wizard.initialize(None).await;
        wizard.set_field("firstName", "Jane");

        wizard.discard().await;
        assert_eq!(drafts.get("crmdesk:lead-draft").await.unwrap(), None);
        assert!(!wizard.draft().is_dirty);
        assert_eq!(wizard.draft(), &wizard.schema().initial_draft());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_submit_can_be_retried() {
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.initialize(None).await;
        fill_lead(&mut wizard);

        let timed_out = tokio::time::timeout(Duration::from_secs(1), wizard.submit(&StalledStore)).await;
        assert!(timed_out.is_err());
        assert!(!wizard.is_submitting());

        let store = MemoryRecordStore::new();
        let saved = wizard.submit(&store).await.unwrap();
        assert_eq!(saved.text("name").as_deref(), Some("Jane Doe"));
        assert_eq!(store.len(EntityKind::Lead).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_shared_submit_can_be_retried() {
        let mut wizard = lead_session(Arc::new(MemoryDraftStore::new()));
        wizard.initialize(None).await;
        fill_lead(&mut wizard);
        let shared = Arc::new(Mutex::new(wizard));

        let timed_out =
            tokio::time::timeout(Duration::from_secs(1), Wizard::submit_shared(&shared, &StalledStore)).await;
        assert!(timed_out.is_err());
        assert!(!shared.lock().await.is_submitting());

        let store = MemoryRecordStore::new();
        Wizard::submit_shared(&shared, &store).await.unwrap();
        assert_eq!(store.len(EntityKind::Lead).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_last_field_cancels_pending_autosave() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut wizard = lead_session(drafts.clone()).with_autosave(Duration::from_secs(2));
        wizard.initialize(None).await;

        wizard.set_field("firstName", "J");
        wizard.clear_field("firstName");
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(drafts.get("crmdesk:lead-draft").await.unwrap(), None);
    }

    #[test]
    fn test_namespace_key() {
        let wizard = Wizard::new(deal_wizard(), WizardMode::Create, Arc::new(MemoryDraftStore::new()))
            .with_namespace("acme");
        assert_eq!(wizard.draft_key(), "acme:deal-draft");
    }
}
