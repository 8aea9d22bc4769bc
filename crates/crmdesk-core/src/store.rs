//! Store capabilities consumed by the wizard, board and collection cache.
//!
//! Both traits are injected; any conforming backend (REST, Redis, in-memory)
//! satisfies the contract.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::record::{EntityKind, NewRecord, Record, RecordPatch};

/// Remote record collection capability.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch the whole collection for one entity kind.
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError>;

    /// Persist a new record; the store assigns id and timestamps.
    async fn create_record(&self, record: &NewRecord) -> Result<Record, StoreError>;

    /// Apply a partial update and return the stored result.
    async fn update_record(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record, StoreError>;
}

/// Local key-value capability for wizard drafts.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Materialise a stored record from a create body.
pub fn record_from_new(new: &NewRecord, id: String) -> Record {
    let now = Utc::now();
    Record {
        id,
        kind: new.kind,
        stage: new.stage.clone(),
        fields: new.fields.clone(),
        custom_fields: new.custom_fields.clone(),
        tags: new.tags.clone(),
        created_at: Some(now),
        updated_at: Some(now),
    }
}

/// In-process record store.
#[derive(Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<EntityKind, Vec<Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records. Duplicate ids are rejected.
    pub async fn with_records(records: Vec<Record>) -> Result<Self, StoreError> {
        let store = Self::new();
        for record in records {
            store.insert(record).await?;
        }
        Ok(store)
    }

    /// Insert a fully formed record, keeping ids unique per collection.
    pub async fn insert(&self, record: Record) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let collection = collections.entry(record.kind).or_default();
        if collection.iter().any(|r| r.id == record.id) {
            return Err(StoreError::Conflict(format!(
                "{} {} already exists",
                record.kind, record.id
            )));
        }
        collection.push(record);
        Ok(())
    }

    pub async fn len(&self, kind: EntityKind) -> usize {
        self.collections
            .read()
            .await
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_record(&self, record: &NewRecord) -> Result<Record, StoreError> {
        let created = record_from_new(record, uuid::Uuid::new_v4().to_string());
        self.insert(created.clone()).await?;
        debug!(kind = %created.kind, id = %created.id, "Created record in memory store");
        Ok(created)
    }

    async fn update_record(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(&kind)
            .and_then(|c| c.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::NotFound(format!("{kind} {id}")))?;
        patch.apply_to(record);
        Ok(record.clone())
    }
}

/// In-process draft store.
#[derive(Default)]
pub struct MemoryDraftStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_create_and_update() {
        let store = MemoryRecordStore::new();
        let created = store
            .create_record(&NewRecord::new(EntityKind::Deal).with_field("name", "Acme"))
            .await
            .unwrap();
        assert_eq!(created.stage, "qualification");

        let updated = store
            .update_record(EntityKind::Deal, &created.id, &RecordPatch::stage("proposal"))
            .await
            .unwrap();
        assert_eq!(updated.stage, "proposal");

        let all = store.fetch_collection(EntityKind::Deal).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].stage, "proposal");
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_ids() {
        let store = MemoryRecordStore::new();
        let record = record_from_new(&NewRecord::new(EntityKind::Lead), "l1".into());
        store.insert(record.clone()).await.unwrap();
        assert!(matches!(store.insert(record).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryRecordStore::new();
        let err = store
            .update_record(EntityKind::Lead, "nope", &RecordPatch::stage("won"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_draft_store() {
        let drafts = MemoryDraftStore::new();
        drafts.set("crmdesk:lead-draft", "{}").await.unwrap();
        assert_eq!(drafts.get("crmdesk:lead-draft").await.unwrap().as_deref(), Some("{}"));
        drafts.remove("crmdesk:lead-draft").await.unwrap();
        assert!(drafts.get("crmdesk:lead-draft").await.unwrap().is_none());
    }
}
