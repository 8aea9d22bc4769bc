//! [`RecordStore`] and [`DraftStore`] over Redis.

use async_trait::async_trait;
use crmdesk_core::store::record_from_new;
use crmdesk_core::{DraftStore, EntityKind, NewRecord, Record, RecordPatch, RecordStore, StoreError};
use tracing::{debug, info};

use crate::client::RedisPool;
use crate::queries::{drafts, records};

/// Redis-backed record collections.
#[derive(Clone)]
pub struct RedisRecordStore {
    pool: RedisPool,
}

impl RedisRecordStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for RedisRecordStore {
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        let records = records::list_records(&self.pool, kind).await?;
        debug!(kind = %kind, count = records.len(), "Loaded collection from Redis");
        Ok(records)
    }

    async fn create_record(&self, record: &NewRecord) -> Result<Record, StoreError> {
        let created = record_from_new(record, uuid::Uuid::new_v4().to_string());
        records::insert_record(&self.pool, &created).await?;
        info!(kind = %created.kind, id = %created.id, "Record created");
        Ok(created)
    }

    async fn update_record(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record, StoreError> {
        let record = records::update_record(&self.pool, kind, id, patch).await?;
        info!(kind = %kind, id = %id, stage = %record.stage, "Record updated");
        Ok(record)
    }
}

/// Redis-backed wizard draft slots.
#[derive(Clone)]
pub struct RedisDraftStore {
    pool: RedisPool,
}

impl RedisDraftStore {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DraftStore for RedisDraftStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(drafts::get_draft(&self.pool, key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(drafts::set_draft(&self.pool, key, value).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        Ok(drafts::delete_draft(&self.pool, key).await?)
    }
}
