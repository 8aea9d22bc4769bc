//! HTTP record store speaking the `/api/<resource>` JSON interface.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::StoreError;
use crate::record::{EntityKind, NewRecord, Record, RecordPatch};
use crate::store::RecordStore;

/// Default API URL.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3030";

/// REST-backed [`RecordStore`].
#[derive(Clone)]
pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        debug!(base_url = %base_url, "RestRecordStore initialized");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/api/{}", self.base_url, kind.resource())
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Record API returned an error");
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

impl Default for RestRecordStore {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, Duration::from_secs(10))
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Transport(e.to_string())
}

fn decode(kind: EntityKind, value: &Value) -> Result<Record, StoreError> {
    Record::from_json(kind, value).map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn fetch_collection(&self, kind: EntityKind) -> Result<Vec<Record>, StoreError> {
        let url = self.collection_url(kind);
        debug!(url = %url, "Fetching collection");

        let response = self.client.get(&url).send().await.map_err(transport)?;
        let body = Self::read_json(response).await?;
        Record::many_from_json(kind, &body).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn create_record(&self, record: &NewRecord) -> Result<Record, StoreError> {
        let url = self.collection_url(record.kind);
        debug!(url = %url, "Creating record");

        let response = self
            .client
            .post(&url)
            .json(&record.to_json())
            .send()
            .await
            .map_err(transport)?;
        let body = Self::read_json(response).await?;
        decode(record.kind, &body)
    }

    async fn update_record(
        &self,
        kind: EntityKind,
        id: &str,
        patch: &RecordPatch,
    ) -> Result<Record, StoreError> {
        let url = format!("{}/{}", self.collection_url(kind), id);
        debug!(url = %url, "Updating record");

        let response = self
            .client
            .patch(&url)
            .json(&patch.to_json(kind))
            .send()
            .await
            .map_err(transport)?;
        let body = Self::read_json(response).await?;
        decode(kind, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let store = RestRecordStore::new("http://localhost:4000/", Duration::from_secs(1));
        assert_eq!(store.base_url(), "http://localhost:4000");
        assert_eq!(store.collection_url(EntityKind::Deal), "http://localhost:4000/api/deals");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        // port 9 (discard) is not expected to run an HTTP server
        let store = RestRecordStore::new("http://127.0.0.1:9", Duration::from_millis(200));
        let err = store.fetch_collection(EntityKind::Lead).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
