//! Application state.

use std::sync::Arc;

use crmdesk_core::search::DEFAULT_THRESHOLD;
use crmdesk_core::RecordStore;
use crmdesk_redis::{create_broadcast_channel, BroadcastSender, CollectionEvent};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub tx: BroadcastSender,
    pub search_threshold: f64,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            tx: create_broadcast_channel(),
            search_threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_search_threshold(mut self, threshold: f64) -> Self {
        self.search_threshold = threshold;
        self
    }

    /// Broadcast a message to all WebSocket clients.
    pub fn broadcast(&self, event: CollectionEvent) {
        let _ = self.tx.send(event);
    }
}
