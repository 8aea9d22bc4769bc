//! Broadcast channel for real-time collection updates.
//!
//! Uses a tokio broadcast channel for in-process fan-out to WebSocket
//! clients. Views treat every event as a cue to refetch.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Collection change notifications.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum CollectionEvent {
    /// The named resource collection changed; cached snapshots are stale.
    Invalidated { resource: String },
}

impl CollectionEvent {
    pub fn invalidated(resource: &str) -> Self {
        Self::Invalidated {
            resource: resource.to_string(),
        }
    }

    pub fn resource(&self) -> &str {
        match self {
            Self::Invalidated { resource } => resource,
        }
    }
}

/// Type alias for the broadcast sender.
pub type BroadcastSender = broadcast::Sender<CollectionEvent>;

/// Type alias for the broadcast receiver.
pub type BroadcastReceiver = broadcast::Receiver<CollectionEvent>;

/// Create a new broadcast channel with default capacity.
pub fn create_broadcast_channel() -> BroadcastSender {
    let (tx, _rx) = broadcast::channel(100);
    tx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let json = serde_json::to_value(CollectionEvent::invalidated("deals")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "Invalidated", "data": { "resource": "deals" } }));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let tx = create_broadcast_channel();
        let mut rx = tx.subscribe();
        tx.send(CollectionEvent::invalidated("leads")).unwrap();
        assert_eq!(rx.recv().await.unwrap().resource(), "leads");
    }
}
