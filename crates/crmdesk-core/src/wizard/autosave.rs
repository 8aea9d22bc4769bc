//! Debounced draft persistence.
//!
//! One background task per wizard session owns every write to the draft
//! slot, so writes land in the order they were requested and a stale
//! snapshot can never overwrite a newer one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::DraftStore;

/// Default inactivity window before a draft is written.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

enum Command {
    Save(String),
    Cancel,
    Flush(oneshot::Sender<()>),
    Discard(oneshot::Sender<()>),
}

/// Handle to the auto-save task. Dropping it drops any pending write.
pub struct AutoSaver {
    tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<()>,
}

impl AutoSaver {
    /// Spawn the task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn DraftStore>, key: String, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(store, key, debounce, rx));
        Self { tx, handle }
    }

    /// Queue a snapshot; it replaces any snapshot not yet written.
    pub fn save(&self, snapshot: String) {
        if self.tx.send(Command::Save(snapshot)).is_err() {
            warn!("Auto-save task is gone; draft not queued");
        }
    }

    /// Drop the pending snapshot; the stored slot is left as it is.
    pub fn cancel(&self) {
        if self.tx.send(Command::Cancel).is_err() {
            warn!("Auto-save task is gone; nothing to cancel");
        }
    }

    /// Write the pending snapshot now. Resolves once it is stored.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Drop the pending snapshot and remove the slot.
    pub async fn discard(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Discard(ack)).is_ok() {
            let _ = done.await;
        }
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    store: Arc<dyn DraftStore>,
    key: String,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<String> = None;

    loop {
        let command = if pending.is_some() {
            tokio::select! {
                command = rx.recv() => command,
                _ = tokio::time::sleep(debounce) => {
                    if let Some(snapshot) = pending.take() {
                        write(store.as_ref(), &key, &snapshot).await;
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            // each new snapshot restarts the inactivity window
            Some(Command::Save(snapshot)) => pending = Some(snapshot),
            Some(Command::Cancel) => pending = None,
            Some(Command::Flush(ack)) => {
                if let Some(snapshot) = pending.take() {
                    write(store.as_ref(), &key, &snapshot).await;
                }
                let _ = ack.send(());
            }
            Some(Command::Discard(ack)) => {
                pending = None;
                if let Err(e) = store.remove(&key).await {
                    warn!(key = %key, error = %e, "Failed to remove draft");
                }
                let _ = ack.send(());
            }
            None => break,
        }
    }

    if pending.is_some() {
        debug!(key = %key, "Auto-save stopped with an unwritten draft");
    }
}

async fn write(store: &dyn DraftStore, key: &str, snapshot: &str) {
    match store.set(key, snapshot).await {
        Ok(()) => debug!(key = %key, bytes = snapshot.len(), "Draft saved"),
        Err(e) => warn!(key = %key, error = %e, "Failed to save draft"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryDraftStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        inner: MemoryDraftStore,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl DraftStore for CountingStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value).await
        }
        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_saves_coalesce_into_last() {
        let store = Arc::new(CountingStore::default());
        let saver = AutoSaver::spawn(store.clone(), "k".into(), Duration::from_secs(2));

        saver.save("a".into());
        tokio::time::sleep(Duration::from_millis(500)).await;
        saver.save("ab".into());
        tokio::time::sleep(Duration::from_millis(500)).await;
        saver.save("abc".into());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.get("k").await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("abc"));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::spawn(store.clone(), "k".into(), Duration::from_secs(2));
        saver.save("draft".into());
        saver.flush().await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("draft"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_drops_pending_and_removes_slot() {
        let store = Arc::new(MemoryDraftStore::new());
        store.set("k", "old").await.unwrap();
        let saver = AutoSaver::spawn(store.clone(), "k".into(), Duration::from_secs(2));

        saver.save("new".into());
        saver.discard().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_keeps_stored_slot() {
        let store = Arc::new(CountingStore::default());
        store.inner.set("k", "older").await.unwrap();
        let saver = AutoSaver::spawn(store.clone(), "k".into(), Duration::from_secs(2));

        saver.save("newer".into());
        saver.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("older"));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_write() {
        let store = Arc::new(MemoryDraftStore::new());
        let saver = AutoSaver::spawn(store.clone(), "k".into(), Duration::from_secs(2));
        saver.save("never".into());
        drop(saver);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
