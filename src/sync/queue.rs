use std::sync::Arc;

use tracing::warn;

use crate::app::Result;
use crate::store::Store;

/// Durable list of item ids waiting to be synced.
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<dyn Store + Send + Sync>,
}

impl SyncQueue {
    pub fn new(store: Arc<dyn Store + Send + Sync>) -> Self {
        Self { store }
    }

    /// Add an id. Returns false if it was already queued.
    pub fn enqueue(&self, id: &str) -> Result<bool> {
        self.store.enqueue_sync(id)
    }

    /// Every valid queued id, oldest first. Malformed entries are deleted.
    pub fn list_all(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for id in self.store.get_sync_queue()? {
            if is_valid_id(&id) {
                ids.push(id);
            } else {
                warn!("Dropping malformed sync queue entry {:?}", id);
                if let Err(e) = self.store.remove_sync(&id) {
                    warn!("Failed to drop sync queue entry {:?}: {}", id, e);
                }
            }
        }
        Ok(ids)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.store.remove_sync(id)
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
}
