use std::sync::Arc;

use crate::app::Result;
use crate::domain::Item;
use crate::store::Store;

/// Read markers, kept in the `read` table.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store + Send + Sync>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store + Send + Sync>) -> Self {
        Self { store }
    }

    /// Mark an item as viewed, durably and on the in-memory copy.
    pub fn view(&self, item: &mut Item) -> Result<()> {
        self.store.mark_read(item.id())?;
        if !item.local().viewed {
            item.set_viewed(true);
        }
        Ok(())
    }

    pub fn is_viewed(&self, item_id: &str) -> Result<bool> {
        self.store.is_read(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_view_marks_read() {
        let session = SessionManager::new(Arc::new(SqliteStore::in_memory().unwrap()));
        let mut item = Item::new("5");

        assert!(!session.is_viewed("5").unwrap());
        session.view(&mut item).unwrap();
        session.view(&mut item).unwrap();

        assert!(session.is_viewed("5").unwrap());
        assert!(item.local().viewed);
        assert_eq!(item.revision(), 1);
    }
}
