pub mod sqlite;

use crate::app::Result;
use crate::domain::{CachedResponse, SavedStory};

pub use sqlite::SqliteStore;

/// Durable local caches. Every lookup is a point lookup by item id
/// (or by URL for the response cache).
pub trait Store {
    // Saved (favorite) stories
    fn add_saved(&self, story: &SavedStory) -> Result<()>;
    fn get_saved(&self, item_id: &str) -> Result<Option<SavedStory>>;
    fn get_all_saved(&self, query: Option<&str>) -> Result<Vec<SavedStory>>;
    fn is_saved(&self, item_id: &str) -> Result<bool>;
    fn delete_saved(&self, item_id: &str) -> Result<usize>;
    fn delete_all_saved(&self, query: Option<&str>) -> Result<usize>;

    // Read markers
    fn mark_read(&self, item_id: &str) -> Result<()>;
    fn is_read(&self, item_id: &str) -> Result<bool>;

    // Extracted article text
    fn put_readable(&self, item_id: &str, content: &str) -> Result<()>;
    fn get_readable(&self, item_id: &str) -> Result<Option<String>>;

    // Persistent sync queue
    fn enqueue_sync(&self, item_id: &str) -> Result<bool>;
    fn get_sync_queue(&self) -> Result<Vec<String>>;
    fn remove_sync(&self, item_id: &str) -> Result<()>;

    // Transport-level response cache
    fn get_cached_response(&self, url: &str) -> Result<Option<CachedResponse>>;
    fn put_cached_response(&self, response: &CachedResponse) -> Result<()>;
}
