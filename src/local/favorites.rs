use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::app::Result;
use crate::domain::{Item, SavedStory};
use crate::store::Store;

/// Favorites, kept in the `saved` table.
#[derive(Clone)]
pub struct FavoriteManager {
    store: Arc<dyn Store + Send + Sync>,
}

impl FavoriteManager {
    pub fn new(store: Arc<dyn Store + Send + Sync>) -> Self {
        Self { store }
    }

    /// Save an item and flag it as favorite.
    pub fn add(&self, item: &mut Item) -> Result<()> {
        self.store.add_saved(&SavedStory::from_item(item))?;
        if !item.local().favorite {
            item.set_favorite(true);
        }
        Ok(())
    }

    /// Returns false if the item was not a favorite.
    pub fn remove(&self, item_id: &str) -> Result<bool> {
        Ok(self.store.delete_saved(item_id)? > 0)
    }

    /// Remove every favorite whose title matches `query`, or all of them.
    pub fn clear(&self, query: Option<&str>) -> Result<usize> {
        self.store.delete_all_saved(query)
    }

    pub fn is_favorite(&self, item_id: &str) -> Result<bool> {
        self.store.is_saved(item_id)
    }

    /// Newest first.
    pub fn list(&self, query: Option<&str>) -> Result<Vec<SavedStory>> {
        self.store.get_all_saved(query)
    }

    /// Write favorites to a plain text file, one block per story.
    pub fn export(&self, path: &Path, query: Option<&str>) -> Result<usize> {
        let stories = self.list(query)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut out = BufWriter::new(fs::File::create(path)?);
        for story in &stories {
            writeln!(out, "{}", story.title)?;
            writeln!(out, "{}", story.url)?;
            writeln!(out, "{}", story.web_url())?;
            writeln!(out)?;
        }
        out.flush()?;

        info!("Exported {} favorites to {}", stories.len(), path.display());
        Ok(stories.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RemoteFields;
    use crate::store::SqliteStore;

    fn story(id: &str, title: &str) -> Item {
        let mut item = Item::new(id);
        item.populate(RemoteFields {
            title: Some(title.to_string()),
            url: Some(format!("https://example.com/{}", id)),
            ..Default::default()
        });
        item
    }

    fn manager() -> FavoriteManager {
        FavoriteManager::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[test]
    fn test_add_sets_local_flag_once() {
        let favorites = manager();
        let mut item = story("1", "Rust 2.0");

        favorites.add(&mut item).unwrap();
        let revision = item.revision();
        favorites.add(&mut item).unwrap();

        assert!(item.local().favorite);
        assert_eq!(item.revision(), revision);
        assert!(favorites.is_favorite("1").unwrap());
        assert_eq!(favorites.list(None).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let favorites = manager();
        favorites.add(&mut story("1", "Rust news")).unwrap();
        favorites.add(&mut story("2", "Go news")).unwrap();
        favorites.add(&mut story("3", "Rust tips")).unwrap();

        assert!(favorites.remove("2").unwrap());
        assert!(!favorites.remove("2").unwrap());
        assert_eq!(favorites.clear(Some("Rust")).unwrap(), 2);
        assert!(favorites.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_export_writes_one_block_per_story() {
        let favorites = manager();
        favorites.add(&mut story("8863", "Dropbox")).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("favorites.txt");
        assert_eq!(favorites.export(&path, None).unwrap(), 1);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "Dropbox\nhttps://example.com/8863\nhttps://news.ycombinator.com/item?id=8863\n\n"
        );
    }
}
