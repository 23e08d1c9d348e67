use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, StorylineError};
use crate::domain::{CachedResponse, SavedStory};
use crate::store::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| StorylineError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            StorylineError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    /// `saved.time` holds epoch milliseconds as text.
    fn parse_millis(s: &str) -> Option<DateTime<Utc>> {
        s.trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    fn saved_from_row(row: &Row<'_>) -> rusqlite::Result<SavedStory> {
        Ok(SavedStory {
            item_id: row.get(0)?,
            url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            time: row
                .get::<_, Option<String>>(3)?
                .and_then(|s| Self::parse_millis(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn add_saved(&self, story: &SavedStory) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO saved (itemid, url, title, time) VALUES (?1, ?2, ?3, ?4)",
            params![
                story.item_id,
                story.url,
                story.title,
                story.time.timestamp_millis().to_string()
            ],
        )?;
        Ok(())
    }

    fn get_saved(&self, item_id: &str) -> Result<Option<SavedStory>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT itemid, url, title, time FROM saved WHERE itemid = ?1",
                params![item_id],
                Self::saved_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn get_all_saved(&self, query: Option<&str>) -> Result<Vec<SavedStory>> {
        let conn = self.conn()?;
        let stories = match query.filter(|q| !q.is_empty()) {
            Some(q) => {
                let mut stmt = conn.prepare(
                    "SELECT itemid, url, title, time FROM saved
                     WHERE title LIKE '%' || ?1 || '%' ORDER BY CAST(time AS INTEGER) DESC",
                )?;
                let rows = stmt
                    .query_map(params![q], Self::saved_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT itemid, url, title, time FROM saved ORDER BY CAST(time AS INTEGER) DESC",
                )?;
                let rows = stmt
                    .query_map([], Self::saved_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(stories)
    }

    fn is_saved(&self, item_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM saved WHERE itemid = ?1",
            params![item_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn delete_saved(&self, item_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM saved WHERE itemid = ?1", params![item_id])?;
        Ok(deleted)
    }

    fn delete_all_saved(&self, query: Option<&str>) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = match query.filter(|q| !q.is_empty()) {
            Some(q) => conn.execute(
                "DELETE FROM saved WHERE title LIKE '%' || ?1 || '%'",
                params![q],
            )?,
            None => conn.execute("DELETE FROM saved", [])?,
        };
        Ok(deleted)
    }

    fn mark_read(&self, item_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO \"read\" (itemid) VALUES (?1)",
            params![item_id],
        )?;
        Ok(())
    }

    fn is_read(&self, item_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT itemid FROM \"read\" WHERE itemid = ?1 LIMIT 1",
                params![item_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn put_readable(&self, item_id: &str, content: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO readable (itemid, content) VALUES (?1, ?2)",
            params![item_id, content],
        )?;
        Ok(())
    }

    fn get_readable(&self, item_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let content = conn
            .query_row(
                "SELECT content FROM readable WHERE itemid = ?1 LIMIT 1",
                params![item_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(content)
    }

    fn enqueue_sync(&self, item_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO sync_queue (itemid) VALUES (?1)",
            params![item_id],
        )?;
        Ok(inserted > 0)
    }

    fn get_sync_queue(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut ids = Vec::new();
        let mut unreadable = Vec::new();
        {
            let mut stmt = conn.prepare("SELECT _id, itemid FROM sync_queue ORDER BY _id")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let rowid: i64 = row.get(0)?;
                let id = match row.get_ref(1)? {
                    ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().map(String::from),
                    _ => None,
                };
                match id {
                    Some(id) => ids.push(id),
                    None => unreadable.push(rowid),
                }
            }
        }

        // Rows that are not text cannot be addressed by item id
        for rowid in unreadable {
            tracing::warn!("Dropping unreadable sync queue row {}", rowid);
            if let Err(e) = conn.execute("DELETE FROM sync_queue WHERE _id = ?1", params![rowid]) {
                tracing::warn!("Failed to drop sync queue row {}: {}", rowid, e);
            }
        }
        Ok(ids)
    }

    fn remove_sync(&self, item_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sync_queue WHERE itemid = ?1", params![item_id])?;
        Ok(())
    }

    fn get_cached_response(&self, url: &str) -> Result<Option<CachedResponse>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                "SELECT url, body, etag, last_modified, fetched_at
                 FROM http_cache WHERE cache_key = ?1",
                params![CachedResponse::key_for(url)],
                |row| {
                    Ok(CachedResponse {
                        url: row.get(0)?,
                        body: row.get(1)?,
                        etag: row.get(2)?,
                        last_modified: row.get(3)?,
                        fetched_at: row
                            .get::<_, String>(4)
                            .ok()
                            .and_then(|s| Self::parse_datetime(&s))
                            .unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    fn put_cached_response(&self, response: &CachedResponse) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO http_cache (cache_key, url, body, etag, last_modified, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(cache_key) DO UPDATE SET
                body = ?3, etag = ?4, last_modified = ?5, fetched_at = ?6",
            params![
                response.key(),
                response.url,
                response.body,
                response.etag,
                response.last_modified,
                response.fetched_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }
}
