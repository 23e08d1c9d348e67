//! Content source for the Hacker News Firebase API.
//!
//! Implements the three fetch policies on top of a raw [`Fetcher`] and the
//! `http_cache` table:
//!
//! - [`CacheMode::Default`] sends the stored validators and serves the cached
//!   body on `304 Not Modified`.
//! - [`CacheMode::NetworkOnly`] sends no validators and refreshes the cache.
//! - [`CacheMode::CacheOnly`] serves the cached body, and on a miss falls
//!   through to the default path. A miss is never an error.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::app::{Result, StorylineError};
use crate::domain::{CachedResponse, Item, LocalState};
use crate::fetcher::{CacheMode, ContentSource, FetchResult, Fetcher, StoryFilter};
use crate::normalizer::Normalizer;
use crate::store::Store;

pub const BASE_API_URL: &str = "https://hacker-news.firebaseio.com/v0/";
pub const BASE_WEB_URL: &str = "https://news.ycombinator.com";

/// Maximum item requests in flight for [`HackerNewsClient::fetch_items`].
pub const MAX_CONCURRENT_ITEMS: usize = 8;

pub struct HackerNewsClient {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    store: Arc<dyn Store + Send + Sync>,
    normalizer: Normalizer,
    base_url: String,
}

impl HackerNewsClient {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        store: Arc<dyn Store + Send + Sync>,
        base_url: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            fetcher,
            store,
            normalizer: Normalizer::new(),
            base_url,
        }
    }

    pub fn item_url(&self, id: &str) -> String {
        format!("{}item/{}.json", self.base_url, id)
    }

    pub fn stories_url(&self, filter: StoryFilter) -> String {
        format!("{}{}", self.base_url, filter.endpoint())
    }

    /// Fetch many items with bounded concurrency, keeping request order.
    /// Ids that fail or do not exist are skipped.
    pub async fn fetch_items(&self, ids: &[String], mode: CacheMode) -> Vec<Item> {
        stream::iter(ids)
            .map(|id| async move {
                match self.fetch_item(id, mode).await {
                    Ok(item) => item,
                    Err(e) => {
                        warn!("Failed to fetch item {}: {}", id, e);
                        None
                    }
                }
            })
            .buffered(MAX_CONCURRENT_ITEMS)
            .filter_map(|item| async move { item })
            .collect()
            .await
    }

    async fn load(&self, url: &str, mode: CacheMode) -> Result<Vec<u8>> {
        match mode {
            CacheMode::Default => self.revalidate(url).await,
            CacheMode::NetworkOnly => self.fetch_fresh(url).await,
            CacheMode::CacheOnly => match self.store.get_cached_response(url) {
                Ok(Some(cached)) => {
                    debug!("Cache hit for {}", url);
                    Ok(cached.body)
                }
                Ok(None) => {
                    debug!("Cache miss for {}, falling back to network", url);
                    self.revalidate(url).await
                }
                Err(e) => {
                    warn!("Cache lookup failed for {}: {}", url, e);
                    self.revalidate(url).await
                }
            },
        }
    }

    /// Conditional GET using whatever validators the cache holds.
    async fn revalidate(&self, url: &str) -> Result<Vec<u8>> {
        let cached = self.store.get_cached_response(url).unwrap_or_else(|e| {
            warn!("Cache lookup failed for {}: {}", url, e);
            None
        });

        match self.fetcher.fetch(url, cached.as_ref()).await? {
            FetchResult::NotModified => match cached {
                Some(c) => {
                    debug!("{} not modified", url);
                    Ok(c.body)
                }
                // Validators came from the cache, so this only happens if the
                // entry vanished between lookup and response.
                None => self.fetch_fresh(url).await,
            },
            FetchResult::Content {
                body,
                etag,
                last_modified,
            } => Ok(self.remember(url, body, etag, last_modified)),
        }
    }

    async fn fetch_fresh(&self, url: &str) -> Result<Vec<u8>> {
        match self.fetcher.fetch(url, None).await? {
            FetchResult::Content {
                body,
                etag,
                last_modified,
            } => Ok(self.remember(url, body, etag, last_modified)),
            FetchResult::NotModified => Err(StorylineError::Other(format!(
                "Unexpected 304 for unconditional request to {}",
                url
            ))),
        }
    }

    fn remember(
        &self,
        url: &str,
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Vec<u8> {
        let response = CachedResponse::new(url, body, etag, last_modified);
        if let Err(e) = self.store.put_cached_response(&response) {
            warn!("Failed to cache response for {}: {}", url, e);
        }
        response.body
    }

    fn local_state(&self, id: &str) -> LocalState {
        let favorite = self.store.is_saved(id).unwrap_or_else(|e| {
            warn!("Failed to check saved state for {}: {}", id, e);
            false
        });
        let viewed = self.store.is_read(id).unwrap_or_else(|e| {
            warn!("Failed to check read state for {}: {}", id, e);
            false
        });
        LocalState::new(favorite, viewed)
    }
}

#[async_trait]
impl ContentSource for HackerNewsClient {
    async fn fetch_item(&self, id: &str, mode: CacheMode) -> Result<Option<Item>> {
        let body = self.load(&self.item_url(id), mode).await?;

        let Some(remote) = self.normalizer.normalize_item(&body)? else {
            debug!("Item {} does not exist", id);
            return Ok(None);
        };

        if remote.id != id {
            warn!("Requested item {} but API returned {}", id, remote.id);
        }

        let mut item = Item::with_local_state(id, self.local_state(id));
        item.populate(remote.fields);
        Ok(Some(item))
    }

    async fn fetch_story_ids(&self, filter: StoryFilter, mode: CacheMode) -> Result<Vec<String>> {
        let body = self.load(&self.stories_url(filter), mode).await?;
        self.normalizer.normalize_story_ids(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use std::sync::Mutex;

    /// Scripted transport that records every request it sees.
    struct ScriptedFetcher {
        responses: Mutex<Vec<Result<FetchResult>>>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<FetchResult>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_etag(&self) -> Option<String> {
            self.calls.lock().unwrap().last().and_then(|c| c.1.clone())
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str, cached: Option<&CachedResponse>) -> Result<FetchResult> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), cached.and_then(|c| c.etag.clone())));
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(StorylineError::Other("no scripted response".into()));
            }
            responses.remove(0)
        }
    }

    fn content(body: &str, etag: &str) -> Result<FetchResult> {
        Ok(FetchResult::Content {
            body: body.as_bytes().to_vec(),
            etag: Some(etag.to_string()),
            last_modified: None,
        })
    }

    fn client_with(
        responses: Vec<Result<FetchResult>>,
    ) -> (HackerNewsClient, Arc<ScriptedFetcher>, Arc<SqliteStore>) {
        let fetcher = Arc::new(ScriptedFetcher::new(responses));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let client = HackerNewsClient::new(fetcher.clone(), store.clone(), "https://api.test/v0");
        (client, fetcher, store)
    }

    #[tokio::test]
    async fn test_cache_only_miss_fetches_once() {
        let (client, fetcher, _store) =
            client_with(vec![content(r#"{"id": 1, "type": "story", "title": "Hi"}"#, "\"a\"")]);

        let item = client
            .fetch_item("1", CacheMode::CacheOnly)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.display_title(), "Hi");
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_only_hit_skips_network() {
        let (client, fetcher, _store) =
            client_with(vec![content(r#"{"id": 1, "title": "Cached"}"#, "\"a\"")]);

        client.fetch_item("1", CacheMode::Default).await.unwrap();
        let item = client
            .fetch_item("1", CacheMode::CacheOnly)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.display_title(), "Cached");
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_default_revalidates_with_etag() {
        let (client, fetcher, _store) = client_with(vec![
            content(r#"{"id": 1, "title": "First"}"#, "\"v1\""),
            Ok(FetchResult::NotModified),
        ]);

        client.fetch_item("1", CacheMode::Default).await.unwrap();
        let item = client
            .fetch_item("1", CacheMode::Default)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetcher.call_count(), 2);
        assert_eq!(fetcher.last_etag().as_deref(), Some("\"v1\""));
        assert_eq!(item.display_title(), "First");
    }

    #[tokio::test]
    async fn test_network_only_ignores_validators() {
        let (client, fetcher, store) = client_with(vec![
            content(r#"{"id": 1, "title": "Old"}"#, "\"v1\""),
            content(r#"{"id": 1, "title": "New"}"#, "\"v2\""),
        ]);

        client.fetch_item("1", CacheMode::Default).await.unwrap();
        let item = client
            .fetch_item("1", CacheMode::NetworkOnly)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(item.display_title(), "New");
        assert_eq!(fetcher.last_etag(), None);
        let cached = store
            .get_cached_response(&client.item_url("1"))
            .unwrap()
            .unwrap();
        assert_eq!(cached.etag.as_deref(), Some("\"v2\""));
    }

    #[tokio::test]
    async fn test_default_fails_on_transport_error() {
        let (client, _fetcher, _store) = client_with(vec![Err(StorylineError::Other(
            "connection refused".into(),
        ))]);

        let result = client.fetch_item("1", CacheMode::Default).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_null_item_is_absent() {
        let (client, _fetcher, _store) = client_with(vec![content("null", "\"a\"")]);
        assert!(client
            .fetch_item("404", CacheMode::Default)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_fetch_item_restores_local_state() {
        let (client, _fetcher, store) =
            client_with(vec![content(r#"{"id": 3, "title": "Saved"}"#, "\"a\"")]);
        store.mark_read("3").unwrap();
        store
            .add_saved(&crate::domain::SavedStory {
                item_id: "3".into(),
                url: "https://example.com".into(),
                title: "Saved".into(),
                time: chrono::Utc::now(),
            })
            .unwrap();

        let item = client
            .fetch_item("3", CacheMode::Default)
            .await
            .unwrap()
            .unwrap();
        assert!(item.local().favorite);
        assert!(item.local().viewed);
        assert_eq!(item.revision(), 1);
    }

    #[tokio::test]
    async fn test_fetch_story_ids() {
        let (client, fetcher, _store) = client_with(vec![content("[3, 2, 1]", "\"a\"")]);
        let ids = client
            .fetch_story_ids(StoryFilter::Best, CacheMode::NetworkOnly)
            .await
            .unwrap();
        assert_eq!(ids, vec!["3", "2", "1"]);
        assert_eq!(
            fetcher.calls.lock().unwrap()[0].0,
            "https://api.test/v0/beststories.json"
        );
    }

    #[tokio::test]
    async fn test_fetch_items_skips_failures() {
        let (client, _fetcher, _store) = client_with(vec![
            content(r#"{"id": 1, "title": "One"}"#, "\"a\""),
            Err(StorylineError::Other("boom".into())),
        ]);

        let ids = vec!["1".to_string(), "2".to_string()];
        let items = client.fetch_items(&ids, CacheMode::Default).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), "1");
    }
}
