use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::app::Result;
use crate::scraper::{ChromeScraper, ScraperConfig, Scraper};
use crate::store::Store;

/// Readability extraction with a per-item cache in the `readable` table.
///
/// Never fails: a miss, an empty page, an extraction error and a timeout all
/// come back as `None`, and the caller treats the job as done either way.
pub struct ReadabilityClient {
    store: Arc<dyn Store + Send + Sync>,
    config: ScraperConfig,
    scraper: OnceCell<Arc<dyn Scraper>>,
    timeout: Duration,
}

impl ReadabilityClient {
    pub fn new(store: Arc<dyn Store + Send + Sync>, config: ScraperConfig) -> Self {
        let timeout = config.timeout();
        Self {
            store,
            config,
            scraper: OnceCell::new(),
            timeout,
        }
    }

    /// Use a ready-made scraper instead of launching a browser on first use.
    pub fn with_scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.scraper = OnceCell::new_with(Some(scraper));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Readable text for `item_id`, extracting it from `url` on a cache miss.
    pub async fn parse(&self, item_id: &str, url: &str) -> Option<String> {
        match self.store.get_readable(item_id) {
            Ok(Some(content)) => {
                debug!("Readable content for {} served from cache", item_id);
                return Some(content);
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read readable cache for {}: {}", item_id, e),
        }

        let scraper = match self.scraper().await {
            Ok(scraper) => scraper,
            Err(e) => {
                warn!("Readability unavailable: {}", e);
                return None;
            }
        };

        let result = match tokio::time::timeout(self.timeout, scraper.scrape(url)).await {
            Ok(Ok(Some(result))) => result,
            Ok(Ok(None)) => {
                debug!("No readable content at {}", url);
                return None;
            }
            Ok(Err(e)) => {
                warn!("Readability extraction failed for {}: {}", url, e);
                return None;
            }
            Err(_) => {
                warn!(
                    "Readability extraction timed out after {}s for {}",
                    self.timeout.as_secs(),
                    url
                );
                return None;
            }
        };

        if let Err(e) = self.store.put_readable(item_id, &result.content) {
            warn!("Failed to cache readable content for {}: {}", item_id, e);
        }
        info!("Extracted {} chars of readable text for {}", result.content.len(), item_id);
        Some(result.content)
    }

    async fn scraper(&self) -> Result<&Arc<dyn Scraper>> {
        self.scraper
            .get_or_try_init(|| async {
                let scraper = ChromeScraper::launch(self.config.clone()).await?;
                Ok(Arc::new(scraper) as Arc<dyn Scraper>)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::StorylineError;
    use crate::scraper::ScrapeResult;
    use crate::store::SqliteStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Content(&'static str),
        Empty,
        Fail,
        Hang,
    }

    struct FakeScraper {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl FakeScraper {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Scraper for FakeScraper {
        async fn scrape(&self, _url: &str) -> Result<Option<ScrapeResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Content(text) => Ok(Some(ScrapeResult {
                    title: None,
                    content: text.to_string(),
                })),
                Behavior::Empty => Ok(None),
                Behavior::Fail => Err(StorylineError::Scraper("page crashed".into())),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(None)
                }
            }
        }
    }

    fn setup(scraper: Arc<FakeScraper>) -> (ReadabilityClient, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let client = ReadabilityClient::new(store.clone(), ScraperConfig::default())
            .with_scraper(scraper);
        (client, store)
    }

    #[tokio::test]
    async fn test_parse_caches_result() {
        let scraper = FakeScraper::new(Behavior::Content("Readable body"));
        let (client, store) = setup(scraper.clone());

        let first = client.parse("1", "https://example.com/a").await;
        let second = client.parse("1", "https://example.com/a").await;

        assert_eq!(first.as_deref(), Some("Readable body"));
        assert_eq!(second, first);
        assert_eq!(scraper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_readable("1").unwrap().as_deref(), Some("Readable body"));
    }

    #[tokio::test]
    async fn test_parse_empty_and_failure_are_none() {
        let (client, store) = setup(FakeScraper::new(Behavior::Empty));
        assert_eq!(client.parse("1", "https://example.com/a").await, None);
        assert_eq!(store.get_readable("1").unwrap(), None);

        let (client, _) = setup(FakeScraper::new(Behavior::Fail));
        assert_eq!(client.parse("2", "https://example.com/b").await, None);
    }

    #[tokio::test]
    async fn test_parse_times_out() {
        let (client, _store) = setup(FakeScraper::new(Behavior::Hang));
        let client = client.with_timeout(Duration::from_millis(50));

        assert_eq!(client.parse("1", "https://example.com/slow").await, None);
    }
}
