//! Readability extraction: turning an article page into plain reading text.
//!
//! ```text
//! Item (with url) → ReadabilityClient → cache hit? → Scraper → readable cache
//! ```
//!
//! The default [`Scraper`] drives headless Chrome; the browser is only
//! launched the first time an article actually needs extracting.

mod chrome;
mod config;
mod extractor;
mod readability;

pub use chrome::ChromeScraper;
pub use config::ScraperConfig;
pub use extractor::{clean_text, ContentExtractor};
pub use readability::ReadabilityClient;

use crate::app::Result;
use crate::domain::Item;
use async_trait::async_trait;

/// Result of a successful extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeResult {
    pub title: Option<String>,
    /// Plain text, paragraphs separated by blank lines
    pub content: String,
}

/// Article-extraction backend
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Extract readable text from a page. `Ok(None)` means the page loaded
    /// but had nothing worth keeping.
    async fn scrape(&self, url: &str) -> Result<Option<ScrapeResult>>;
}

/// Whether an item links to an external article that extraction applies to.
///
/// Text posts (Ask HN and the like) carry their body inline.
pub fn needs_scraping(item: &Item) -> bool {
    item.has_article()
        && item
            .remote()
            .text
            .as_deref()
            .is_none_or(|t| t.trim().is_empty())
}
