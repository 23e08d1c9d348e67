use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Semaphore;

use crate::app::{Result, StorylineError};
use crate::scraper::config::ScraperConfig;
use crate::scraper::extractor::{ContentExtractor, Extracted};
use crate::scraper::{ScrapeResult, Scraper};

/// Headless Chrome running the readability script, via chromiumoxide
pub struct ChromeScraper {
    browser: Arc<Browser>,
    config: ScraperConfig,
    extractor: ContentExtractor,
    semaphore: Semaphore,
}

impl ChromeScraper {
    /// Launch a browser with the given configuration
    pub async fn launch(config: ScraperConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--blink-settings=imagesEnabled=false");

        if !config.headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| StorylineError::Scraper(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            StorylineError::Scraper(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::info!("Launched headless browser for readability extraction");

        Ok(Self {
            browser: Arc::new(browser),
            semaphore: Semaphore::new(config.max_concurrency.max(1)),
            extractor: ContentExtractor::new(config.clone()),
            config,
        })
    }

    async fn extract(&self, page: &Page) -> Result<Extracted> {
        if let Some(ref ua) = self.config.user_agent {
            page.set_user_agent(ua)
                .await
                .map_err(|e| StorylineError::Scraper(format!("Failed to set user agent: {}", e)))?;
        }

        page.wait_for_navigation()
            .await
            .map_err(|e| StorylineError::Scraper(format!("Navigation failed: {}", e)))?;

        tokio::time::sleep(self.config.wait_after_load()).await;

        page.evaluate(self.extractor.extraction_script())
            .await
            .map_err(|e| StorylineError::Scraper(format!("Script execution failed: {}", e)))?
            .into_value()
            .map_err(|e| StorylineError::Scraper(format!("Failed to parse result: {:?}", e)))
    }
}

#[async_trait]
impl Scraper for ChromeScraper {
    async fn scrape(&self, url: &str) -> Result<Option<ScrapeResult>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| StorylineError::Scraper(format!("Semaphore error: {}", e)))?;

        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| StorylineError::Scraper(format!("Failed to create page: {}", e)))?;

        let extracted = self.extract(&page).await;

        // Close the page even when extraction failed
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }

        let extracted = extracted?;
        let title = extracted.title.clone().filter(|t| !t.trim().is_empty());
        Ok(self
            .extractor
            .finish(extracted)
            .map(|content| ScrapeResult { title, content }))
    }
}
