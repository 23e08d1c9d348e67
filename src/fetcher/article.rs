use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info};

use crate::adblock::AdBlocker;
use crate::app::Result;
use crate::domain::CachedResponse;
use crate::fetcher::http_fetcher::response_validators;
use crate::store::Store;

/// Downloads the external article behind a story so it can be read offline.
#[async_trait]
pub trait ArticleLoader: Send + Sync {
    /// Download `url`, calling `progress` with a percentage as bytes arrive.
    /// A successful return always ends with a report of 100.
    async fn load(&self, url: &str, progress: &(dyn Fn(u8) + Send + Sync)) -> Result<()>;
}

pub struct HttpArticleLoader {
    client: Client,
    store: Arc<dyn Store + Send + Sync>,
    adblock: Option<Arc<AdBlocker>>,
}

impl HttpArticleLoader {
    pub fn new(client: Client, store: Arc<dyn Store + Send + Sync>) -> Self {
        Self {
            client,
            store,
            adblock: None,
        }
    }

    /// Skip downloads from hosts on the block list.
    pub fn with_adblock(mut self, adblock: Arc<AdBlocker>) -> Self {
        self.adblock = Some(adblock);
        self
    }
}

#[async_trait]
impl ArticleLoader for HttpArticleLoader {
    async fn load(&self, url: &str, progress: &(dyn Fn(u8) + Send + Sync)) -> Result<()> {
        if self.adblock.as_ref().is_some_and(|a| a.is_ad(url)) {
            info!("Skipping article on blocked host: {}", url);
            progress(100);
            return Ok(());
        }

        if self.store.get_cached_response(url)?.is_some() {
            debug!("Article already cached: {}", url);
            progress(100);
            return Ok(());
        }

        let response = self.client.get(url).send().await?.error_for_status()?;

        let (etag, last_modified) = response_validators(response.headers());
        let total = response.content_length().filter(|len| *len > 0);

        let mut body = Vec::new();
        let mut last_percent = 0u8;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
            if let Some(total) = total {
                // Hold 100 back until the body is stored
                let percent = ((body.len() as u64 * 100) / total).min(99) as u8;
                if percent > last_percent {
                    last_percent = percent;
                    progress(percent);
                }
            }
        }

        debug!("Downloaded {} bytes from {}", body.len(), url);
        self.store
            .put_cached_response(&CachedResponse::new(url, body, etag, last_modified))?;
        progress(100);
        Ok(())
    }
}
