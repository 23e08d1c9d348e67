use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};

use crate::app::Result;
use crate::config::ApiConfig;
use crate::domain::CachedResponse;
use crate::fetcher::{FetchResult, Fetcher};

/// Reqwest transport for the content API, shared with the article loader.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Request headers revalidating `cached`. Without usable validators the
/// request is unconditional and asks intermediaries not to answer from cache.
pub(crate) fn conditional_headers(cached: Option<&CachedResponse>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let validators = cached
        .into_iter()
        .flat_map(|c| [(IF_NONE_MATCH, &c.etag), (IF_MODIFIED_SINCE, &c.last_modified)]);
    for (name, value) in validators {
        if let Some(value) = value.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
            headers.insert(name, value);
        }
    }
    if headers.is_empty() {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
    headers
}

/// `(etag, last_modified)` of a response, for storing next to its body.
pub(crate) fn response_validators(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let read = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    (read(ETAG), read(LAST_MODIFIED))
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, cached: Option<&CachedResponse>) -> Result<FetchResult> {
        let response = self
            .client
            .get(url)
            .headers(conditional_headers(cached))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchResult::NotModified);
        }
        response.error_for_status_ref()?;

        let (etag, last_modified) = response_validators(response.headers());
        let body = response.bytes().await?.to_vec();
        Ok(FetchResult::Content {
            body,
            etag,
            last_modified,
        })
    }
}
