use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// A response body kept by the transport-level cache, with its validators.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub url: String,
    pub body: Vec<u8>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl CachedResponse {
    pub fn new(
        url: impl Into<String>,
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            body,
            etag,
            last_modified,
            fetched_at: Utc::now(),
        }
    }

    /// Stable cache key for a URL
    pub fn key_for(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.url)
    }
}
