pub mod article;
pub mod client;
pub mod http_fetcher;
pub mod reconciler;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::{CachedResponse, Item};

#[derive(Debug)]
pub enum FetchResult {
    /// New content fetched successfully
    Content {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Content not modified (HTTP 304)
    NotModified,
}

/// Raw transport: one GET, revalidating `cached` when given.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str, cached: Option<&CachedResponse>) -> Result<FetchResult>;
}

/// Fetch policy for content requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheMode {
    /// Revalidate against the cached copy; fail on transport errors.
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Serve the cached copy, falling through to the network on a miss.
    #[serde(rename = "cache", alias = "cache-only")]
    CacheOnly,
    /// Skip the cache entirely.
    #[serde(rename = "network", alias = "network-only")]
    NetworkOnly,
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(CacheMode::Default),
            "cache" | "cache-only" => Ok(CacheMode::CacheOnly),
            "network" | "network-only" => Ok(CacheMode::NetworkOnly),
            other => Err(format!(
                "Invalid cache mode: {}. Use 'default', 'cache' or 'network'",
                other
            )),
        }
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CacheMode::Default => "default",
            CacheMode::CacheOnly => "cache",
            CacheMode::NetworkOnly => "network",
        })
    }
}

/// Story list to fetch root ids from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryFilter {
    #[default]
    Top,
    New,
    Ask,
    Show,
    Jobs,
    Best,
}

impl StoryFilter {
    /// Path of the list endpoint, relative to the API base.
    pub fn endpoint(&self) -> &'static str {
        match self {
            StoryFilter::Top => "topstories.json",
            StoryFilter::New => "newstories.json",
            StoryFilter::Ask => "askstories.json",
            StoryFilter::Show => "showstories.json",
            StoryFilter::Jobs => "jobstories.json",
            StoryFilter::Best => "beststories.json",
        }
    }
}

impl FromStr for StoryFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(StoryFilter::Top),
            "new" => Ok(StoryFilter::New),
            "ask" => Ok(StoryFilter::Ask),
            "show" => Ok(StoryFilter::Show),
            "jobs" | "job" => Ok(StoryFilter::Jobs),
            "best" => Ok(StoryFilter::Best),
            other => Err(format!("Invalid story filter: {}", other)),
        }
    }
}

impl fmt::Display for StoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoryFilter::Top => "top",
            StoryFilter::New => "new",
            StoryFilter::Ask => "ask",
            StoryFilter::Show => "show",
            StoryFilter::Jobs => "jobs",
            StoryFilter::Best => "best",
        })
    }
}

/// Read access to the remote content tree.
///
/// `Ok(None)` means the API has no such item; `Err` carries a displayable
/// reason. Callers treat both as "absent" and never panic on them.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_item(&self, id: &str, mode: CacheMode) -> Result<Option<Item>>;

    async fn fetch_story_ids(&self, filter: StoryFilter, mode: CacheMode) -> Result<Vec<String>>;
}
