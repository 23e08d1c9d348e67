//! Host-name ad blocking.
//!
//! The block list is compiled into an immutable suffix trie. Readers load the
//! current trie without locking; a reload builds a replacement off to the side
//! and swaps it in whole, so a query never sees a half-built list.

pub mod trie;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;
use url::Url;

use crate::app::Result;

pub use trie::{TrieBuilder, TrieNode};

pub struct AdBlocker {
    hosts: ArcSwap<TrieNode>,
}

impl fmt::Debug for AdBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdBlocker")
            .field("empty", &self.hosts.load().is_empty())
            .finish()
    }
}

impl Default for AdBlocker {
    fn default() -> Self {
        Self::empty()
    }
}

impl AdBlocker {
    /// A blocker that lets everything through.
    pub fn empty() -> Self {
        Self {
            hosts: ArcSwap::new(Arc::new(TrieNode::default())),
        }
    }

    /// Build from a newline-delimited host list.
    pub fn from_hosts(list: &str) -> Self {
        Self {
            hosts: ArcSwap::new(Arc::new(compile(list))),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let list = std::fs::read_to_string(path)?;
        let blocker = Self::from_hosts(&list);
        info!("Loaded ad host list from {}", path.display());
        Ok(blocker)
    }

    /// Re-read the host list from disk and swap it in.
    ///
    /// On a read error the current list stays active.
    pub fn reload(&self, path: &Path) -> Result<()> {
        let list = std::fs::read_to_string(path)?;
        self.replace_hosts(&list);
        info!("Reloaded ad host list from {}", path.display());
        Ok(())
    }

    pub fn replace_hosts(&self, list: &str) {
        self.hosts.store(Arc::new(compile(list)));
    }

    pub fn is_ad_host(&self, host: &str) -> bool {
        self.hosts.load().matches(host)
    }

    /// Check the host of a URL. Unparseable URLs and URLs without a host are
    /// never blocked.
    pub fn is_ad(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| self.is_ad_host(h)))
            .unwrap_or(false)
    }
}

fn compile(list: &str) -> TrieNode {
    let mut builder = TrieBuilder::new();
    builder.extend_from_list(list);
    builder.build()
}
