use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adblock::AdBlocker;
use crate::app::error::{Result, StorylineError};
use crate::config::{AdBlockConfig, Config};
use crate::domain::{Item, ItemTree};
use crate::fetcher::article::HttpArticleLoader;
use crate::fetcher::client::HackerNewsClient;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::reconciler::TreeReconciler;
use crate::fetcher::{CacheMode, ContentSource, Fetcher};
use crate::local::{FavoriteManager, SessionManager};
use crate::scraper::ReadabilityClient;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;
use crate::sync::{AlwaysOnline, SyncDelegate, SyncJob, SyncOutcome, SyncQueue};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub client: Arc<HackerNewsClient>,
    pub reconciler: Arc<TreeReconciler>,
    pub tree: Arc<Mutex<ItemTree>>,
    pub sync: Arc<SyncDelegate>,
    pub readability: Arc<ReadabilityClient>,
    pub adblock: Arc<AdBlocker>,
    pub favorites: FavoriteManager,
    pub session: SessionManager,
}

impl AppContext {
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Config::default_db_path().map_err(|e| StorylineError::Config(e.to_string()))?,
        };
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::with_store(config, Arc::new(SqliteStore::new(&db_path)?))
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        Self::with_store(config, Arc::new(SqliteStore::in_memory()?))
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let http = HttpFetcher::new(&config.api)?;
        let http_client = http.client().clone();
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(http);

        let client = Arc::new(HackerNewsClient::new(
            fetcher,
            store.clone(),
            config.api.base_url.clone(),
        ));
        let source: Arc<dyn ContentSource> = client.clone();
        let reconciler = Arc::new(TreeReconciler::with_workers(
            source.clone(),
            config.sync.workers,
        ));
        let tree = Arc::new(Mutex::new(ItemTree::new()));
        let adblock = Arc::new(load_adblock(&config.adblock));
        let readability = Arc::new(ReadabilityClient::new(
            store.clone(),
            config.scraper.clone(),
        ));

        let article_loader = HttpArticleLoader::new(http_client, store.clone())
            .with_adblock(adblock.clone());
        let sync = SyncDelegate::new(
            config.sync.clone(),
            source,
            reconciler.clone(),
            tree.clone(),
            SyncQueue::new(store.clone()),
            Arc::new(AlwaysOnline),
        )
        .with_article_loader(Arc::new(article_loader))
        .with_readability(readability.clone());

        Ok(Self {
            favorites: FavoriteManager::new(store.clone()),
            session: SessionManager::new(store.clone()),
            config,
            store,
            client,
            reconciler,
            tree,
            sync: Arc::new(sync),
            readability,
            adblock,
        })
    }

    /// Fetch an item and keep the latest copy in the shared tree.
    pub async fn load_item(&self, id: &str, mode: CacheMode) -> Result<Item> {
        let item = self
            .client
            .fetch_item(id, mode)
            .await?
            .ok_or_else(|| StorylineError::ItemNotFound(id.to_string()))?;

        let mut tree = self.tree.lock().await;
        let level = tree.get(id).map(|node| node.level).unwrap_or(0);
        tree.merge(&item, level);
        Ok(item)
    }

    /// Favorite an item and schedule it for offline sync.
    pub async fn add_favorite(&self, id: &str) -> Result<JoinHandle<SyncOutcome>> {
        let mut item = self.load_item(id, CacheMode::CacheOnly).await?;
        self.favorites.add(&mut item)?;
        if let Some(node) = self.tree.lock().await.get_mut(id) {
            if !node.local().favorite {
                node.set_favorite(true);
            }
        }
        self.sync
            .schedule_sync(SyncJob::for_item(id, &self.config.sync))
    }

    pub async fn remove_favorite(&self, id: &str) -> Result<bool> {
        let removed = self.favorites.remove(id)?;
        if let Some(node) = self.tree.lock().await.get_mut(id) {
            if node.local().favorite {
                node.set_favorite(false);
            }
        }
        Ok(removed)
    }

    /// Mark an item as viewed and return it.
    pub async fn view(&self, id: &str, mode: CacheMode) -> Result<Item> {
        let mut item = self.load_item(id, mode).await?;
        self.session.view(&mut item)?;
        if let Some(node) = self.tree.lock().await.get_mut(id) {
            if !node.local().viewed {
                node.set_viewed(true);
            }
        }
        Ok(item)
    }

    /// Readable text previously extracted for an item.
    pub fn readable(&self, id: &str) -> Result<Option<String>> {
        self.store.get_readable(id)
    }
}

fn load_adblock(config: &AdBlockConfig) -> AdBlocker {
    if !config.enabled {
        return AdBlocker::empty();
    }
    let Some(path) = config.hosts_path() else {
        return AdBlocker::empty();
    };
    if !path.exists() {
        debug!("No ad host list at {}", path.display());
        return AdBlocker::empty();
    }
    AdBlocker::load(&path).unwrap_or_else(|e| {
        warn!("Failed to load ad host list {}: {}", path.display(), e);
        AdBlocker::empty()
    })
}
