use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::Result;
use crate::config::SyncSettings;
use crate::domain::{Item, ItemTree};
use crate::fetcher::article::ArticleLoader;
use crate::fetcher::reconciler::{Depth, TreeReconciler};
use crate::fetcher::ContentSource;
use crate::scraper::{needs_scraping, ReadabilityClient};
use crate::sync::{
    CompletionLatch, Connectivity, JobState, ProgressListener, SyncJob, SyncOutcome, SyncProgress,
    SyncQueue,
};

/// Live state of one tracked job.
struct JobHandle {
    job: SyncJob,
    progress: Mutex<SyncProgress>,
    latch: CompletionLatch,
}

impl JobHandle {
    fn new(job: SyncJob) -> Self {
        let progress = SyncProgress::new(&job);
        Self {
            job,
            progress: Mutex::new(progress),
            latch: CompletionLatch::new(),
        }
    }
}

/// Drives sync jobs to completion.
///
/// Each job fetches its item first, then runs the comment tree, the article
/// download and readability extraction side by side. Sub-tasks report back
/// through the `notify_*` methods; the first call that leaves every enabled
/// part finished removes the job from the queue and fires `on_done` once.
pub struct SyncDelegate {
    settings: SyncSettings,
    source: Arc<dyn ContentSource>,
    reconciler: Arc<TreeReconciler>,
    tree: Arc<tokio::sync::Mutex<ItemTree>>,
    queue: SyncQueue,
    connectivity: Arc<dyn Connectivity>,
    article_loader: Option<Arc<dyn ArticleLoader>>,
    readability: Option<Arc<ReadabilityClient>>,
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
    jobs: Mutex<HashMap<String, Arc<JobHandle>>>,
}

impl SyncDelegate {
    pub fn new(
        settings: SyncSettings,
        source: Arc<dyn ContentSource>,
        reconciler: Arc<TreeReconciler>,
        tree: Arc<tokio::sync::Mutex<ItemTree>>,
        queue: SyncQueue,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            settings,
            source,
            reconciler,
            tree,
            queue,
            connectivity,
            article_loader: None,
            readability: None,
            listeners: RwLock::new(Vec::new()),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_article_loader(mut self, loader: Arc<dyn ArticleLoader>) -> Self {
        self.article_loader = Some(loader);
        self
    }

    pub fn with_readability(mut self, client: Arc<ReadabilityClient>) -> Self {
        self.readability = Some(client);
        self
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn add_listener(&self, listener: Arc<dyn ProgressListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(e) => error!("Listener list poisoned: {}", e),
        }
    }

    pub fn clear_listeners(&self) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.clear();
        }
    }

    /// Current state of a tracked job, if it is still running.
    pub fn job_state(&self, job_id: &str) -> Option<JobState> {
        let handle = self.handle(job_id)?;
        let progress = handle.progress.lock().ok()?;
        Some(progress.state())
    }

    /// Register a job and persist its id. Tracking an id that is already
    /// tracked keeps the existing job.
    pub fn track(&self, job: SyncJob) -> Result<()> {
        let Some(id) = job.id.clone() else {
            return Ok(());
        };
        self.queue.enqueue(&id)?;
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.entry(id).or_insert_with(|| Arc::new(JobHandle::new(job)));
        }
        Ok(())
    }

    /// Run a job. With no id, every queued id is replayed as a fresh job
    /// whose flags come from the current settings.
    pub async fn perform_sync(&self, job: SyncJob) -> Result<Vec<(String, SyncOutcome)>> {
        match job.id.clone() {
            Some(id) => {
                self.track(job)?;
                let outcome = self.run(&id).await;
                Ok(vec![(id, outcome)])
            }
            None => {
                let ids = self.queue.list_all()?;
                info!("Replaying {} queued sync jobs", ids.len());
                for id in &ids {
                    self.track(SyncJob::for_item(id.clone(), &self.settings))?;
                }
                let outcomes = join_all(ids.iter().map(|id| self.run(id))).await;
                Ok(ids.into_iter().zip(outcomes).collect())
            }
        }
    }

    /// Persist the job now and run it in the background.
    pub fn schedule_sync(self: &Arc<Self>, job: SyncJob) -> Result<JoinHandle<SyncOutcome>> {
        let id = job
            .id
            .clone()
            .ok_or_else(|| crate::app::StorylineError::Other("Cannot schedule a replay".into()))?;
        self.track(job)?;
        let delegate = self.clone();
        Ok(tokio::spawn(async move { delegate.run(&id).await }))
    }

    pub fn notify_item(&self, job_id: &str, item: &Item) {
        debug!("Sync {}: item {} fetched", job_id, item.id());
        self.update(job_id, |p| p.finish_self());
    }

    pub fn notify_comments(&self, job_id: &str, completed: usize, total: usize) {
        self.update(job_id, |p| p.update_comments(completed, total));
    }

    pub fn notify_article(&self, job_id: &str, percent: u8) {
        self.update(job_id, |p| p.update_article(percent));
    }

    pub fn notify_readability(&self, job_id: &str) {
        self.update(job_id, |p| p.finish_readability());
    }

    async fn run(&self, id: &str) -> SyncOutcome {
        let Some(handle) = self.handle(id) else {
            // Finished by a concurrent run already
            return SyncOutcome::Completed;
        };
        let job = handle.job.clone();
        let mode = self.settings.mode;

        if !self.online(&job) {
            info!("Sync {} abandoned: no connection", id);
            self.release(id);
            return SyncOutcome::Abandoned;
        }

        if let Ok(mut progress) = handle.progress.lock() {
            progress.start();
        }
        let item = match self.source.fetch_item(id, mode).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!("Sync {} dropped: item does not exist", id);
                self.drop_job(id);
                return SyncOutcome::Dropped;
            }
            Err(e) if e.is_transient() => {
                warn!("Sync {} incomplete: {}", id, e);
                self.release(id);
                return SyncOutcome::Incomplete;
            }
            Err(e) => {
                warn!("Sync {} dropped: {}", id, e);
                self.drop_job(id);
                return SyncOutcome::Dropped;
            }
        };

        self.tree.lock().await.merge(&item, 0);
        self.notify_item(id, &item);

        if !self.online(&job) {
            info!("Sync {} abandoned: connection lost", id);
            self.release(id);
            return SyncOutcome::Abandoned;
        }

        tokio::join!(
            self.sync_comments(&job, id),
            self.sync_article(&job, &item),
            self.sync_readability(&job, &item),
        );

        if handle.latch.is_fired() {
            SyncOutcome::Completed
        } else {
            self.release(id);
            if self.online(&job) {
                info!("Sync {} incomplete, will retry on next replay", id);
                SyncOutcome::Incomplete
            } else {
                info!("Sync {} abandoned: connection lost", id);
                SyncOutcome::Abandoned
            }
        }
    }

    async fn sync_comments(&self, job: &SyncJob, id: &str) {
        if !job.comments_enabled {
            return;
        }
        let result = self
            .reconciler
            .reconcile(&self.tree, id, Depth::Unlimited, self.settings.mode, |done, total| {
                self.notify_comments(id, done, total)
            })
            .await;
        match result {
            Ok(report) if !report.is_complete() => debug!(
                "Sync {}: {} comments left to retry",
                id, report.transient_failures
            ),
            Ok(_) => {}
            Err(e) => warn!("Sync {}: comment tree failed: {}", id, e),
        }
    }

    async fn sync_article(&self, job: &SyncJob, item: &Item) {
        if !job.article_enabled {
            return;
        }
        let id = item.id();
        let (Some(loader), Some(url)) = (&self.article_loader, item.remote().url.as_deref())
        else {
            self.notify_article(id, 100);
            return;
        };
        if !item.has_article() {
            self.notify_article(id, 100);
            return;
        }

        let progress = |percent: u8| self.notify_article(id, percent);
        if let Err(e) = loader.load(url, &progress).await {
            if e.is_transient() {
                warn!("Sync {}: article download interrupted: {}", id, e);
            } else {
                warn!("Sync {}: article unavailable: {}", id, e);
                self.notify_article(id, 100);
            }
        }
    }

    async fn sync_readability(&self, job: &SyncJob, item: &Item) {
        if !job.readability_enabled {
            return;
        }
        if let (Some(client), true) = (&self.readability, needs_scraping(item)) {
            client.parse(item.id(), &item.url()).await;
        }
        self.notify_readability(item.id());
    }

    fn online(&self, job: &SyncJob) -> bool {
        job.connection_enabled && self.settings.connection_enabled && self.connectivity.is_connected()
    }

    fn handle(&self, job_id: &str) -> Option<Arc<JobHandle>> {
        self.jobs.lock().ok()?.get(job_id).cloned()
    }

    /// Apply a progress change, report it, and complete the job if it is done.
    fn update(&self, job_id: &str, change: impl FnOnce(&mut SyncProgress)) {
        let Some(handle) = self.handle(job_id) else {
            debug!("Ignoring progress for unknown sync job {}", job_id);
            return;
        };
        if handle.latch.is_fired() {
            return;
        }

        let (percent, done) = match handle.progress.lock() {
            Ok(mut progress) => {
                change(&mut progress);
                (progress.percent(), progress.is_done())
            }
            Err(e) => {
                error!("Sync progress poisoned for {}: {}", job_id, e);
                return;
            }
        };

        self.each_listener(|l| l.on_progress(job_id, percent));
        if done {
            self.finish(job_id, &handle);
        }
    }

    fn finish(&self, job_id: &str, handle: &JobHandle) {
        if !handle.latch.fire() {
            return;
        }
        if let Ok(mut progress) = handle.progress.lock() {
            progress.mark_finished();
        }
        if let Err(e) = self.queue.remove(job_id) {
            warn!("Failed to remove {} from sync queue: {}", job_id, e);
        }
        self.release(job_id);
        info!("Sync {} complete", job_id);
        self.each_listener(|l| l.on_done(job_id));
    }

    /// Forget the live job but keep its queue entry.
    fn release(&self, job_id: &str) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.remove(job_id);
        }
    }

    /// Forget the job and its queue entry without reporting completion.
    fn drop_job(&self, job_id: &str) {
        if let Err(e) = self.queue.remove(job_id) {
            warn!("Failed to remove {} from sync queue: {}", job_id, e);
        }
        self.release(job_id);
    }

    fn each_listener(&self, f: impl Fn(&dyn ProgressListener)) {
        if let Ok(listeners) = self.listeners.read() {
            for listener in listeners.iter() {
                f(listener.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::StorylineError;
    use crate::domain::{ItemKind, RemoteFields};
    use crate::fetcher::{CacheMode, StoryFilter};
    use crate::store::{SqliteStore, Store};
    use crate::sync::ConnectivityFlag;
    use async_trait::async_trait;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Recorder {
        done: Mutex<Vec<String>>,
        progress: Mutex<Vec<(String, u8)>>,
    }

    impl Recorder {
        fn done_count(&self, id: &str) -> usize {
            self.done.lock().unwrap().iter().filter(|d| *d == id).count()
        }
    }

    impl ProgressListener for Recorder {
        fn on_progress(&self, job_id: &str, percent: u8) {
            self.progress
                .lock()
                .unwrap()
                .push((job_id.to_string(), percent));
        }

        fn on_done(&self, job_id: &str) {
            self.done.lock().unwrap().push(job_id.to_string());
        }
    }

    #[derive(Default)]
    struct Source {
        items: HashMap<String, RemoteFields>,
        transient: HashSet<String>,
        /// Flipped offline once the first fetch has returned.
        drop_connection: Option<Arc<ConnectivityFlag>>,
    }

    impl Source {
        fn story(mut self, id: &str, url: Option<&str>, kids: &[&str]) -> Self {
            self.items.insert(
                id.to_string(),
                RemoteFields {
                    kind: ItemKind::Story,
                    title: Some(format!("Story {}", id)),
                    url: url.map(String::from),
                    kids: kids.iter().map(|k| k.to_string()).collect(),
                    ..Default::default()
                },
            );
            self
        }

        fn comment(mut self, id: &str) -> Self {
            self.items.insert(
                id.to_string(),
                RemoteFields {
                    kind: ItemKind::Comment,
                    ..Default::default()
                },
            );
            self
        }
    }

    #[async_trait]
    impl ContentSource for Source {
        async fn fetch_item(&self, id: &str, _mode: CacheMode) -> Result<Option<Item>> {
            if self.transient.contains(id) {
                return Err(StorylineError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "refused",
                )));
            }
            let item = self.items.get(id).map(|fields| {
                let mut item = Item::new(id);
                item.populate(fields.clone());
                item
            });
            if let Some(flag) = &self.drop_connection {
                flag.set_connected(false);
            }
            Ok(item)
        }

        async fn fetch_story_ids(&self, _: StoryFilter, _: CacheMode) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    struct Article {
        transient: bool,
    }

    #[async_trait]
    impl ArticleLoader for Article {
        async fn load(&self, _url: &str, progress: &(dyn Fn(u8) + Send + Sync)) -> Result<()> {
            progress(40);
            if self.transient {
                return Err(StorylineError::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out",
                )));
            }
            progress(100);
            Ok(())
        }
    }

    struct Fixture {
        delegate: Arc<SyncDelegate>,
        store: Arc<SqliteStore>,
        recorder: Arc<Recorder>,
        connectivity: Arc<ConnectivityFlag>,
    }

    fn fixture_with(source: Source, store: Arc<SqliteStore>, settings: SyncSettings) -> Fixture {
        fixture_on(source, store, settings, Arc::new(ConnectivityFlag::new(true)))
    }

    fn fixture_on(
        source: Source,
        store: Arc<SqliteStore>,
        settings: SyncSettings,
        connectivity: Arc<ConnectivityFlag>,
    ) -> Fixture {
        let source: Arc<dyn ContentSource> = Arc::new(source);
        let delegate = SyncDelegate::new(
            settings,
            source.clone(),
            Arc::new(TreeReconciler::new(source)),
            Arc::new(tokio::sync::Mutex::new(ItemTree::new())),
            SyncQueue::new(store.clone()),
            connectivity.clone(),
        )
        .with_article_loader(Arc::new(Article { transient: false }));
        let recorder = Arc::new(Recorder::default());
        delegate.add_listener(recorder.clone());
        Fixture {
            delegate: Arc::new(delegate),
            store,
            recorder,
            connectivity,
        }
    }

    fn fixture(source: Source) -> Fixture {
        fixture_with(
            source,
            Arc::new(SqliteStore::in_memory().unwrap()),
            SyncSettings::default(),
        )
    }

    fn article_only(id: &str) -> SyncJob {
        SyncJob::for_item(id, &SyncSettings::default())
            .with_comments(false)
            .with_readability(false)
    }

    #[test]
    fn test_double_article_completion_fires_done_once() {
        let f = fixture(Source::default());
        f.delegate.track(article_only("1")).unwrap();

        f.delegate.notify_item("1", &Item::new("1"));
        f.delegate.notify_article("1", 100);
        f.delegate.notify_article("1", 100);

        assert_eq!(f.recorder.done_count("1"), 1);
        assert!(f.store.get_sync_queue().unwrap().is_empty());
    }

    #[test]
    fn test_not_done_until_every_part_reports() {
        let f = fixture(Source::default());
        f.delegate.track(article_only("1")).unwrap();

        f.delegate.notify_article("1", 100);
        assert_eq!(f.recorder.done_count("1"), 0);
        assert_eq!(f.store.get_sync_queue().unwrap(), vec!["1"]);

        f.delegate.notify_item("1", &Item::new("1"));
        assert_eq!(f.recorder.done_count("1"), 1);
    }

    #[test]
    fn test_unknown_job_notifications_are_ignored() {
        let f = fixture(Source::default());
        f.delegate.notify_article("404", 100);
        f.delegate.notify_comments("404", 1, 1);
        f.delegate.notify_readability("404");

        assert!(f.recorder.done.lock().unwrap().is_empty());
        assert!(f.recorder.progress.lock().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_completion_fires_done_once() {
        let f = fixture(Source::default());
        f.delegate.track(article_only("1")).unwrap();
        f.delegate.notify_item("1", &Item::new("1"));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let delegate = f.delegate.clone();
                std::thread::spawn(move || delegate.notify_article("1", 100))
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(f.recorder.done_count("1"), 1);
    }

    #[tokio::test]
    async fn test_sync_story_with_comments_and_article() {
        let source = Source::default()
            .story("1", Some("https://example.com/post"), &["2", "3"])
            .comment("2")
            .comment("3");
        let f = fixture(source);

        let outcomes = f
            .delegate
            .perform_sync(SyncJob::for_item("1", &SyncSettings::default()))
            .await
            .unwrap();

        assert_eq!(outcomes, vec![("1".to_string(), SyncOutcome::Completed)]);
        assert_eq!(f.recorder.done_count("1"), 1);
        assert!(f.store.get_sync_queue().unwrap().is_empty());
        assert_eq!(
            f.recorder.progress.lock().unwrap().last(),
            Some(&("1".to_string(), 100))
        );
        assert_eq!(f.delegate.job_state("1"), None);
    }

    #[tokio::test]
    async fn test_connection_lost_after_self_fetch_abandons_job() {
        let connectivity = Arc::new(ConnectivityFlag::new(true));
        let source = Source {
            drop_connection: Some(connectivity.clone()),
            ..Default::default()
        }
        .story("1", Some("https://example.com/post"), &["2"])
        .comment("2");
        let f = fixture_on(
            source,
            Arc::new(SqliteStore::in_memory().unwrap()),
            SyncSettings::default(),
            connectivity,
        );

        let outcomes = f
            .delegate
            .perform_sync(SyncJob::for_item("1", &SyncSettings::default()))
            .await
            .unwrap();

        assert_eq!(outcomes, vec![("1".to_string(), SyncOutcome::Abandoned)]);
        assert_eq!(f.recorder.done_count("1"), 0);
        assert_eq!(f.store.get_sync_queue().unwrap(), vec!["1"]);
        assert_eq!(f.delegate.job_state("1"), None);
    }

    #[tokio::test]
    async fn test_offline_job_is_abandoned_and_stays_queued() {
        let f = fixture(Source::default().story("1", None, &[]));
        f.connectivity.set_connected(false);

        let outcomes = f
            .delegate
            .perform_sync(article_only("1"))
            .await
            .unwrap();

        assert_eq!(outcomes[0].1, SyncOutcome::Abandoned);
        assert_eq!(f.recorder.done_count("1"), 0);
        assert_eq!(f.store.get_sync_queue().unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_connection_disabled_job_is_abandoned() {
        let f = fixture(Source::default().story("1", None, &[]));
        let mut job = article_only("1");
        job.connection_enabled = false;

        let outcomes = f.delegate.perform_sync(job).await.unwrap();
        assert_eq!(outcomes[0].1, SyncOutcome::Abandoned);
        assert_eq!(f.store.get_sync_queue().unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_transient_self_failure_keeps_job_queued() {
        let mut source = Source::default();
        source.transient.insert("1".into());
        let f = fixture(source);

        let outcomes = f.delegate.perform_sync(article_only("1")).await.unwrap();
        assert_eq!(outcomes[0].1, SyncOutcome::Incomplete);
        assert_eq!(f.store.get_sync_queue().unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_missing_item_is_dropped_from_queue() {
        let f = fixture(Source::default());

        let outcomes = f.delegate.perform_sync(article_only("9")).await.unwrap();
        assert_eq!(outcomes[0].1, SyncOutcome::Dropped);
        assert!(f.store.get_sync_queue().unwrap().is_empty());
        assert_eq!(f.recorder.done_count("9"), 0);
    }

    #[tokio::test]
    async fn test_interrupted_article_keeps_job_queued() {
        let source: Arc<dyn ContentSource> =
            Arc::new(Source::default().story("1", Some("https://example.com/a"), &[]));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let delegate = SyncDelegate::new(
            SyncSettings::default(),
            source.clone(),
            Arc::new(TreeReconciler::new(source)),
            Arc::new(tokio::sync::Mutex::new(ItemTree::new())),
            SyncQueue::new(store.clone()),
            Arc::new(crate::sync::AlwaysOnline),
        )
        .with_article_loader(Arc::new(Article { transient: true }));

        let outcomes = delegate.perform_sync(article_only("1")).await.unwrap();
        assert_eq!(outcomes[0].1, SyncOutcome::Incomplete);
        assert_eq!(store.get_sync_queue().unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn test_text_post_article_completes_without_download() {
        let f = fixture(Source::default().story("1", None, &[]));
        let outcomes = f.delegate.perform_sync(article_only("1")).await.unwrap();
        assert_eq!(outcomes[0].1, SyncOutcome::Completed);
    }

    #[tokio::test]
    async fn test_replay_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyline.db");
        let settings = SyncSettings {
            readability_enabled: false,
            ..Default::default()
        };
        let source = || {
            Source::default()
                .story("1", None, &["2"])
                .comment("2")
                .story("5", Some("https://example.com"), &[])
        };

        {
            let store = Arc::new(SqliteStore::new(&path).unwrap());
            let f = fixture_with(source(), store, settings.clone());
            f.connectivity.set_connected(false);
            f.delegate
                .perform_sync(SyncJob::for_item("1", &settings))
                .await
                .unwrap();
            f.delegate
                .perform_sync(SyncJob::for_item("5", &settings))
                .await
                .unwrap();
        }

        let store = Arc::new(SqliteStore::new(&path).unwrap());
        assert_eq!(store.get_sync_queue().unwrap(), vec!["1", "5"]);

        let f = fixture_with(source(), store, settings.clone());
        let outcomes = f
            .delegate
            .perform_sync(SyncJob::replay(&settings))
            .await
            .unwrap();

        assert_eq!(
            outcomes,
            vec![
                ("1".to_string(), SyncOutcome::Completed),
                ("5".to_string(), SyncOutcome::Completed)
            ]
        );
        assert!(f.store.get_sync_queue().unwrap().is_empty());
        assert_eq!(f.recorder.done_count("1"), 1);
        assert_eq!(f.recorder.done_count("5"), 1);
    }

    #[tokio::test]
    async fn test_schedule_sync_persists_before_running() {
        let f = fixture(Source::default().story("1", None, &[]));
        f.connectivity.set_connected(false);

        let handle = f.delegate.schedule_sync(article_only("1")).unwrap();
        assert_eq!(f.store.get_sync_queue().unwrap(), vec!["1"]);
        assert_eq!(handle.await.unwrap(), SyncOutcome::Abandoned);
    }
}
