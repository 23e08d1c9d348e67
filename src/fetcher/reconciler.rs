use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::app::{Result, StorylineError};
use crate::domain::{Item, ItemTree};
use crate::fetcher::{CacheMode, ContentSource};

pub const DEFAULT_WORKERS: usize = 8;

/// How far below the root to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Unlimited,
    /// Resolve nodes down to this level; direct kids are level 1.
    Limited(usize),
}

impl Depth {
    fn allows(&self, level: usize) -> bool {
        match self {
            Depth::Unlimited => true,
            Depth::Limited(max) => level <= *max,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Nodes that reached a final state (merged or permanently failed).
    pub completed: usize,
    /// Nodes discovered below the root.
    pub total: usize,
    pub failed: usize,
    /// Nodes that failed in a way a later retry could fix.
    pub transient_failures: usize,
}

impl ReconcileReport {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Resolves the descendants of a node into an [`ItemTree`].
///
/// Work is an explicit queue of `(id, level)` pairs drained into a
/// [`JoinSet`]; a shared semaphore caps the number of fetches in flight
/// across every reconciliation run by this instance.
pub struct TreeReconciler {
    source: Arc<dyn ContentSource>,
    semaphore: Arc<Semaphore>,
}

impl TreeReconciler {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self::with_workers(source, DEFAULT_WORKERS)
    }

    pub fn with_workers(source: Arc<dyn ContentSource>, workers: usize) -> Self {
        Self {
            source,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Bring the subtree under `root_id` up to date.
    ///
    /// The root is fetched first if the tree does not hold a usable copy;
    /// failing that is the only error returned. Every other failure is
    /// recorded on the affected node and its siblings carry on.
    /// `on_progress(completed, total)` runs after each node resolves.
    pub async fn reconcile<F>(
        &self,
        tree: &Mutex<ItemTree>,
        root_id: &str,
        depth: Depth,
        mode: CacheMode,
        mut on_progress: F,
    ) -> Result<ReconcileReport>
    where
        F: FnMut(usize, usize) + Send,
    {
        let root_kids = self.root_kids(tree, root_id, mode).await?;

        let mut report = ReconcileReport::default();
        let mut pending: VecDeque<(String, usize)> = VecDeque::new();
        if depth.allows(1) {
            report.total = root_kids.len();
            pending.extend(root_kids.into_iter().map(|kid| (kid, 1)));
        }
        on_progress(report.completed, report.total);

        let mut tasks = JoinSet::new();
        loop {
            while let Some((id, level)) = pending.pop_front() {
                let source = self.source.clone();
                let semaphore = self.semaphore.clone();
                tasks.spawn(async move {
                    let result = match semaphore.acquire_owned().await {
                        Ok(_permit) => source.fetch_item(&id, mode).await,
                        Err(_) => Err(StorylineError::Other("Worker pool closed".into())),
                    };
                    (id, level, result)
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            let (id, level, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                    report.completed += 1;
                    report.failed += 1;
                    on_progress(report.completed, report.total);
                    continue;
                }
            };

            match result {
                Ok(Some(item)) => {
                    let kids = merge(tree, &item, level).await;
                    report.completed += 1;
                    if depth.allows(level + 1) {
                        report.total += kids.len();
                        pending.extend(kids.into_iter().map(|kid| (kid, level + 1)));
                    }
                }
                Ok(None) => {
                    tracing::debug!("Item {} no longer exists", id);
                    tree.lock().await.mark_error(&id, level, "Item not found");
                    report.completed += 1;
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch item {}: {}", id, e);
                    tree.lock().await.mark_error(&id, level, e.to_string());
                    report.failed += 1;
                    if e.is_transient() {
                        report.transient_failures += 1;
                    } else {
                        report.completed += 1;
                    }
                }
            }

            on_progress(report.completed, report.total);
        }

        tracing::debug!(
            "Reconciled {}: {}/{} nodes, {} failed",
            root_id,
            report.completed,
            report.total,
            report.failed
        );
        Ok(report)
    }

    async fn root_kids(
        &self,
        tree: &Mutex<ItemTree>,
        root_id: &str,
        mode: CacheMode,
    ) -> Result<Vec<String>> {
        {
            let tree = tree.lock().await;
            if let Some(root) = tree.get(root_id).filter(|root| !root.needs_fetch()) {
                return Ok(root.kids().to_vec());
            }
        }

        let root = self
            .source
            .fetch_item(root_id, mode)
            .await?
            .ok_or_else(|| StorylineError::ItemNotFound(root_id.to_string()))?;
        Ok(merge(tree, &root, 0).await)
    }
}

async fn merge(tree: &Mutex<ItemTree>, item: &Item, level: usize) -> Vec<String> {
    let mut tree = tree.lock().await;
    tree.merge(item, level);
    item.kids().to_vec()
}
