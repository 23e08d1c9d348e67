//! Background synchronization of items for offline reading.
//!
//! A sync job downloads one item, its comment tree, its article and
//! optionally its readable text. Job ids are kept in a durable queue until
//! every enabled part has finished, so jobs interrupted by a lost connection
//! or a restart are picked up again on the next replay.

pub mod delegate;
pub mod job;
pub mod listener;
pub mod progress;
pub mod queue;

use std::sync::atomic::{AtomicBool, Ordering};

pub use delegate::SyncDelegate;
pub use job::SyncJob;
pub use listener::{ChannelListener, ProgressListener, SyncEvent};
pub use progress::{CompletionLatch, JobState, SyncProgress};
pub use queue::SyncQueue;

/// Network availability as seen by the sync orchestrator.
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Assumes the network is always reachable; failures surface as fetch errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysOnline;

impl Connectivity for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Connectivity flipped by the embedding application.
#[derive(Debug)]
pub struct ConnectivityFlag(AtomicBool);

impl ConnectivityFlag {
    pub fn new(connected: bool) -> Self {
        Self(AtomicBool::new(connected))
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::SeqCst);
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_connected(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a single sync job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every enabled part finished; the job left the queue.
    Completed,
    /// No connection; the job was not attempted further and stays queued.
    Abandoned,
    /// Some part failed transiently; the job stays queued for the next replay.
    Incomplete,
    /// The item cannot be synced at all; the job left the queue.
    Dropped,
}

impl SyncOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, SyncOutcome::Abandoned | SyncOutcome::Incomplete)
    }
}
