use std::sync::atomic::{AtomicBool, Ordering};

use crate::sync::SyncJob;

/// Where a job stands. Comments and article run side by side; while both
/// are unfinished the job reports [`JobState::FetchingComments`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobState {
    #[default]
    Pending,
    FetchingSelf,
    FetchingComments,
    /// Article download, and readable text extraction when enabled
    FetchingArticle,
    Done,
}

/// Per-job progress. Parts that the job does not ask for count as finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    started: bool,
    finished: bool,
    self_done: bool,
    comments_done: bool,
    finished_kids: usize,
    total_kids: usize,
    article_enabled: bool,
    article_percent: u8,
    readability_done: bool,
}

impl SyncProgress {
    pub fn new(job: &SyncJob) -> Self {
        Self {
            started: false,
            finished: false,
            self_done: false,
            comments_done: !job.comments_enabled,
            finished_kids: 0,
            total_kids: 0,
            article_enabled: job.article_enabled,
            article_percent: if job.article_enabled { 0 } else { 100 },
            readability_done: !job.readability_enabled,
        }
    }

    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn finish_self(&mut self) {
        self.started = true;
        self.self_done = true;
    }

    /// Mark the job as completed and reported.
    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub fn state(&self) -> JobState {
        if self.finished || self.is_done() {
            JobState::Done
        } else if !self.started {
            JobState::Pending
        } else if !self.self_done {
            JobState::FetchingSelf
        } else if !self.comments_done {
            JobState::FetchingComments
        } else {
            JobState::FetchingArticle
        }
    }

    pub fn update_comments(&mut self, completed: usize, total: usize) {
        self.finished_kids = completed.min(total);
        self.total_kids = total;
        self.comments_done = completed >= total;
    }

    pub fn update_article(&mut self, percent: u8) {
        self.article_percent = self.article_percent.max(percent.min(100));
    }

    pub fn finish_readability(&mut self) {
        self.readability_done = true;
    }

    pub fn is_done(&self) -> bool {
        self.self_done && self.comments_done && self.article_percent == 100 && self.readability_done
    }

    /// Overall progress, weighting the article as 100 units and every other
    /// node (the item itself and each comment) as one.
    pub fn percent(&self) -> u8 {
        let article_weight = if self.article_enabled { 100 } else { 0 };
        let article_units = if self.article_enabled {
            self.article_percent as usize
        } else {
            0
        };

        let done = usize::from(self.self_done) + self.finished_kids + article_units;
        let total = 1 + self.total_kids + article_weight;
        ((done * 100) / total).min(100) as u8
    }
}

/// Fires at most once, no matter how many callers race on it.
#[derive(Debug, Default)]
pub struct CompletionLatch(AtomicBool);

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for exactly one caller.
    pub fn fire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_fired(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
