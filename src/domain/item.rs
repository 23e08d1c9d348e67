use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::LocalState;

/// Item type tag as reported by the content API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    Story,
    Comment,
    Job,
    Poll,
    PollOpt,
    #[serde(other)]
    Unknown,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Story => "story",
            ItemKind::Comment => "comment",
            ItemKind::Job => "job",
            ItemKind::Poll => "poll",
            ItemKind::PollOpt => "pollopt",
            ItemKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "story" => ItemKind::Story,
            "comment" => ItemKind::Comment,
            "job" => ItemKind::Job,
            "poll" => ItemKind::Poll,
            "pollopt" => ItemKind::PollOpt,
            _ => ItemKind::Unknown,
        })
    }
}

/// Fields owned by the remote API. A merge replaces all of them at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteFields {
    pub kind: ItemKind,
    pub title: Option<String>,
    pub url: Option<String>,
    pub by: Option<String>,
    pub text: Option<String>,
    pub score: i64,
    /// Creation time in seconds since the epoch.
    pub time: i64,
    pub parent: Option<String>,
    pub kids: Vec<String>,
    pub descendants: Option<i64>,
    pub dead: bool,
    pub deleted: bool,
}

/// One node of the content tree: a story, a comment, a job or a poll.
///
/// Remote-owned and local-owned state live in two disjoint groups.
/// [`Item::populate`] only accepts [`RemoteFields`], so a refresh can never
/// clobber favorite/viewed/collapsed state. Every merge and every local
/// mutation bumps the revision by exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: String,
    remote: RemoteFields,
    local: LocalState,
    revision: u64,
    populated: bool,
    /// Child count snapshot taken before the latest unacknowledged merge.
    previous_kid_count: Option<usize>,
    /// Depth within the tree it was reconciled into (root = 0).
    pub level: usize,
    /// Set when the last fetch for this node failed; cleared by the next merge.
    pub fetch_error: Option<String>,
}

impl Item {
    /// An empty placeholder, as created when a parent lists this id as a kid.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_local_state(id, LocalState::default())
    }

    /// A placeholder carrying local state restored from the durable caches.
    pub fn with_local_state(id: impl Into<String>, local: LocalState) -> Self {
        Self {
            id: id.into(),
            remote: RemoteFields::default(),
            local,
            revision: 0,
            populated: false,
            previous_kid_count: None,
            level: 0,
            fetch_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn remote(&self) -> &RemoteFields {
        &self.remote
    }

    pub fn local(&self) -> &LocalState {
        &self.local
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether at least one remote merge has happened.
    pub fn is_populated(&self) -> bool {
        self.populated
    }

    /// Whether this node should be (re)fetched the next time it is shown.
    pub fn needs_fetch(&self) -> bool {
        !self.populated || self.fetch_error.is_some()
    }

    /// One-directional merge of freshly fetched remote state.
    ///
    /// The old child count is snapshotted into `previous_kid_count` unless a
    /// snapshot is already held, so kids that arrive over several refreshes
    /// keep being reported as new until [`Item::reset_new_kids`] is called.
    pub fn populate(&mut self, remote: RemoteFields) {
        if self.populated && self.previous_kid_count.is_none() {
            self.previous_kid_count = Some(self.kid_count());
        }
        self.remote = remote;
        self.populated = true;
        self.fetch_error = None;
        self.revision += 1;
    }

    /// Merge the remote group of another copy of this item.
    pub fn populate_from(&mut self, source: &Item) {
        self.populate(source.remote.clone());
    }

    pub fn kids(&self) -> &[String] {
        &self.remote.kids
    }

    pub fn kid_count(&self) -> usize {
        self.remote.kids.len()
    }

    pub fn last_kid_count(&self) -> Option<usize> {
        self.previous_kid_count
    }

    /// Explicitly set the baseline that new kids are counted against.
    pub fn set_last_kid_count(&mut self, count: usize) {
        self.previous_kid_count = Some(count);
    }

    pub fn has_new_kids(&self) -> bool {
        self.previous_kid_count
            .is_some_and(|previous| self.kid_count() > previous)
    }

    /// Acknowledge new kids; the next merge takes a fresh snapshot.
    pub fn reset_new_kids(&mut self) {
        self.previous_kid_count = None;
    }

    pub fn set_favorite(&mut self, favorite: bool) {
        self.local.favorite = favorite;
        self.revision += 1;
    }

    pub fn set_viewed(&mut self, viewed: bool) {
        self.local.viewed = viewed;
        self.revision += 1;
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.local.collapsed = collapsed;
        self.revision += 1;
    }

    pub fn set_content_expanded(&mut self, expanded: bool) {
        self.local.content_expanded = expanded;
        self.revision += 1;
    }

    /// Record an upvote cast from this device. Returns false if already voted.
    pub fn vote(&mut self) -> bool {
        if self.local.voted {
            return false;
        }
        self.local.voted = true;
        self.revision += 1;
        true
    }

    pub fn is_story(&self) -> bool {
        matches!(
            self.remote.kind,
            ItemKind::Story | ItemKind::Job | ItemKind::Poll
        )
    }

    pub fn display_title(&self) -> &str {
        self.remote.title.as_deref().unwrap_or("(Untitled)")
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.remote.time, 0)
    }

    /// Link to the item's discussion page on the web.
    pub fn web_url(&self) -> String {
        format!("{}/item?id={}", crate::fetcher::client::BASE_WEB_URL, self.id)
    }

    /// The external article link, or the discussion page for text posts.
    pub fn url(&self) -> String {
        self.remote
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| self.web_url())
    }

    /// Whether the item points at an external article worth downloading.
    pub fn has_article(&self) -> bool {
        self.is_story() && self.remote.url.as_deref().is_some_and(|u| !u.is_empty())
    }

    /// Host of the external article, used as the displayed source.
    pub fn source(&self) -> Option<String> {
        let url = self.remote.url.as_deref()?;
        url::Url::parse(url)
            .ok()?
            .host_str()
            .map(|h| h.trim_start_matches("www.").to_string())
    }
}
