use crate::config::SyncSettings;

/// A request to sync one item, or with no id, to replay the whole queue.
///
/// Flags are never persisted: a replayed job takes them from the current
/// [`SyncSettings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub id: Option<String>,
    pub connection_enabled: bool,
    pub article_enabled: bool,
    pub comments_enabled: bool,
    pub readability_enabled: bool,
}

impl SyncJob {
    pub fn from_settings(id: Option<String>, settings: &SyncSettings) -> Self {
        Self {
            id,
            connection_enabled: settings.connection_enabled,
            article_enabled: settings.article_enabled,
            comments_enabled: settings.comments_enabled,
            readability_enabled: settings.readability_enabled,
        }
    }

    /// Sync a single item with flags from `settings`.
    pub fn for_item(id: impl Into<String>, settings: &SyncSettings) -> Self {
        Self::from_settings(Some(id.into()), settings)
    }

    /// Replay every queued id.
    pub fn replay(settings: &SyncSettings) -> Self {
        Self::from_settings(None, settings)
    }

    pub fn with_article(mut self, enabled: bool) -> Self {
        self.article_enabled = enabled;
        self
    }

    pub fn with_comments(mut self, enabled: bool) -> Self {
        self.comments_enabled = enabled;
        self
    }

    pub fn with_readability(mut self, enabled: bool) -> Self {
        self.readability_enabled = enabled;
        self
    }

    pub fn is_replay(&self) -> bool {
        self.id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_follow_settings() {
        let settings = SyncSettings {
            article_enabled: false,
            readability_enabled: true,
            ..Default::default()
        };
        let job = SyncJob::for_item("42", &settings);

        assert_eq!(job.id.as_deref(), Some("42"));
        assert!(job.connection_enabled);
        assert!(!job.article_enabled);
        assert!(job.comments_enabled);
        assert!(job.readability_enabled);
    }

    #[test]
    fn test_replay_has_no_id() {
        let job = SyncJob::replay(&SyncSettings::default()).with_comments(false);
        assert!(job.is_replay());
        assert!(!job.comments_enabled);
    }
}
