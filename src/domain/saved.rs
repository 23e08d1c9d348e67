use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Item;

/// A favorite ("saved") story record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedStory {
    pub item_id: String,
    pub url: String,
    pub title: String,
    pub time: DateTime<Utc>,
}

impl SavedStory {
    pub fn from_item(item: &Item) -> Self {
        Self {
            item_id: item.id().to_string(),
            url: item.url(),
            title: item.display_title().to_string(),
            time: Utc::now(),
        }
    }

    pub fn web_url(&self) -> String {
        format!(
            "{}/item?id={}",
            crate::fetcher::client::BASE_WEB_URL,
            self.item_id
        )
    }
}
