use html_escape::decode_html_entities;
use serde::Deserialize;

use crate::app::{Result, StorylineError};
use crate::domain::{ItemKind, RemoteFields};

/// An item as decoded from the API, before it is merged anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteItem {
    pub id: String,
    pub fields: RemoteFields,
}

/// Wire shape of `item/{id}.json`.
#[derive(Debug, Deserialize)]
struct ApiItem {
    id: u64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    by: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    parent: Option<u64>,
    #[serde(default)]
    kids: Option<Vec<u64>>,
    #[serde(default)]
    descendants: Option<i64>,
    #[serde(default)]
    dead: bool,
    #[serde(default)]
    deleted: bool,
}

/// Decodes API payloads into domain values.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Decode a single item. A JSON `null` body means the API has no such item.
    pub fn normalize_item(&self, body: &[u8]) -> Result<Option<RemoteItem>> {
        let api: Option<ApiItem> =
            serde_json::from_slice(body).map_err(|e| StorylineError::Payload(e.to_string()))?;

        let Some(api) = api else {
            return Ok(None);
        };

        let fields = RemoteFields {
            kind: api
                .kind
                .as_deref()
                .map(|k| k.parse().unwrap_or(ItemKind::Unknown))
                .unwrap_or_default(),
            title: api.title.map(|t| decode_html_entities(&t).to_string()),
            url: api.url.filter(|u| !u.is_empty()),
            by: api.by,
            text: api.text,
            score: api.score.unwrap_or(0),
            time: api.time.unwrap_or(0),
            parent: api.parent.map(|p| p.to_string()),
            kids: api
                .kids
                .unwrap_or_default()
                .into_iter()
                .map(|k| k.to_string())
                .collect(),
            descendants: api.descendants,
            dead: api.dead,
            deleted: api.deleted,
        };

        Ok(Some(RemoteItem {
            id: api.id.to_string(),
            fields,
        }))
    }

    /// Decode a story list such as `topstories.json`.
    pub fn normalize_story_ids(&self, body: &[u8]) -> Result<Vec<String>> {
        let ids: Option<Vec<u64>> =
            serde_json::from_slice(body).map_err(|e| StorylineError::Payload(e.to_string()))?;
        Ok(ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| id.to_string())
            .collect())
    }
}
