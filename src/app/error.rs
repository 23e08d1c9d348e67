use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorylineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed payload: {0}")]
    Payload(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Scraper error: {0}")]
    Scraper(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl StorylineError {
    /// Whether retrying the same request later could succeed.
    ///
    /// Connection failures and timeouts are transient; an HTTP error status,
    /// a payload that does not decode, or a missing item are not.
    pub fn is_transient(&self) -> bool {
        match self {
            StorylineError::Http(e) => !e.is_status() && !e.is_decode() && !e.is_builder(),
            StorylineError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorylineError>;
