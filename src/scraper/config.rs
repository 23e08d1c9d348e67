use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for readability extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Upper bound on one extraction, page load included (default: 30)
    pub timeout_secs: u64,

    /// Wait time after page load for dynamic content in milliseconds (default: 1000)
    pub wait_after_load_ms: u64,

    /// Extracted text shorter than this is treated as "nothing readable" (default: 200)
    pub min_content_length: usize,

    /// Maximum concurrent browser pages (default: 2)
    pub max_concurrency: usize,

    /// Elements stripped before scoring candidates
    pub remove_selectors: Vec<String>,

    /// User agent string to use
    pub user_agent: Option<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_secs: 30,
            wait_after_load_ms: 1000,
            min_content_length: 200,
            max_concurrency: 2,
            remove_selectors: [
                "nav", "header", "footer", "aside", "form", "script", "style", "noscript",
                "iframe", ".sidebar", ".advertisement", ".ad", ".ads", ".social-share",
                ".comments", ".related-posts",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            user_agent: None,
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn wait_after_load(&self) -> Duration {
        Duration::from_millis(self.wait_after_load_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.wait_after_load(), Duration::from_millis(1000));
        assert_eq!(config.min_content_length, 200);
        assert!(config.remove_selectors.iter().any(|s| s == "nav"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ScraperConfig = toml::from_str("timeout_secs = 5").unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_concurrency, 2);
    }
}
