use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::feed::FeedSource;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
pub const FEED_USER_AGENT: &str = "newsdesk/0.1 (personal feed reader)";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feeds: FeedConfig,
    pub extraction: ExtractionConfig,
    pub archive: ArchiveConfig,
    pub listing: ListingConfig,
    pub preferences: PreferenceLimits,
    /// Replaces the built-in registry when set.
    pub sources: Option<Vec<FeedSource>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub cache_ttl_minutes: u64,
    pub request_timeout_seconds: u64,
    pub max_concurrent_fetches: usize,
    pub snippet_chars: usize,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub request_timeout_seconds: u64,
    pub user_agent: String,
    /// Tried in order; the first match with enough text wins.
    pub container_selectors: Vec<String>,
    /// Detached from the page before any extraction.
    pub noise_selectors: Vec<String>,
    pub min_container_chars: usize,
    pub min_paragraph_chars: usize,
    pub sufficient_chars: usize,
    pub max_direct_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub content_selectors: Vec<String>,
    pub max_chars: usize,
    pub min_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub articles_per_page: usize,
    pub max_page_size: usize,
    pub category_top_n: usize,
    pub digest_per_category: usize,
    pub trending_limit: usize,
    /// Categories kept out of the topic cloud and digest, on top of hidden sources.
    pub suppressed_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceLimits {
    pub max_read_articles: usize,
    pub max_topics: usize,
    pub stats_top_n: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            cache_ttl_minutes: 15,
            request_timeout_seconds: 10,
            max_concurrent_fetches: 16,
            snippet_chars: 300,
            user_agent: FEED_USER_AGENT.to_string(),
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let container_selectors = [
            "article",
            "[class*='article-body']",
            "[class*='article-content']",
            "[class*='post-body']",
            "[class*='post-content']",
            "[class*='entry-content']",
            "[class*='entry-body']",
            ".story-body",
            ".content-body",
            "main",
        ];
        let noise_selectors = [
            "script",
            "style",
            "noscript",
            "iframe",
            "nav",
            "aside",
            ".ad",
            ".ads",
            ".advertisement",
            "[class*='advert']",
            "[id*='advert']",
            "[class*='social']",
            "[class*='share']",
            "[class*='comment']",
            "[id*='comment']",
            "[class*='related']",
            "[class*='newsletter']",
            "[class*='subscribe']",
            "[class*='promo']",
        ];
        Self {
            request_timeout_seconds: 15,
            user_agent: BROWSER_USER_AGENT.to_string(),
            container_selectors: container_selectors.iter().map(|s| s.to_string()).collect(),
            noise_selectors: noise_selectors.iter().map(|s| s.to_string()).collect(),
            min_container_chars: 200,
            min_paragraph_chars: 30,
            sufficient_chars: 500,
            max_direct_chars: 15_000,
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: "https://archive.ph".to_string(),
            content_selectors: vec!["#CONTENT".to_string(), "article".to_string()],
            max_chars: 10_000,
            min_chars: 100,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            articles_per_page: 20,
            max_page_size: 100,
            category_top_n: 5,
            digest_per_category: 3,
            trending_limit: 50,
            suppressed_categories: vec!["gossip".to_string()],
        }
    }
}

impl Default for PreferenceLimits {
    fn default() -> Self {
        Self {
            max_read_articles: 500,
            max_topics: 200,
            stats_top_n: 10,
        }
    }
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_minutes * 60)
    }
}

impl ExtractionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl AppConfig {
    /// Default location: `<config dir>/newsdesk/config.json`.
    pub fn config_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_dir = dirs::config_dir().ok_or("could not locate a configuration directory")?;
        let app_config_dir = config_dir.join("newsdesk");
        std::fs::create_dir_all(&app_config_dir)?;
        Ok(app_config_dir)
    }

    pub fn config_file_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Loads the configuration, or writes and returns the defaults.
    pub fn load() -> Self {
        match Self::config_file_path() {
            Ok(path) => Self::load_or_init(&path),
            Err(e) => {
                warn!(error = %e, "no configuration directory, using defaults");
                Self::default()
            }
        }
    }

    pub fn load_or_init(path: &Path) -> Self {
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not load configuration, using defaults");
                let default_config = Self::default();
                if let Err(save_err) = default_config.save_to(path) {
                    warn!(error = %save_err, "could not write default configuration");
                }
                default_config
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config_content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config_json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, config_json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let json = r#"{ "feeds": { "cache_ttl_minutes": 5 } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.feeds.cache_ttl_minutes, 5);
        assert_eq!(config.feeds.request_timeout_seconds, 10);
        assert_eq!(config.extraction.sufficient_chars, 500);
        assert_eq!(config.archive.max_chars, 10_000);
        assert!(config.sources.is_none());
    }

    #[test]
    fn load_or_init_writes_defaults_when_missing() {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "newsdesk_config_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let path = dir.join("config.json");

        let config = AppConfig::load_or_init(&path);
        assert_eq!(config.listing.articles_per_page, 20);
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
