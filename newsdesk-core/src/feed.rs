use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct FeedSource {
    pub key: String,
    pub url: String,
    pub name: String,
    pub category: String,
    pub icon: String,
    /// Left out of default listings and aggregate views.
    #[serde(default)]
    pub hidden: bool,
}

impl FeedSource {
    pub fn new(key: &str, url: &str, name: &str, category: &str, icon: &str) -> Self {
        Self {
            key: key.to_owned(),
            url: url.to_owned(),
            name: name.to_owned(),
            category: category.to_owned(),
            icon: icon.to_owned(),
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new("bbc-world", "https://feeds.bbci.co.uk/news/world/rss.xml", "BBC World", "world", "🌍"),
        FeedSource::new("npr-news", "https://feeds.npr.org/1001/rss.xml", "NPR News", "world", "📻"),
        FeedSource::new("guardian-world", "https://www.theguardian.com/world/rss", "The Guardian", "world", "📰"),
        FeedSource::new("aljazeera", "https://www.aljazeera.com/xml/rss/all.xml", "Al Jazeera", "world", "🌐"),
        FeedSource::new("ars-technica", "https://feeds.arstechnica.com/arstechnica/index", "Ars Technica", "tech", "💻"),
        FeedSource::new("the-verge", "https://www.theverge.com/rss/index.xml", "The Verge", "tech", "📱"),
        FeedSource::new("hacker-news", "https://hnrss.org/frontpage", "Hacker News", "tech", "🧑‍💻"),
        FeedSource::new("wired", "https://www.wired.com/feed/rss", "Wired", "tech", "🔌"),
        FeedSource::new("science-daily", "https://www.sciencedaily.com/rss/all.xml", "ScienceDaily", "science", "🔬"),
        FeedSource::new("nasa", "https://www.nasa.gov/news-release/feed/", "NASA", "science", "🚀"),
        FeedSource::new("cnbc-business", "https://www.cnbc.com/id/10001147/device/rss/rss.html", "CNBC", "business", "💼"),
        FeedSource::new("marketwatch", "https://feeds.content.dowjones.io/public/rss/mw_topstories", "MarketWatch", "business", "📈"),
        FeedSource::new("espn", "https://www.espn.com/espn/rss/news", "ESPN", "sports", "🏟️"),
        FeedSource::new("pitchfork", "https://pitchfork.com/feed/feed-news/rss", "Pitchfork", "culture", "🎵"),
        FeedSource::new("tmz", "https://www.tmz.com/rss.xml", "TMZ", "gossip", "💋").hidden(),
        FeedSource::new("page-six", "https://pagesix.com/feed/", "Page Six", "gossip", "👀").hidden(),
    ]
}

pub type SharedRegistry = Arc<RwLock<Vec<FeedSource>>>;

pub fn shared_registry(initial: Vec<FeedSource>) -> SharedRegistry {
    Arc::new(RwLock::new(initial))
}

/// Appends `source`, replacing any entry with the same key.
pub async fn add_source(store: &SharedRegistry, source: FeedSource) {
    let mut sources = store.write().await;
    sources.retain(|existing| existing.key != source.key);
    sources.push(source);
}

pub async fn remove_source(store: &SharedRegistry, key: &str) -> bool {
    let mut sources = store.write().await;
    let before = sources.len();
    sources.retain(|existing| existing.key != key);
    sources.len() != before
}

pub async fn list_sources(store: &SharedRegistry) -> Vec<FeedSource> {
    store.read().await.clone()
}

/// Builds a registry key from a display name: `custom-` plus a lowercase slug.
pub fn custom_key(name: &str) -> String {
    let slug = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "custom-feed".to_string()
    } else {
        format!("custom-{slug}")
    }
}
