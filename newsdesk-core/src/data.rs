use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::aggregator::{Aggregator, FeedFailure};
use crate::archive::ArchiveFallback;
use crate::bypass::Bypass;
use crate::cache::{ArticleCache, ArticlePage, ArticleQuery, CacheGeneration, CategorySummary, Digest};
use crate::config::AppConfig;
use crate::direct::DirectFetcher;
use crate::error::{FetchError, ServiceError};
use crate::feed::{add_source, custom_key, default_sources, list_sources, remove_source, shared_registry, FeedSource, SharedRegistry};
use crate::models::ExtractedArticle;
use crate::prefs::{PreferenceStats, PreferencesUpdate, UserPreferences};
use crate::storage::PreferenceStore;
use crate::topics::TopicCount;

pub const PREFERENCES_FILE: &str = "preferences.json";
const CUSTOM_CATEGORY: &str = "custom";
const CUSTOM_ICON: &str = "📰";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AddFeedRequest {
    pub url: String,
    /// Defaults to the feed's own title.
    pub name: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub articles: usize,
    pub sources: usize,
    pub errors: Vec<FeedFailure>,
    pub refreshed_at: DateTime<Utc>,
}

impl RefreshSummary {
    fn of(generation: &CacheGeneration) -> Self {
        Self {
            articles: generation.articles.len(),
            sources: generation.source_count,
            errors: generation.errors.clone(),
            refreshed_at: generation.refreshed_at,
        }
    }
}

/// Entry point for every query and mutation. Owns the feed registry, the
/// article cache, the preference store and the HTTP clients, so independent
/// instances never share state.
#[derive(Debug)]
pub struct DataApi {
    config: AppConfig,
    registry: SharedRegistry,
    cache: ArticleCache,
    aggregator: Aggregator,
    bypass: Bypass<DirectFetcher, ArchiveFallback>,
    prefs: PreferenceStore,
}

impl DataApi {
    pub async fn new(config: AppConfig, prefs: PreferenceStore) -> Result<Self, FetchError> {
        let aggregator = Aggregator::new(config.feeds.clone())?;
        let direct = DirectFetcher::new(config.extraction.clone())?;
        let archive = ArchiveFallback::new(
            config.archive.clone(),
            &config.extraction.user_agent,
            config.extraction.request_timeout(),
        )?;

        let mut sources = config.sources.clone().unwrap_or_else(default_sources);
        let custom = prefs.get().await.custom_feeds;
        for feed in custom {
            if sources.iter().any(|s| s.key == feed.key || s.url == feed.url) {
                debug!(feed = %feed.key, "custom feed shadowed by a built-in source");
                continue;
            }
            sources.push(feed);
        }

        Ok(Self {
            cache: ArticleCache::new(config.feeds.cache_ttl()),
            registry: shared_registry(sources),
            aggregator,
            bypass: Bypass::new(direct, archive),
            prefs,
            config,
        })
    }

    /// Loads preferences from `dir` (creating it if needed) and builds the API.
    pub async fn load_from_dir(config: AppConfig, dir: impl AsRef<Path>) -> Result<Self, FetchError> {
        let dir = dir.as_ref();
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!(error = %e, "failed to create data dir");
        }
        let prefs = PreferenceStore::load_from(dir.join(PREFERENCES_FILE), config.preferences.clone()).await;
        Self::new(config, prefs).await
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The current generation, aggregating first when none exists or it is
    /// stale. Concurrent callers share one aggregation.
    async fn ensure_fresh(&self) -> Arc<CacheGeneration> {
        if let Some(generation) = self.cache.fresh(Utc::now()).await {
            return generation;
        }
        let _guard = self.cache.refresh_guard().await;
        if let Some(generation) = self.cache.fresh(Utc::now()).await {
            debug!("cache refreshed by a concurrent reader");
            return generation;
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Arc<CacheGeneration> {
        let sources = list_sources(&self.registry).await;
        let report = self.aggregator.aggregate(&sources).await;
        let generation = Arc::new(CacheGeneration::build(report, &sources, &self.config.listing));
        self.cache.replace(generation.clone()).await;
        info!(
            articles = generation.articles.len(),
            errors = generation.errors.len(),
            "cache replaced"
        );
        generation
    }

    pub async fn force_refresh(&self) -> RefreshSummary {
        let _guard = self.cache.refresh_guard().await;
        let generation = self.refresh_locked().await;
        RefreshSummary::of(&generation)
    }

    pub async fn list_articles(&self, query: &ArticleQuery) -> ArticlePage {
        let generation = self.ensure_fresh().await;
        let filter = self.prefs.get().await.view_filter();
        generation.query(query, &filter, &self.config.listing)
    }

    pub async fn list_categories(&self) -> Vec<CategorySummary> {
        self.ensure_fresh().await.categories(self.config.listing.category_top_n)
    }

    pub async fn trending(&self) -> Vec<TopicCount> {
        self.ensure_fresh().await.topics.clone()
    }

    pub async fn digest(&self) -> Digest {
        self.ensure_fresh().await.digest(self.config.listing.digest_per_category)
    }

    /// Fetch errors from the latest aggregation, without triggering one.
    pub async fn last_errors(&self) -> Vec<FeedFailure> {
        self.cache.snapshot().await.map(|g| g.errors.clone()).unwrap_or_default()
    }

    pub async fn extract(&self, url: &str) -> Result<ExtractedArticle, ServiceError> {
        let url = validate_url(url)?;
        Ok(self.bypass.extract(url.as_str()).await)
    }

    pub async fn archive_url(&self, url: &str) -> Result<String, ServiceError> {
        let url = validate_url(url)?;
        Ok(self.bypass.fallback().archive_url(url.as_str()).await)
    }

    pub async fn list_feeds(&self) -> Vec<FeedSource> {
        list_sources(&self.registry).await
    }

    /// Registers a user feed after checking it parses, then refreshes the cache.
    pub async fn add_feed(&self, request: AddFeedRequest) -> Result<FeedSource, ServiceError> {
        let url = validate_url(&request.url)?;
        let sources = list_sources(&self.registry).await;
        if sources.iter().any(|s| same_feed_url(&s.url, url.as_str())) {
            return Err(ServiceError::DuplicateFeed(url.to_string()));
        }

        let probe = self
            .aggregator
            .probe(url.as_str())
            .await
            .map_err(|e| ServiceError::FeedRejected {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let name = non_empty(request.name)
            .or_else(|| non_empty(Some(probe.title)))
            .or_else(|| url.host_str().map(str::to_owned))
            .unwrap_or_else(|| url.to_string());
        let base_key = custom_key(&name);
        let mut key = base_key.clone();
        let mut n = 2;
        while sources.iter().any(|s| s.key == key) {
            key = format!("{base_key}-{n}");
            n += 1;
        }
        let feed = FeedSource::new(
            &key,
            url.as_str(),
            &name,
            &non_empty(request.category).unwrap_or_else(|| CUSTOM_CATEGORY.to_owned()),
            &non_empty(request.icon).unwrap_or_else(|| CUSTOM_ICON.to_owned()),
        );

        add_source(&self.registry, feed.clone()).await;
        self.prefs
            .update(|prefs, _| {
                prefs.custom_feeds.retain(|f| f.key != feed.key);
                prefs.custom_feeds.push(feed.clone());
            })
            .await;
        info!(feed = %feed.key, url = %feed.url, items = probe.items, "custom feed added");

        self.force_refresh().await;
        Ok(feed)
    }

    /// Removes a user-added feed. Built-in sources cannot be removed.
    pub async fn remove_feed(&self, key: &str) -> Result<FeedSource, ServiceError> {
        let removed = self
            .prefs
            .update(|prefs, _| {
                let idx = prefs.custom_feeds.iter().position(|f| f.key == key)?;
                Some(prefs.custom_feeds.remove(idx))
            })
            .await
            .ok_or_else(|| ServiceError::UnknownFeed(key.to_owned()))?;
        remove_source(&self.registry, key).await;
        self.cache.invalidate().await;
        info!(feed = %key, "custom feed removed");
        Ok(removed)
    }

    pub async fn preferences(&self) -> UserPreferences {
        self.prefs.get().await
    }

    pub async fn update_preferences(&self, update: PreferencesUpdate) -> UserPreferences {
        self.prefs
            .update(|prefs, limits| {
                prefs.apply(update, limits);
                prefs.clone()
            })
            .await
    }

    /// Resets everything except custom feeds.
    pub async fn clear_preferences(&self) -> UserPreferences {
        self.prefs
            .update(|prefs, _| {
                prefs.clear();
                prefs.clone()
            })
            .await
    }

    pub async fn mark_read(&self, id: &str, liked_topics: &[String]) -> Result<(), ServiceError> {
        let id = require_id(id)?;
        self.prefs
            .update(|prefs, limits| {
                prefs.record_read(id, limits);
                prefs.like_topics(liked_topics, limits);
            })
            .await;
        Ok(())
    }

    /// Dismisses an article: it counts as read and its topics are muted.
    pub async fn mark_not_interested(&self, id: &str, disliked_topics: &[String]) -> Result<(), ServiceError> {
        let id = require_id(id)?;
        self.prefs
            .update(|prefs, limits| {
                prefs.record_read(id, limits);
                prefs.dislike_topics(disliked_topics, limits);
            })
            .await;
        Ok(())
    }

    pub async fn preference_stats(&self) -> PreferenceStats {
        self.prefs.get().await.stats(self.config.preferences.stats_top_n)
    }
}

fn validate_url(raw: &str) -> Result<Url, ServiceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::InvalidInput("url is required".into()));
    }
    let url = Url::parse(raw).map_err(|e| ServiceError::InvalidInput(format!("invalid url {raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ServiceError::InvalidInput(format!("unsupported url scheme {other}"))),
    }
}

fn require_id(id: &str) -> Result<&str, ServiceError> {
    let id = id.trim();
    if id.is_empty() {
        Err(ServiceError::InvalidInput("article id is required".into()))
    } else {
        Ok(id)
    }
}

fn same_feed_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_must_be_present_and_http() {
        assert!(matches!(validate_url("  "), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(validate_url("not a url"), Err(ServiceError::InvalidInput(_))));
        assert!(matches!(validate_url("ftp://x.example/f"), Err(ServiceError::InvalidInput(_))));
        assert_eq!(validate_url(" https://x.example/a ").unwrap().as_str(), "https://x.example/a");
    }

    #[test]
    fn feed_urls_compare_loosely() {
        assert!(same_feed_url("https://x.example/rss/", "HTTPS://x.example/rss"));
        assert!(!same_feed_url("https://x.example/rss", "https://x.example/atom"));
    }
}
