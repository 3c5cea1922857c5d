//! The live article cache and every view derived from it.
//!
//! A [`CacheGeneration`] is built once per aggregation and never mutated; the
//! cache swaps the whole generation behind an `Arc`. Listing filters run
//! against a snapshot.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::aggregator::{AggregationReport, FeedFailure};
use crate::config::ListingConfig;
use crate::feed::FeedSource;
use crate::models::Article;
use crate::prefs::ViewFilter;
use crate::topics::{topic_cloud, TopicCount};

#[derive(Debug, Clone)]
pub struct CacheGeneration {
    /// Newest first.
    pub articles: Vec<Article>,
    pub errors: Vec<FeedFailure>,
    pub topics: Vec<TopicCount>,
    pub refreshed_at: DateTime<Utc>,
    pub source_count: usize,
    hidden_sources: HashSet<String>,
    hidden_categories: HashSet<String>,
}

impl CacheGeneration {
    pub fn build(report: AggregationReport, sources: &[FeedSource], listing: &ListingConfig) -> Self {
        let hidden_sources: HashSet<String> = sources.iter().filter(|s| s.hidden).map(|s| s.key.clone()).collect();

        // A category is hidden when every source feeding it is hidden.
        let mut visible_categories = HashSet::new();
        let mut hidden_categories: HashSet<String> = listing.suppressed_categories.iter().cloned().collect();
        for source in sources {
            if source.hidden {
                hidden_categories.insert(source.category.clone());
            } else {
                visible_categories.insert(source.category.clone());
            }
        }
        hidden_categories.retain(|c| !visible_categories.contains(c) || listing.suppressed_categories.contains(c));

        let topics = topic_cloud(
            report
                .articles
                .iter()
                .filter(|a| !hidden_categories.contains(&a.category))
                .map(|a| a.title.as_str()),
            listing.trending_limit,
        );

        Self {
            articles: report.articles,
            errors: report.errors,
            topics,
            refreshed_at: report.completed_at,
            source_count: sources.len(),
            hidden_sources,
            hidden_categories,
        }
    }

    pub fn is_hidden(&self, article: &Article) -> bool {
        self.hidden_sources.contains(&article.source_key) || self.hidden_categories.contains(&article.category)
    }

    pub fn is_hidden_category(&self, category: &str) -> bool {
        self.hidden_categories.contains(category)
    }

    pub fn query(&self, query: &ArticleQuery, filter: &ViewFilter, listing: &ListingConfig) -> ArticlePage {
        let explicit = query.category.is_some() || query.source.is_some();
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let matching: Vec<&Article> = self
            .articles
            .iter()
            .filter(|a| query.category.as_deref().map_or(true, |c| a.category.eq_ignore_ascii_case(c)))
            .filter(|a| query.source.as_deref().map_or(true, |s| a.source_key == s))
            .filter(|a| explicit || (!self.is_hidden(a) && filter.admits(a)))
            .filter(|a| {
                needle.as_deref().map_or(true, |n| {
                    a.title.to_lowercase().contains(n) || a.content_snippet.to_lowercase().contains(n)
                })
            })
            .collect();

        let limit = query
            .limit
            .unwrap_or(listing.articles_per_page)
            .clamp(1, listing.max_page_size.max(1));
        let page = query.page.max(1);
        let articles = matching
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(|a| (*a).clone())
            .collect();

        ArticlePage {
            articles,
            total: matching.len(),
            page,
            limit,
            last_updated: self.refreshed_at,
        }
    }

    /// Every category with its article count and most recent articles.
    pub fn categories(&self, top_n: usize) -> Vec<CategorySummary> {
        let mut grouped: BTreeMap<&str, Vec<&Article>> = BTreeMap::new();
        for article in &self.articles {
            grouped.entry(article.category.as_str()).or_default().push(article);
        }
        grouped
            .into_iter()
            .map(|(category, articles)| CategorySummary {
                category: category.to_owned(),
                count: articles.len(),
                hidden: self.is_hidden_category(category),
                recent: articles.into_iter().take(top_n).cloned().collect(),
            })
            .collect()
    }

    /// Top articles per visible category. `total` counts every article the
    /// digest drew from, not only the ones shown.
    pub fn digest(&self, per_category: usize) -> Digest {
        let mut grouped: BTreeMap<&str, Vec<&Article>> = BTreeMap::new();
        let mut total = 0;
        for article in self.articles.iter().filter(|a| !self.is_hidden(a)) {
            total += 1;
            grouped.entry(article.category.as_str()).or_default().push(article);
        }
        Digest {
            sections: grouped
                .into_iter()
                .map(|(category, articles)| DigestSection {
                    category: category.to_owned(),
                    articles: articles.into_iter().take(per_category).cloned().collect(),
                })
                .collect(),
            total,
            generated_at: self.refreshed_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ArticleQuery {
    pub category: Option<String>,
    /// Registry key of a single source.
    pub source: Option<String>,
    pub search: Option<String>,
    /// 1-based; 0 is read as 1.
    pub page: usize,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    pub articles: Vec<Article>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
    pub hidden: bool,
    pub recent: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestSection {
    pub category: String,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Digest {
    pub sections: Vec<DigestSection>,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
}

/// Whether a generation finished at `refreshed_at` is older than `ttl` by `now`.
/// An age of exactly `ttl` is still fresh.
pub fn is_stale(refreshed_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    // A timestamp in the future (clock skew) counts as fresh.
    (now - refreshed_at).to_std().map_or(false, |age| age > ttl)
}

#[derive(Debug)]
pub struct ArticleCache {
    current: RwLock<Option<Arc<CacheGeneration>>>,
    refresh: Mutex<()>,
    ttl: Duration,
}

impl ArticleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            current: RwLock::new(None),
            refresh: Mutex::new(()),
            ttl,
        }
    }

    pub async fn snapshot(&self) -> Option<Arc<CacheGeneration>> {
        self.current.read().await.clone()
    }

    /// The current generation, unless there is none or it has gone stale.
    pub async fn fresh(&self, now: DateTime<Utc>) -> Option<Arc<CacheGeneration>> {
        self.snapshot()
            .await
            .filter(|generation| !is_stale(generation.refreshed_at, now, self.ttl))
    }

    pub async fn replace(&self, generation: Arc<CacheGeneration>) {
        *self.current.write().await = Some(generation);
    }

    /// Drops the current generation so the next read refreshes.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
    }

    /// Held for the duration of an aggregation so only one runs at a time.
    pub async fn refresh_guard(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 21, 9, minute, 0).unwrap()
    }

    fn article(id: &str, source_key: &str, category: &str, minute: u32, title: &str) -> Article {
        Article {
            id: id.into(),
            title: title.into(),
            link: format!("http://e/{id}"),
            source: source_key.to_uppercase(),
            source_key: source_key.into(),
            category: category.into(),
            icon: String::new(),
            author: None,
            published_at: at(minute),
            content_snippet: format!("snippet for {title}"),
            full_content: None,
            image: None,
        }
    }

    fn generation() -> CacheGeneration {
        let sources = vec![
            FeedSource::new("wire", "http://wire/rss", "Wire", "world", "🌍"),
            FeedSource::new("gadgets", "http://gadgets/rss", "Gadgets", "tech", "💻"),
            FeedSource::new("tabloid", "http://tabloid/rss", "Tabloid", "gossip", "💋").hidden(),
        ];
        let report = AggregationReport {
            articles: vec![
                article("t1", "tabloid", "gossip", 50, "Celebrity celebrity celebrity wedding"),
                article("w1", "wire", "world", 40, "Summit talks resume"),
                article("g1", "gadgets", "tech", 30, "Phone launch delayed"),
                article("w2", "wire", "world", 20, "Summit ends without deal"),
                article("g2", "gadgets", "tech", 10, "Chip shortage eases"),
            ],
            errors: Vec::new(),
            completed_at: at(55),
        };
        CacheGeneration::build(report, &sources, &ListingConfig::default())
    }

    fn ids(page: &ArticlePage) -> Vec<&str> {
        page.articles.iter().map(|a| a.id.as_str()).collect()
    }

    #[test]
    fn default_view_hides_hidden_sources_but_explicit_filter_shows_them() {
        let generation = generation();
        let listing = ListingConfig::default();
        let all = generation.query(&ArticleQuery::default(), &ViewFilter::default(), &listing);
        assert_eq!(ids(&all), vec!["w1", "g1", "w2", "g2"]);
        assert_eq!(all.total, 4);
        assert_eq!(all.last_updated, at(55));

        let gossip = ArticleQuery {
            category: Some("gossip".into()),
            ..ArticleQuery::default()
        };
        assert_eq!(ids(&generation.query(&gossip, &ViewFilter::default(), &listing)), vec!["t1"]);

        let by_source = ArticleQuery {
            source: Some("tabloid".into()),
            ..ArticleQuery::default()
        };
        assert_eq!(generation.query(&by_source, &ViewFilter::default(), &listing).total, 1);
    }

    #[test]
    fn unknown_category_is_an_empty_page() {
        let generation = generation();
        let query = ArticleQuery {
            category: Some("astrology".into()),
            ..ArticleQuery::default()
        };
        let page = generation.query(&query, &ViewFilter::default(), &ListingConfig::default());
        assert!(page.articles.is_empty());
        assert_eq!(page.total, 0);
    }

    #[test]
    fn search_and_paging() {
        let generation = generation();
        let listing = ListingConfig::default();
        let search = ArticleQuery {
            search: Some("SUMMIT".into()),
            ..ArticleQuery::default()
        };
        assert_eq!(ids(&generation.query(&search, &ViewFilter::default(), &listing)), vec!["w1", "w2"]);

        let second = ArticleQuery {
            page: 2,
            limit: Some(3),
            ..ArticleQuery::default()
        };
        let page = generation.query(&second, &ViewFilter::default(), &listing);
        assert_eq!(ids(&page), vec!["g2"]);
        assert_eq!(page.total, 4);
        assert_eq!(page.limit, 3);

        let huge = ArticleQuery {
            limit: Some(10_000),
            ..ArticleQuery::default()
        };
        assert_eq!(generation.query(&huge, &ViewFilter::default(), &listing).limit, listing.max_page_size);
    }

    #[test]
    fn topic_cloud_skips_hidden_categories() {
        let generation = generation();
        assert!(generation.topics.iter().all(|t| t.topic != "celebrity"));
        assert_eq!(generation.topics[0], TopicCount { topic: "summit".into(), count: 2 });
    }

    #[test]
    fn categories_flag_hidden_and_cap_recent() {
        let summaries = generation().categories(1);
        let names: Vec<_> = summaries.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(names, vec!["gossip", "tech", "world"]);
        assert!(summaries[0].hidden);
        assert_eq!(summaries[2].count, 2);
        assert_eq!(summaries[2].recent.len(), 1);
        assert_eq!(summaries[2].recent[0].id, "w1");
    }

    #[test]
    fn digest_excludes_hidden_categories() {
        let digest = generation().digest(3);
        assert_eq!(digest.total, 4);
        assert!(digest.sections.iter().all(|s| s.category != "gossip"));
        assert_eq!(digest.sections.len(), 2);
    }

    #[test]
    fn staleness_threshold() {
        let ttl = Duration::from_secs(15 * 60);
        assert!(!is_stale(at(0), at(14), ttl));
        assert!(!is_stale(at(0), at(15), ttl));
        assert!(is_stale(at(0), at(15) + chrono::Duration::seconds(1), ttl));
        assert!(!is_stale(at(10), at(0), ttl));
    }

    #[tokio::test]
    async fn fresh_returns_none_once_stale() {
        let cache = ArticleCache::new(Duration::from_secs(60));
        assert!(cache.fresh(at(0)).await.is_none());

        cache.replace(Arc::new(generation())).await;
        assert!(cache.fresh(at(55)).await.is_some());
        assert!(cache.fresh(at(57)).await.is_none());

        cache.invalidate().await;
        assert!(cache.snapshot().await.is_none());
    }
}
