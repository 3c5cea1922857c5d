use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use reqwest::{redirect, Client};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::FetchError;
use crate::feed::FeedSource;
use crate::models::{truncate_chars, Article};
use crate::normalize::spaced_text;
use crate::thumbnail::{atom_thumbnail, rss_thumbnail};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedFailure {
    pub source_key: String,
    pub name: String,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct AggregationReport {
    /// Newest first.
    pub articles: Vec<Article>,
    pub errors: Vec<FeedFailure>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedProbe {
    pub title: String,
    pub items: usize,
}

/// Pulls every registered feed and folds the results into one article list.
#[derive(Debug, Clone)]
pub struct Aggregator {
    client: Client,
    config: FeedConfig,
}

impl Aggregator {
    pub fn new(config: FeedConfig) -> Result<Self, FetchError> {
        // The per-source deadline is enforced around the whole fetch instead.
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::limited(5))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: FeedConfig) -> Self {
        Self { client, config }
    }

    /// Raw feed body, bounded by the per-source timeout.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let timeout = self.config.request_timeout();
        let fetch = async {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(FetchError::Status(response.status()));
            }
            Ok::<_, FetchError>(response.bytes().await?.to_vec())
        };
        match tokio::time::timeout(timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }

    pub async fn fetch_source(&self, source: &FeedSource, now: DateTime<Utc>) -> Result<Vec<Article>, FetchError> {
        let bytes = self.fetch_bytes(&source.url).await?;
        parse_feed(&bytes, source, now, self.config.snippet_chars)
    }

    /// Checks that `url` serves a parseable feed and reports its title.
    pub async fn probe(&self, url: &str) -> Result<FeedProbe, FetchError> {
        let bytes = self.fetch_bytes(url).await?;
        match rss::Channel::read_from(&bytes[..]) {
            Ok(channel) => Ok(FeedProbe {
                title: channel.title().trim().to_owned(),
                items: channel.items().len(),
            }),
            Err(rss_err) => match atom_syndication::Feed::read_from(&bytes[..]) {
                Ok(feed) => Ok(FeedProbe {
                    title: feed.title().as_str().trim().to_owned(),
                    items: feed.entries().len(),
                }),
                Err(_) => Err(FetchError::from(rss_err)),
            },
        }
    }

    /// Fetches all `sources` concurrently. A failing source is recorded in
    /// the report and never affects the others.
    pub async fn aggregate(&self, sources: &[FeedSource]) -> AggregationReport {
        let now = Utc::now();
        let concurrency = self.config.max_concurrent_fetches.max(1);
        let results: Vec<(FeedSource, Result<Vec<Article>, FetchError>)> = stream::iter(sources.iter().cloned())
            .map(|source| async move {
                let result = self.fetch_source(&source, now).await;
                (source, result)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut batches = Vec::new();
        let mut errors = Vec::new();
        for (source, result) in results {
            match result {
                Ok(articles) => {
                    debug!(feed = %source.key, count = articles.len(), "feed parsed");
                    batches.push(articles);
                }
                Err(err) => {
                    warn!(feed = %source.url, error = %err, "failed to fetch feed");
                    errors.push(FeedFailure {
                        source_key: source.key.clone(),
                        name: source.name.clone(),
                        url: source.url.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let articles = merge(batches);
        info!(
            sources = sources.len(),
            failed = errors.len(),
            articles = articles.len(),
            "aggregation finished"
        );
        AggregationReport {
            articles,
            errors,
            completed_at: Utc::now(),
        }
    }
}

/// Parses RSS 2.0, falling back to Atom. The RSS error is reported when neither fits.
pub fn parse_feed(bytes: &[u8], source: &FeedSource, now: DateTime<Utc>, snippet_chars: usize) -> Result<Vec<Article>, FetchError> {
    match rss::Channel::read_from(bytes) {
        Ok(channel) => Ok(channel
            .items()
            .iter()
            .map(|item| article_from_rss_item(source, item, now, snippet_chars))
            .collect()),
        Err(rss_err) => match atom_syndication::Feed::read_from(bytes) {
            Ok(feed) => Ok(feed
                .entries()
                .iter()
                .map(|entry| article_from_atom_entry(source, entry, now, snippet_chars))
                .collect()),
            Err(_) => Err(FetchError::from(rss_err)),
        },
    }
}

pub fn article_from_rss_item(source: &FeedSource, item: &rss::Item, now: DateTime<Utc>, snippet_chars: usize) -> Article {
    let link = item.link().unwrap_or_default().trim().to_owned();
    let guid = item.guid().map(|guid| guid.value().trim()).filter(|g| !g.is_empty());
    let id = stable_id(&link, guid);

    let dublin_core = item.dublin_core_ext();
    let published_at = item
        .pub_date()
        .and_then(parse_date)
        .or_else(|| dublin_core.and_then(|dc| dc.dates().first()).and_then(|d| parse_date(d)))
        .unwrap_or(now);

    let author = dublin_core
        .and_then(|dc| dc.creators().first().map(|s| s.to_string()))
        .or_else(|| item.author().map(|s| s.to_string()));

    let full_content = item.content().or(item.description()).map(ToOwned::to_owned);
    let snippet_source = item.description().or(item.content()).unwrap_or_default();

    Article {
        id,
        title: item.title().unwrap_or_default().trim().to_owned(),
        link,
        source: source.name.clone(),
        source_key: source.key.clone(),
        category: source.category.clone(),
        icon: source.icon.clone(),
        author,
        published_at,
        content_snippet: snippet(snippet_source, snippet_chars),
        full_content,
        image: rss_thumbnail(item),
    }
}

pub fn article_from_atom_entry(
    source: &FeedSource,
    entry: &atom_syndication::Entry,
    now: DateTime<Utc>,
    snippet_chars: usize,
) -> Article {
    let link = entry
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| entry.links().first())
        .map(|l| l.href().trim().to_owned())
        .unwrap_or_default();
    let guid = Some(entry.id().trim()).filter(|g| !g.is_empty());
    let published_at = entry
        .published()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| entry.updated().with_timezone(&Utc));
    // A zero "updated" stamp means the feed left it out.
    let published_at = if published_at.timestamp() == 0 { now } else { published_at };

    let content = entry.content().and_then(|c| c.value()).map(ToOwned::to_owned);
    let summary = entry.summary().map(|s| s.as_str().to_owned());
    let snippet_source = summary.as_deref().or(content.as_deref()).unwrap_or_default();

    Article {
        id: stable_id(&link, guid),
        title: entry.title().as_str().trim().to_owned(),
        link,
        source: source.name.clone(),
        source_key: source.key.clone(),
        category: source.category.clone(),
        icon: source.icon.clone(),
        author: entry.authors().first().map(|p| p.name().to_owned()),
        published_at,
        content_snippet: snippet(snippet_source, snippet_chars),
        full_content: content.or(summary),
        image: atom_thumbnail(entry),
    }
}

fn stable_id(link: &str, guid: Option<&str>) -> String {
    if !link.is_empty() {
        Article::derive_id(link)
    } else if let Some(guid) = guid {
        Article::derive_id(guid)
    } else {
        Article::random_id()
    }
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Plain-text preview of feed markup, capped at `max` characters.
pub fn snippet(markup: &str, max: usize) -> String {
    let fragment = Html::parse_fragment(markup);
    truncate_chars(&spaced_text(fragment.root_element()), max)
}

/// Concatenates batches in arrival order, lets a repeated id overwrite the
/// earlier article in place, then sorts newest first. The sort is stable,
/// so equal timestamps keep arrival order.
pub fn merge(batches: Vec<Vec<Article>>) -> Vec<Article> {
    let mut merged: Vec<Article> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for article in batches.into_iter().flatten() {
        match positions.get(&article.id) {
            Some(&idx) => merged[idx] = article,
            None => {
                positions.insert(article.id.clone(), merged.len());
                merged.push(article);
            }
        }
    }
    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    merged
}
