use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{redirect, Client};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::bypass::{ContentStrategy, Outcome};
use crate::config::ExtractionConfig;
use crate::error::FetchError;
use crate::models::{truncate_chars, ContentFormat, ExtractedArticle, ExtractionSource};
use crate::normalize::{normalize, render_block, visible_text};

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const FALLBACK_BLOCKS: [&str; 6] = ["p", "h1", "h2", "h3", "img", "blockquote"];
/// Never detached by pattern-based noise rules.
const PROTECTED_TAGS: [&str; 4] = ["html", "body", "main", "article"];

/// Fetches a page itself and mines the article body out of its markup.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: Client,
    config: ExtractionConfig,
    containers: Vec<Selector>,
    noise: Vec<Selector>,
}

impl DirectFetcher {
    pub fn new(config: ExtractionConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout())
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: ExtractionConfig) -> Self {
        let containers = parse_selectors(&config.container_selectors);
        let noise = parse_selectors(&config.noise_selectors);
        Self {
            client,
            config,
            containers,
            noise,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Downloads `url` and returns its normalized body (possibly empty).
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let page_url = Url::parse(url)?;
        let response = self
            .client
            .get(page_url.clone())
            .header(ACCEPT, HTML_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.text().await?;
        Ok(self.extract(&body, &page_url))
    }

    /// Strips noise, then normalizes the first container with enough visible
    /// text. Loose blocks from the whole page are collected when no container
    /// qualifies or the chosen one normalizes to too little.
    pub fn extract(&self, html: &str, page_url: &Url) -> String {
        let mut document = Html::parse_document(html);
        strip_noise(&mut document, &self.noise);

        let min = self.config.min_container_chars;
        let chosen = self
            .containers
            .iter()
            .flat_map(|selector| document.select(selector))
            .find(|candidate| visible_text(*candidate).chars().count() > min);
        if let Some(candidate) = chosen {
            let body = normalize(candidate, page_url);
            if body.chars().count() >= min {
                debug!(chars = body.len(), "article container selected");
                return truncate_chars(&body, self.config.max_direct_chars);
            }
            debug!(chars = body.len(), "article container normalized too short");
        }

        debug!("collecting page blocks");
        let body = self.collect_blocks(&document, page_url);
        truncate_chars(&body, self.config.max_direct_chars)
    }

    fn collect_blocks(&self, document: &Html, page_url: &Url) -> String {
        let mut out = String::new();
        let blocks = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|el| FALLBACK_BLOCKS.contains(&el.value().name()));
        for block in blocks {
            if block.value().name() == "p"
                && visible_text(block).chars().count() <= self.config.min_paragraph_chars
            {
                continue;
            }
            render_block(block, page_url, &mut out);
        }
        crate::normalize::collapse_newlines(&out).trim().to_string()
    }
}

impl ContentStrategy for DirectFetcher {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Direct
    }

    async fn attempt(&self, url: &str) -> Outcome {
        match self.fetch(url).await {
            Ok(content) => {
                let article = ExtractedArticle {
                    success: !content.is_empty(),
                    content,
                    format: ContentFormat::Markdown,
                    source: ExtractionSource::Direct,
                    archive_url: None,
                };
                let chars = article.content_len();
                info!(%url, chars, "direct fetch finished");
                if chars < self.config.sufficient_chars {
                    Outcome::Insufficient(article)
                } else {
                    Outcome::Ok(article)
                }
            }
            Err(err) => {
                warn!(%url, error = %err, "direct fetch failed");
                Outcome::Failed {
                    reason: err.to_string(),
                    archive_url: None,
                }
            }
        }
    }
}

pub(crate) fn parse_selectors(raw: &[String]) -> Vec<Selector> {
    raw.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!(selector = %s, error = ?e, "ignoring invalid selector");
                None
            }
        })
        .collect()
}

pub(crate) fn strip_noise(document: &mut Html, noise: &[Selector]) {
    let doomed: Vec<_> = noise
        .iter()
        .flat_map(|selector| document.select(selector))
        .filter(|el| !PROTECTED_TAGS.contains(&el.value().name()))
        .map(|el| el.id())
        .collect();
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}
