//! Fallback through a third-party snapshot service when a page looks paywalled.
//!
//! The service is asked for its newest snapshot of a URL; a redirect points at
//! the snapshot. Without one, a "submit" URL is handed back instead. That URL
//! only asks the service to start archiving, it is never polled for readiness,
//! so callers have to cope with an empty or low quality result.

use reqwest::header::LOCATION;
use reqwest::{redirect, Client};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::bypass::{ContentStrategy, Outcome};
use crate::config::ArchiveConfig;
use crate::direct::{parse_selectors, strip_noise};
use crate::error::FetchError;
use crate::models::{truncate_chars, ContentFormat, ExtractedArticle, ExtractionSource};
use crate::normalize::spaced_text;

const TEXT_NOISE: [&str; 3] = ["script", "style", "noscript"];

#[derive(Debug, Clone)]
pub struct ArchiveFallback {
    /// Does not follow redirects, so the snapshot location can be read.
    lookup_client: Client,
    client: Client,
    config: ArchiveConfig,
    content: Vec<Selector>,
    noise: Vec<Selector>,
}

impl ArchiveFallback {
    pub fn new(config: ArchiveConfig, user_agent: &str, timeout: std::time::Duration) -> Result<Self, FetchError> {
        let lookup_client = Client::builder()
            .user_agent(user_agent.to_owned())
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        let client = Client::builder()
            .user_agent(user_agent.to_owned())
            .timeout(timeout)
            .redirect(redirect::Policy::limited(10))
            .build()?;
        Ok(Self::with_clients(lookup_client, client, config))
    }

    pub fn with_clients(lookup_client: Client, client: Client, config: ArchiveConfig) -> Self {
        let content = parse_selectors(&config.content_selectors);
        let noise = parse_selectors(&TEXT_NOISE.map(String::from));
        Self {
            lookup_client,
            client,
            config,
            content,
            noise,
        }
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Location of the newest snapshot of `url`, if the service has one.
    pub async fn lookup(&self, url: &str) -> Result<Option<String>, FetchError> {
        let newest = format!("{}/newest/{}", self.base(), url);
        let response = self.lookup_client.get(newest.as_str()).send().await?;
        if !response.status().is_redirection() {
            debug!(%url, status = %response.status(), "no archived snapshot");
            return Ok(None);
        }
        let Some(location) = response.headers().get(LOCATION).and_then(|v| v.to_str().ok()) else {
            return Ok(None);
        };
        let resolved = Url::parse(&newest)?.join(location)?;
        Ok(Some(resolved.to_string()))
    }

    pub fn submit_url(&self, url: &str) -> String {
        format!("{}/submit/?url={}", self.base(), urlencoding::encode(url))
    }

    /// Snapshot link when one exists, otherwise the submit link. Never fails.
    pub async fn archive_url(&self, url: &str) -> String {
        match self.lookup(url).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => self.submit_url(url),
            Err(err) => {
                warn!(%url, error = %err, "archive lookup failed");
                self.submit_url(url)
            }
        }
    }

    pub async fn fetch_text(&self, archive_url: &str) -> Result<String, FetchError> {
        let response = self.client.get(archive_url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.text().await?;
        Ok(self.extract_text(&body))
    }

    /// Visible text of the snapshot container, then `article`, then the whole page.
    pub fn extract_text(&self, html: &str) -> String {
        let mut document = Html::parse_document(html);
        strip_noise(&mut document, &self.noise);
        let text = self
            .content
            .iter()
            .filter_map(|selector| document.select(selector).next())
            .map(spaced_text)
            .find(|text| !text.is_empty())
            .unwrap_or_else(|| spaced_text(document.root_element()));
        truncate_chars(&text, self.config.max_chars)
    }
}

impl ContentStrategy for ArchiveFallback {
    fn source(&self) -> ExtractionSource {
        ExtractionSource::Archive
    }

    async fn attempt(&self, url: &str) -> Outcome {
        let archive_url = self.archive_url(url).await;
        match self.fetch_text(&archive_url).await {
            Ok(text) => {
                let chars = text.chars().count();
                info!(%url, %archive_url, chars, "archive fetch finished");
                if chars > self.config.min_chars {
                    Outcome::Ok(ExtractedArticle {
                        content: text,
                        format: ContentFormat::Text,
                        source: ExtractionSource::Archive,
                        success: true,
                        archive_url: Some(archive_url),
                    })
                } else {
                    let mut article = ExtractedArticle::failed(ExtractionSource::Archive);
                    article.archive_url = Some(archive_url);
                    Outcome::Insufficient(article)
                }
            }
            Err(err) => {
                warn!(%url, %archive_url, error = %err, "archive fetch failed");
                Outcome::Failed {
                    reason: err.to_string(),
                    archive_url: Some(archive_url),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback(base: &str) -> ArchiveFallback {
        let config = ArchiveConfig {
            base_url: base.to_string(),
            ..ArchiveConfig::default()
        };
        ArchiveFallback::with_clients(Client::new(), Client::new(), config)
    }

    #[test]
    fn submit_url_encodes_target() {
        let archive = fallback("https://archive.ph/");
        assert_eq!(
            archive.submit_url("https://news.example/a?b=c"),
            "https://archive.ph/submit/?url=https%3A%2F%2Fnews.example%2Fa%3Fb%3Dc"
        );
    }

    #[test]
    fn extract_text_prefers_snapshot_container() {
        let archive = fallback("https://archive.ph");
        let html = r#"<html><body><div id="HEADER">Archive chrome</div>
            <div id="CONTENT"><script>ignored()</script><p>Snapshot   body</p><p>more</p></div>
            <article>Other</article></body></html>"#;
        assert_eq!(archive.extract_text(html), "Snapshot body more");
    }

    #[test]
    fn extract_text_falls_back_to_article_then_document() {
        let archive = fallback("https://archive.ph");
        assert_eq!(
            archive.extract_text("<body><p>intro</p><article><p>Story</p></article></body>"),
            "Story"
        );
        assert_eq!(
            archive.extract_text("<body><style>p{}</style><p>Only</p><p>text</p></body>"),
            "Only text"
        );
    }

    #[test]
    fn extract_text_truncates() {
        let archive = fallback("https://archive.ph");
        let html = format!("<div id=\"CONTENT\">{}</div>", "x".repeat(12_000));
        assert_eq!(archive.extract_text(&html).chars().count(), 10_000);
    }
}
