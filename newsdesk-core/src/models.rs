use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub link: String,
    pub source: String,
    pub source_key: String,
    pub category: String,
    pub icon: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub content_snippet: String,
    pub full_content: Option<String>,
    pub image: Option<String>,
}

impl Article {
    /// Stable id: the first 16 bytes of the SHA-256 of `key`, hex encoded.
    pub fn derive_id(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    pub fn random_id() -> String {
        let bytes: [u8; 16] = rand::random();
        hex::encode(bytes)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    Markdown,
    Text,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    Direct,
    Archive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedArticle {
    pub content: String,
    pub format: ContentFormat,
    pub source: ExtractionSource,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_url: Option<String>,
}

impl ExtractedArticle {
    pub fn failed(source: ExtractionSource) -> Self {
        let format = match source {
            ExtractionSource::Direct => ContentFormat::Markdown,
            ExtractionSource::Archive => ContentFormat::Text,
        };
        Self {
            content: String::new(),
            format,
            source,
            success: false,
            archive_url: None,
        }
    }

    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Truncates to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_and_distinct() {
        let a = Article::derive_id("https://example.com/a");
        assert_eq!(a, Article::derive_id("https://example.com/a"));
        assert_ne!(a, Article::derive_id("https://example.com/b"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn random_ids_differ() {
        assert_ne!(Article::random_id(), Article::random_id());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn extracted_article_serializes_camel_case() {
        let mut article = ExtractedArticle::failed(ExtractionSource::Archive);
        article.archive_url = Some("https://archive.ph/abc".into());
        let json = serde_json::to_string(&article).unwrap();
        assert!(json.contains("\"archiveUrl\""));
        assert!(json.contains("\"source\":\"archive\""));
        assert!(json.contains("\"format\":\"text\""));
    }
}
