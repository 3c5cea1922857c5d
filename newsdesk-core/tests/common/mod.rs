#![allow(dead_code)]

use std::path::PathBuf;

use newsdesk_core::{AppConfig, FeedSource};

/// Items are `(title, link, pubDate)`.
pub fn rss(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, link, date)| {
            format!(
                "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate>\
                 <description>About {title}</description></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Mock Feed</title><link>http://example.com/</link><description>mock</description>{body}</channel></rss>"#
    )
}

pub fn config(sources: Vec<FeedSource>) -> AppConfig {
    let mut config = AppConfig::default();
    config.feeds.request_timeout_seconds = 1;
    config.extraction.request_timeout_seconds = 2;
    config.sources = Some(sources);
    config
}

pub fn temp_dir(tag: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!(
        "newsdesk_{tag}_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    dir
}
