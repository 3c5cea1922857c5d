//! User preferences: read history, topic likes/dislikes, custom feeds and
//! display settings. Every list is bounded; the oldest entries drop first.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::PreferenceLimits;
use crate::feed::FeedSource;
use crate::models::Article;
use crate::topics::{candidate_topics, rank_counts, TopicCount};

/// Reader text scale; 1.0 is the normal size.
pub const DEFAULT_TEXT_SIZE: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Oldest first.
    pub read_articles: Vec<String>,
    pub not_interested_topics: Vec<String>,
    pub interested_topics: Vec<String>,
    pub custom_feeds: Vec<FeedSource>,
    pub text_size: f32,
    pub reality_mode: bool,
    pub hide_read_mode: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            read_articles: Vec::new(),
            not_interested_topics: Vec::new(),
            interested_topics: Vec::new(),
            custom_feeds: Vec::new(),
            text_size: DEFAULT_TEXT_SIZE,
            reality_mode: false,
            hide_read_mode: false,
        }
    }
}

/// Partial update; `None` leaves the field untouched, topic lists are replaced wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesUpdate {
    pub text_size: Option<f32>,
    pub reality_mode: Option<bool>,
    pub hide_read_mode: Option<bool>,
    pub interested_topics: Option<Vec<String>>,
    pub not_interested_topics: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceStats {
    pub read_count: usize,
    pub custom_feed_count: usize,
    pub top_interested: Vec<TopicCount>,
    pub top_not_interested: Vec<TopicCount>,
}

impl UserPreferences {
    /// Records `id` as the most recent read. A repeat read moves it to the end.
    pub fn record_read(&mut self, id: &str, limits: &PreferenceLimits) {
        self.read_articles.retain(|existing| existing != id);
        self.read_articles.push(id.to_owned());
        keep_newest(&mut self.read_articles, limits.max_read_articles);
    }

    pub fn like_topics(&mut self, topics: &[String], limits: &PreferenceLimits) {
        push_topics(&mut self.interested_topics, topics, limits.max_topics);
    }

    pub fn dislike_topics(&mut self, topics: &[String], limits: &PreferenceLimits) {
        push_topics(&mut self.not_interested_topics, topics, limits.max_topics);
    }

    pub fn apply(&mut self, update: PreferencesUpdate, limits: &PreferenceLimits) {
        if let Some(size) = update.text_size.filter(|s| s.is_finite() && *s > 0.0) {
            self.text_size = size;
        }
        if let Some(on) = update.reality_mode {
            self.reality_mode = on;
        }
        if let Some(on) = update.hide_read_mode {
            self.hide_read_mode = on;
        }
        if let Some(topics) = update.interested_topics {
            self.interested_topics.clear();
            self.like_topics(&topics, limits);
        }
        if let Some(topics) = update.not_interested_topics {
            self.not_interested_topics.clear();
            self.dislike_topics(&topics, limits);
        }
    }

    /// Resets history, topics and settings. Custom feeds survive.
    pub fn clear(&mut self) {
        let custom_feeds = std::mem::take(&mut self.custom_feeds);
        *self = Self {
            custom_feeds,
            ..Self::default()
        };
    }

    /// Re-applies the bounds, for data written under other limits.
    pub fn enforce(&mut self, limits: &PreferenceLimits) {
        keep_newest(&mut self.read_articles, limits.max_read_articles);
        keep_newest(&mut self.interested_topics, limits.max_topics);
        keep_newest(&mut self.not_interested_topics, limits.max_topics);
    }

    pub fn stats(&self, top_n: usize) -> PreferenceStats {
        PreferenceStats {
            read_count: self.read_articles.len(),
            custom_feed_count: self.custom_feeds.len(),
            top_interested: rank_counts(self.interested_topics.iter().cloned(), top_n),
            top_not_interested: rank_counts(self.not_interested_topics.iter().cloned(), top_n),
        }
    }

    pub fn view_filter(&self) -> ViewFilter {
        ViewFilter {
            hidden_ids: if self.hide_read_mode {
                self.read_articles.iter().cloned().collect()
            } else {
                HashSet::new()
            },
            muted_topics: if self.reality_mode {
                self.not_interested_topics.iter().cloned().collect()
            } else {
                HashSet::new()
            },
        }
    }
}

/// Preference-driven pruning of the default article view.
#[derive(Debug, Clone, Default)]
pub struct ViewFilter {
    hidden_ids: HashSet<String>,
    muted_topics: HashSet<String>,
}

impl ViewFilter {
    pub fn admits(&self, article: &Article) -> bool {
        if self.hidden_ids.contains(&article.id) {
            return false;
        }
        self.muted_topics.is_empty() || !candidate_topics(&article.title).any(|token| self.muted_topics.contains(&token))
    }
}

fn normalize_topic(topic: &str) -> Option<String> {
    let topic = topic.trim().to_lowercase();
    (!topic.is_empty()).then_some(topic)
}

fn push_topics(list: &mut Vec<String>, topics: &[String], cap: usize) {
    list.extend(topics.iter().filter_map(|t| normalize_topic(t)));
    keep_newest(list, cap);
}

fn keep_newest<T>(list: &mut Vec<T>, cap: usize) {
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}
