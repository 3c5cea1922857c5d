//! Trending-topic extraction: tokenizing, stop-word removal and frequency ranking.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // function words
        "about", "above", "after", "again", "against", "also", "although", "among", "another",
        "anyone", "around", "because", "been", "before", "behind", "being", "below", "between",
        "both", "cannot", "could", "does", "doing", "done", "down", "during", "each", "either",
        "else", "even", "ever", "every", "from", "further", "going", "have", "having", "here",
        "hers", "herself", "himself", "into", "itself", "just", "less", "like", "many", "more",
        "most", "much", "must", "myself", "neither", "never", "none", "nothing", "once", "only",
        "onto", "other", "others", "ours", "ourselves", "over", "same", "shall", "should",
        "since", "some", "still", "such", "than", "that", "their", "theirs", "them",
        "themselves", "then", "there", "these", "they", "this", "those", "though", "through",
        "thus", "together", "toward", "towards", "under", "unless", "until", "upon", "very",
        "want", "were", "what", "whatever", "when", "where", "whether", "which", "while",
        "whom", "whose", "will", "with", "within", "without", "would", "your", "yours",
        "yourself", "make", "made", "says", "said", "know", "take", "come", "back", "well",
        "first", "last", "next", "people", "things", "thing", "really", "think",
        // time filler
        "today", "tonight", "tomorrow", "yesterday", "week", "weeks", "weekend", "month",
        "months", "year", "years", "hour", "hours", "minute", "minutes", "time", "times",
        "daily", "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
        "news", "update", "updates", "live", "latest", "report", "reports",
    ]
    .into_iter()
    .collect()
});

const MIN_TOKEN_CHARS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

/// Lazy iterator over the candidate topic tokens of one text.
#[derive(Debug, Clone)]
pub struct CandidateTopics {
    cleaned: String,
    pos: usize,
}

impl Iterator for CandidateTopics {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos < self.cleaned.len() {
            let rest = &self.cleaned[self.pos..];
            let start = match rest.find(|c: char| !c.is_whitespace()) {
                Some(offset) => offset,
                None => {
                    self.pos = self.cleaned.len();
                    return None;
                }
            };
            let word_rest = &rest[start..];
            let len = word_rest.find(char::is_whitespace).unwrap_or(word_rest.len());
            let word = &word_rest[..len];
            self.pos += start + len;
            if is_candidate(word) {
                return Some(word.to_owned());
            }
        }
        None
    }
}

fn is_candidate(word: &str) -> bool {
    word.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(word)
}

pub fn candidate_topics(text: &str) -> CandidateTopics {
    let cleaned = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();
    CandidateTopics { cleaned, pos: 0 }
}

/// Top `limit` tokens across `texts`, most frequent first; ties keep first-seen order.
pub fn topic_cloud<'a, I>(texts: I, limit: usize) -> Vec<TopicCount>
where
    I: IntoIterator<Item = &'a str>,
{
    rank_counts(texts.into_iter().flat_map(candidate_topics), limit)
}

/// Counts `items` and returns the `limit` most frequent, ties by first appearance.
pub fn rank_counts<I>(items: I, limit: usize) -> Vec<TopicCount>
where
    I: IntoIterator<Item = String>,
{
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut seen = 0usize;
    for item in items {
        let entry = counts.entry(item).or_insert_with(|| {
            seen += 1;
            (0, seen)
        });
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(topic, (count, order))| (topic, count, order))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(topic, count, _)| TopicCount { topic, count })
        .collect()
}
