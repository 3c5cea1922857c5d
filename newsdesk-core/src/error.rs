use thiserror::Error;

/// Failure scoped to a single remote resource (feed, page or archive snapshot).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed parsing error: {0}")]
    Parse(#[from] rss::Error),
    #[error("atom parsing error: {0}")]
    Atom(#[from] atom_syndication::Error),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Rejection surfaced to whoever called into [`crate::DataApi`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("feed {url} rejected: {reason}")]
    FeedRejected { url: String, reason: String },
    #[error("a feed with url {0} is already registered")]
    DuplicateFeed(String),
    #[error("no custom feed with key {0}")]
    UnknownFeed(String),
}
