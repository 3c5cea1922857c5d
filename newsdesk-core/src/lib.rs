pub mod aggregator;
pub mod archive;
pub mod bypass;
pub mod cache;
pub mod config;
pub mod data;
pub mod direct;
pub mod error;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod prefs;
pub mod storage;
pub mod thumbnail;
pub mod topics;

pub use aggregator::{AggregationReport, Aggregator, FeedFailure};
pub use archive::ArchiveFallback;
pub use bypass::{Bypass, ContentStrategy, Outcome};
pub use cache::{ArticlePage, ArticleQuery, CategorySummary, Digest, DigestSection};
pub use config::AppConfig;
pub use data::{AddFeedRequest, DataApi, RefreshSummary};
pub use direct::DirectFetcher;
pub use error::{FetchError, ServiceError};
pub use feed::{default_sources, FeedSource};
pub use models::{Article, ContentFormat, ExtractedArticle, ExtractionSource};
pub use prefs::{PreferenceStats, PreferencesUpdate, UserPreferences, DEFAULT_TEXT_SIZE};
pub use storage::PreferenceStore;
pub use topics::TopicCount;
