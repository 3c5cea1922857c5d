//! Ordered content strategies and the policy that picks between them.

use tracing::{debug, info};

use crate::models::{ExtractedArticle, ExtractionSource};

/// Tagged result of a single content strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Ok(ExtractedArticle),
    /// Something came back, but too little to trust (teaser or paywall page).
    Insufficient(ExtractedArticle),
    Failed {
        reason: String,
        archive_url: Option<String>,
    },
}

impl Outcome {
    pub fn article(&self) -> Option<&ExtractedArticle> {
        match self {
            Outcome::Ok(article) | Outcome::Insufficient(article) => Some(article),
            Outcome::Failed { .. } => None,
        }
    }

    fn content_len(&self) -> usize {
        self.article().map(ExtractedArticle::content_len).unwrap_or(0)
    }

    fn archive_url(&self) -> Option<&str> {
        match self {
            Outcome::Ok(article) | Outcome::Insufficient(article) => article.archive_url.as_deref(),
            Outcome::Failed { archive_url, .. } => archive_url.as_deref(),
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait ContentStrategy {
    fn source(&self) -> ExtractionSource;

    /// Never errors; failures are reported through [`Outcome::Failed`].
    async fn attempt(&self, url: &str) -> Outcome;
}

/// Whether the primary result should be backed up by the fallback strategy.
pub fn needs_fallback(primary: &Outcome) -> bool {
    !matches!(primary, Outcome::Ok(_))
}

/// Picks the final article. The fallback wins only when it succeeded and
/// carries more content than the primary result.
pub fn choose(primary: Outcome, fallback: Option<Outcome>, primary_source: ExtractionSource) -> ExtractedArticle {
    let fallback_archive_url = fallback.as_ref().and_then(|o| o.archive_url().map(str::to_owned));
    if let Some(Outcome::Ok(candidate)) = &fallback {
        if candidate.success && candidate.content_len() > primary.content_len() {
            return candidate.clone();
        }
    }

    let mut article = match primary {
        Outcome::Ok(article) | Outcome::Insufficient(article) => article,
        Outcome::Failed { .. } => ExtractedArticle::failed(primary_source),
    };
    if article.archive_url.is_none() {
        article.archive_url = fallback_archive_url;
    }
    article
}

/// Direct extraction first, archive second.
#[derive(Debug, Clone)]
pub struct Bypass<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> Bypass<P, F>
where
    P: ContentStrategy,
    F: ContentStrategy,
{
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }

    pub async fn extract(&self, url: &str) -> ExtractedArticle {
        let primary = self.primary.attempt(url).await;
        let fallback = if needs_fallback(&primary) {
            debug!(%url, "primary strategy insufficient, trying fallback");
            Some(self.fallback.attempt(url).await)
        } else {
            None
        };
        let chosen = choose(primary, fallback, self.primary.source());
        info!(
            %url,
            source = ?chosen.source,
            success = chosen.success,
            chars = chosen.content_len(),
            "content extraction finished"
        );
        chosen
    }
}
