//! Headline sentiment aggregation
//!
//! The scorer itself (headline -> polarity) lives outside the crate; this
//! module averages its output and normalises missing scores.

use tracing::debug;

/// Number of headlines scored per symbol unless told otherwise.
pub const DEFAULT_HEADLINE_LIMIT: usize = 5;

/// Maps one headline to a polarity in [-1, 1].
pub trait SentimentScorer: Send + Sync {
    fn score(&self, headline: &str) -> f64;
}

impl<F> SentimentScorer for F
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    fn score(&self, headline: &str) -> f64 {
        self(headline)
    }
}

/// Mean polarity of the first `limit` headlines, clamped to [-1, 1].
///
/// No headlines means neutral (0.0). Non-finite scores are skipped; if none
/// remain the result is neutral too.
pub fn mean_sentiment<S, H>(scorer: &S, headlines: &[H], limit: usize) -> f64
where
    S: SentimentScorer + ?Sized,
    H: AsRef<str>,
{
    let scores: Vec<f64> = headlines
        .iter()
        .take(limit)
        .map(|h| scorer.score(h.as_ref()))
        .filter(|s| s.is_finite())
        .collect();

    if scores.is_empty() {
        debug!(headlines = headlines.len(), "no usable headline scores, sentiment neutral");
        return 0.0;
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    debug!(scored = scores.len(), mean, "headline sentiment");
    mean.clamp(-1.0, 1.0)
}

/// Sentiment used by fusion: missing or non-finite is neutral, the rest is
/// clamped to [-1, 1].
pub fn resolve(sentiment: Option<f64>) -> f64 {
    match sentiment {
        Some(s) if s.is_finite() => s.clamp(-1.0, 1.0),
        _ => 0.0,
    }
}
