mod keyword;
mod remote;

use crate::config::ConfigError;
use crate::subtitle::Segment;
use futures::future::BoxFuture;
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub use keyword::KeywordScoreProvider;
pub use remote::RemoteScoreProvider;

/// Label → probability. Ordered so iteration and serialization are stable.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EmotionScores(BTreeMap<String, f64>);

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.get(label).copied()
    }

    pub fn insert<S: Into<String>>(&mut self, label: S, score: f64) {
        self.0.insert(label.into(), score);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest-scoring label. Ties go to the label that sorts first.
    pub fn dominant(&self) -> Option<(&str, f64)> {
        self.iter().fold(None, |best, (label, score)| match best {
            Some((_, s)) if s >= score => best,
            _ => Some((label, score)),
        })
    }

    /// Reject vectors a provider must never hand back: empty, or holding a
    /// non-finite or negative probability.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.0.is_empty() {
            return Err(ProviderError::Malformed("empty score vector".to_owned()));
        }
        for (label, score) in self.iter() {
            if !score.is_finite() || score < 0.0 {
                return Err(ProviderError::Malformed(format!(
                    "label {label:?} has invalid score {score}"
                )));
            }
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for EmotionScores {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A segment with the scores its own text received.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoredSegment {
    pub segment: Segment,
    pub scores: EmotionScores,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("classifier returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),
    #[error("malformed score vector: {0}")]
    Malformed(String),
}

/// A provider failure pinned to the unit of work that triggered it, or a
/// window config that could not be used.
#[derive(thiserror::Error, Debug)]
pub enum ScoringError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("scoring segment {index} ({start:?}..{end:?}) failed")]
    Segment {
        index: usize,
        start: Duration,
        end: Duration,
        #[source]
        source: ProviderError,
    },
    #[error("scoring window {index} (segments {first}..{last}, {start:?}..{end:?}) failed")]
    Window {
        index: usize,
        first: usize,
        last: usize,
        start: Duration,
        end: Duration,
        #[source]
        source: ProviderError,
    },
}

/// Maps text to a label distribution. May be slow and fallible.
pub trait ScoreProvider: Send + Sync {
    fn score(&self, text: String) -> BoxFuture<'_, Result<EmotionScores, ProviderError>>;
}

/// Score every segment once, at most `concurrency` calls in flight.
///
/// Output order matches input order regardless of completion order. The first
/// failure aborts the pass and nothing scored so far is returned.
pub async fn score_segments<P>(
    segments: &[Segment],
    provider: &P,
    concurrency: usize,
) -> Result<Vec<ScoredSegment>, ScoringError>
where
    P: ScoreProvider + ?Sized,
{
    let scores: Vec<EmotionScores> = stream::iter(segments.iter().enumerate())
        .map(|(index, segment)| async move {
            let scores = provider.score(segment.text.clone()).await;
            scores
                .and_then(|s| s.validate().map(|()| s))
                .map_err(|source| ScoringError::Segment {
                    index,
                    start: segment.start,
                    end: segment.end,
                    source,
                })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(segments
        .iter()
        .cloned()
        .zip(scores)
        .map(|(segment, scores)| ScoredSegment { segment, scores })
        .collect())
}
