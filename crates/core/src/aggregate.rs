//! Turns windows of segments into one `(time, scores)` sample each.
//!
//! Two strategies share the output shape. `Individual` averages scores that
//! were already computed per segment. `Combined` joins the window's text and
//! asks the provider once per window, which costs one call per window but
//! lets the classifier see context across cue boundaries.

use crate::config::{CombinedConfig, WindowConfig};
use crate::scoring::{EmotionScores, ScoreProvider, ScoredSegment, ScoringError};
use crate::subtitle::Segment;
use crate::window::{self, Window};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

const LOG_TARGET: &str = "aggregate";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    Individual,
    Combined,
}

impl AggregationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Combined => "combined",
        }
    }
}

/// Aggregated result for one window. `index` is the window's position in the
/// ordered window sequence.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GroupSample {
    pub index: usize,
    #[serde(with = "crate::util::secs")]
    pub time: Duration,
    pub scores: EmotionScores,
    pub window: Window,
}

/// Label-wise mean of the members' own scores.
///
/// A label missing from a member counts as 0 for that member. The sample time
/// is the first member's start. Member scores are checked the same way provider
/// output is, so a NaN or negative entry fails instead of skewing the mean.
pub fn group_by_individual_scores(
    scored: &[ScoredSegment],
    config: &WindowConfig,
) -> Result<Vec<GroupSample>, ScoringError> {
    let windows = window::group(scored.len(), config)?;
    for (index, member) in scored.iter().enumerate() {
        member
            .scores
            .validate()
            .map_err(|source| ScoringError::Segment {
                index,
                start: member.segment.start,
                end: member.segment.end,
                source,
            })?;
    }

    let samples: Vec<GroupSample> = windows
        .into_iter()
        .enumerate()
        .map(|(index, window)| {
            let members = &scored[window.start_index..window.end_index];
            GroupSample {
                index,
                time: members[0].segment.start,
                scores: mean_scores(members),
                window,
            }
        })
        .collect();

    tracing::debug!(
        target: LOG_TARGET,
        mode = AggregationMode::Individual.as_str(),
        samples = samples.len(),
        "aggregated"
    );
    Ok(samples)
}

fn mean_scores(members: &[ScoredSegment]) -> EmotionScores {
    let labels: BTreeSet<&str> = members.iter().flat_map(|m| m.scores.labels()).collect();
    let n = members.len() as f64;
    labels
        .into_iter()
        .map(|label| {
            let total: f64 = members
                .iter()
                .map(|m| m.scores.get(label).unwrap_or(0.0))
                .sum();
            (label, total / n)
        })
        .collect()
}

/// Score each window's concatenated text with one provider call.
///
/// Member texts are joined with the configured delimiter and cut to
/// `max_length` characters. The sample time is the midpoint between the first
/// and last member starts. Calls run up to `concurrency` at a time; samples
/// keep window order. Any failed or malformed call aborts the whole pass.
pub async fn group_and_average<P>(
    segments: &[Segment],
    window_config: &WindowConfig,
    combined: &CombinedConfig,
    provider: &P,
) -> Result<Vec<GroupSample>, ScoringError>
where
    P: ScoreProvider + ?Sized,
{
    let windows = window::group(segments.len(), window_config)?;
    let samples: Vec<GroupSample> = stream::iter(windows.into_iter().enumerate())
        .map(|(index, window)| async move {
            let members = &segments[window.start_index..window.end_index];
            let first = &members[0];
            let last = &members[members.len() - 1];
            let text = combine_text(members, &combined.delimiter, combined.max_length);

            let scores = provider.score(text).await;
            let scores = scores
                .and_then(|s| s.validate().map(|()| s))
                .map_err(|source| ScoringError::Window {
                    index,
                    first: window.start_index,
                    last: window.last_index(),
                    start: first.start,
                    end: last.end,
                    source,
                })?;

            Ok::<_, ScoringError>(GroupSample {
                index,
                time: first.start + last.start.saturating_sub(first.start) / 2,
                scores,
                window,
            })
        })
        .buffered(combined.concurrency.max(1))
        .try_collect()
        .await?;

    tracing::debug!(
        target: LOG_TARGET,
        mode = AggregationMode::Combined.as_str(),
        samples = samples.len(),
        "aggregated"
    );
    Ok(samples)
}

fn combine_text(members: &[Segment], delimiter: &str, max_length: usize) -> String {
    let mut text = members
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join(delimiter);
    if let Some((cut, _)) = text.char_indices().nth(max_length) {
        text.truncate(cut);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::scoring::testing::{segment, ScriptedProvider};
    use crate::scoring::ProviderError;

    fn scored(index: usize, start_ms: u64, pairs: &[(&str, f64)]) -> ScoredSegment {
        ScoredSegment {
            segment: segment(index, start_ms, ""),
            scores: pairs.iter().copied().collect(),
        }
    }

    fn cfg(group_size: usize, step: usize) -> WindowConfig {
        WindowConfig::new(group_size, step, false).expect("valid config")
    }

    #[test]
    fn single_member_window_reproduces_scores() {
        let input = vec![
            scored(0, 0, &[("joy", 0.123456789), ("anger", 0.3)]),
            scored(1, 1000, &[("joy", 0.7)]),
        ];
        let samples = group_by_individual_scores(&input, &cfg(1, 1)).expect("valid");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].scores, input[0].scores);
        assert_eq!(samples[1].scores, input[1].scores);
    }

    #[test]
    fn mean_treats_missing_labels_as_zero() {
        let input = vec![
            scored(0, 0, &[("joy", 0.2), ("fear", 0.4)]),
            scored(1, 1000, &[("joy", 0.6)]),
        ];
        let samples = group_by_individual_scores(&input, &cfg(2, 2)).expect("valid");
        assert_eq!(samples.len(), 1);
        let scores = &samples[0].scores;
        assert!((scores.get("joy").unwrap() - 0.4).abs() < 1e-12);
        assert!((scores.get("fear").unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(samples[0].time, Duration::ZERO);
    }

    #[test]
    fn ten_segments_group_four_step_two() {
        let input: Vec<ScoredSegment> = (0..10)
            .map(|i| {
                let joy = if i % 2 == 0 { 0.2 } else { 0.6 };
                scored(i, i as u64 * 1000, &[("joy", joy)])
            })
            .collect();
        let samples = group_by_individual_scores(&input, &cfg(4, 2)).expect("valid");

        let starts: Vec<usize> = samples.iter().map(|s| s.window.start_index).collect();
        assert_eq!(starts, vec![0, 2, 4, 6, 8]);
        assert_eq!(samples[4].window.len(), 2);
        // Last window holds {joy:0.2} and {joy:0.6}.
        assert!((samples[4].scores.get("joy").unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(samples[4].time, Duration::from_secs(8));
        assert!(samples.windows(2).all(|p| p[0].time <= p[1].time));
    }

    #[test]
    fn individual_empty_input_is_empty() {
        assert!(group_by_individual_scores(&[], &cfg(4, 2))
            .expect("empty ok")
            .is_empty());
    }

    #[test]
    fn individual_rejects_non_finite_member_scores() {
        let input = vec![
            scored(0, 0, &[("joy", 0.9)]),
            scored(1, 1000, &[("joy", f64::NAN)]),
        ];
        match group_by_individual_scores(&input, &cfg(2, 1)) {
            Err(ScoringError::Segment {
                index,
                start,
                source: ProviderError::Malformed(_),
                ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!(start, Duration::from_secs(1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn hand_built_zero_step_is_a_config_error() {
        let config = WindowConfig {
            step: 0,
            ..WindowConfig::default()
        };
        let input = vec![scored(0, 0, &[("joy", 0.5)])];
        assert!(matches!(
            group_by_individual_scores(&input, &config),
            Err(ScoringError::Config(ConfigError::ZeroStep))
        ));
    }

    #[test]
    fn combine_text_joins_and_truncates_on_char_boundary() {
        let members = vec![segment(0, 0, "héllo"), segment(1, 1000, "wörld")];
        assert_eq!(combine_text(&members, " ", 512), "héllo wörld");
        assert_eq!(combine_text(&members, " | ", 7), "héllo |");
        assert_eq!(combine_text(&members, " ", 2), "hé");
    }

    #[tokio::test]
    async fn combined_mode_scores_once_per_window() {
        let provider = ScriptedProvider::default();
        let segments: Vec<Segment> = (0..5)
            .map(|i| segment(i, i as u64 * 1000, &format!("joy:0.{i}")))
            .collect();
        let samples = group_and_average(&segments, &cfg(3, 2), &CombinedConfig::default(), &provider)
            .await
            .expect("scored");

        assert_eq!(provider.calls(), 3);
        assert_eq!(samples.len(), 3);
        // The scripted provider keeps the last value it reads.
        assert_eq!(samples[0].scores.get("joy"), Some(0.2));
        // Midpoint of member starts 0s and 2s.
        assert_eq!(samples[0].time, Duration::from_secs(1));
        assert_eq!(samples[2].time, Duration::from_secs(4));
        assert_eq!(samples[2].window.len(), 1);

        let inputs = provider.inputs.lock().expect("lock").clone();
        assert_eq!(inputs[0], "joy:0.0 joy:0.1 joy:0.2");
    }

    #[tokio::test]
    async fn combined_mode_truncates_to_max_length() {
        let provider = ScriptedProvider::default();
        let segments = vec![segment(0, 0, "joy:0.5"), segment(1, 1000, "anger:0.9")];
        let combined = CombinedConfig::new(7, 1).expect("valid");
        let samples = group_and_average(&segments, &cfg(2, 2), &combined, &provider)
            .await
            .expect("scored");
        assert_eq!(samples[0].scores.get("anger"), None);
        assert_eq!(samples[0].scores.get("joy"), Some(0.5));
    }

    #[tokio::test]
    async fn combined_failure_reports_window_and_discards_results() {
        let provider = ScriptedProvider::default();
        let segments = vec![
            segment(0, 0, "joy:0.5"),
            segment(1, 1000, "joy:0.5"),
            segment(2, 2000, "fail"),
        ];
        let err = group_and_average(&segments, &cfg(1, 1), &CombinedConfig::default(), &provider)
            .await
            .unwrap_err();
        match err {
            ScoringError::Window {
                index,
                first,
                last,
                start,
                source,
                ..
            } => {
                assert_eq!(index, 2);
                assert_eq!((first, last), (2, 2));
                assert_eq!(start, Duration::from_secs(2));
                assert!(matches!(source, ProviderError::InvalidResponse(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn combined_malformed_scores_fail_the_window() {
        let provider = ScriptedProvider::default();
        let segments = vec![segment(0, 0, "joy:0.5"), segment(1, 1000, "joy:x")];
        let result = group_and_average(&segments, &cfg(1, 1), &CombinedConfig::default(), &provider).await;
        match result {
            Err(ScoringError::Window {
                index,
                first,
                last,
                source: ProviderError::Malformed(_),
                ..
            }) => {
                assert_eq!(index, 1);
                assert_eq!((first, last), (1, 1));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn combined_hand_built_zero_step_makes_no_calls() {
        let provider = ScriptedProvider::default();
        let config = WindowConfig {
            step: 0,
            ..WindowConfig::default()
        };
        let segments = vec![segment(0, 0, "joy:0.5")];
        let result = group_and_average(&segments, &config, &CombinedConfig::default(), &provider).await;
        assert!(matches!(result, Err(ScoringError::Config(ConfigError::ZeroStep))));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn combined_empty_input_makes_no_calls() {
        let provider = ScriptedProvider::default();
        let samples = group_and_average(&[], &cfg(4, 2), &CombinedConfig::default(), &provider)
            .await
            .expect("empty ok");
        assert!(samples.is_empty());
        assert_eq!(provider.calls(), 0);
    }
}
