use crate::aggregate::GroupSample;
use crate::config::{ExtractConfig, ExtractTarget};
use crate::scoring::EmotionScores;
use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One selected group. `rank` starts at 1 and counts within `label`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RankedGroup {
    pub rank: usize,
    pub label: String,
    pub score: f64,
    #[serde(with = "crate::util::secs")]
    pub time: Duration,
    pub sample_index: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub scores: EmotionScores,
}

impl RankedGroup {
    pub fn window(&self) -> Window {
        Window {
            start_index: self.start_index,
            end_index: self.end_index,
        }
    }
}

struct Candidate<'a> {
    sample: &'a GroupSample,
    score: f64,
}

/// Pick the highest-scoring groups.
///
/// With `ExtractTarget::Label` every sample carrying that label competes in a
/// single list. With `ExtractTarget::Dominant` each sample competes only under
/// its own dominant label and the per-label lists are concatenated in label
/// order. Works the same on samples from either aggregation mode.
pub fn extract_highest(samples: &[GroupSample], config: &ExtractConfig) -> Vec<RankedGroup> {
    match &config.target {
        ExtractTarget::Label(label) => {
            let candidates = samples
                .iter()
                .filter_map(|sample| {
                    sample
                        .scores
                        .get(label)
                        .map(|score| Candidate { sample, score })
                })
                .collect();
            select(label, candidates, config)
        }
        ExtractTarget::Dominant => {
            let mut by_label: BTreeMap<&str, Vec<Candidate<'_>>> = BTreeMap::new();
            for sample in samples {
                if let Some((label, score)) = sample.scores.dominant() {
                    by_label
                        .entry(label)
                        .or_default()
                        .push(Candidate { sample, score });
                }
            }
            by_label
                .into_iter()
                .flat_map(|(label, candidates)| select(label, candidates, config))
                .collect()
        }
    }
}

/// Rank by score descending, earlier sample first on ties, then accept
/// candidates in that order until `top_k` are taken. With `max_overlap` set, a
/// candidate sharing more than that fraction of its members with an accepted
/// group is skipped and the next one is tried.
fn select(label: &str, mut candidates: Vec<Candidate<'_>>, config: &ExtractConfig) -> Vec<RankedGroup> {
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.sample.index.cmp(&b.sample.index))
    });

    let mut accepted: Vec<RankedGroup> = Vec::with_capacity(config.top_k);
    for Candidate { sample, score } in candidates {
        if accepted.len() == config.top_k {
            break;
        }
        if let Some(max_overlap) = config.max_overlap {
            let limit = max_overlap * sample.window.len() as f64;
            let overlaps = accepted
                .iter()
                .any(|g| g.window().intersection(&sample.window) as f64 > limit);
            if overlaps {
                continue;
            }
        }
        accepted.push(RankedGroup {
            rank: accepted.len() + 1,
            label: label.to_owned(),
            score,
            time: sample.time,
            sample_index: sample.index,
            start_index: sample.window.start_index,
            end_index: sample.window.end_index,
            scores: sample.scores.clone(),
        });
    }
    accepted
}
