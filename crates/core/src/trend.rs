use crate::aggregate::GroupSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The full sample sequence as parallel columns, ready for plotting.
///
/// `scores[i]` and `labels[i]` are the dominant label of sample `i` and its
/// score. `series` holds every label's value at every sample; a label a sample
/// lacks is recorded as 0.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Trend {
    pub times: Vec<f64>,
    pub scores: Vec<f64>,
    pub labels: Vec<String>,
    pub series: BTreeMap<String, Vec<f64>>,
}

impl Trend {
    pub fn from_samples(samples: &[GroupSample]) -> Self {
        let mut series: BTreeMap<String, Vec<f64>> = samples
            .iter()
            .flat_map(|s| s.scores.labels())
            .map(|label| (label.to_owned(), Vec::with_capacity(samples.len())))
            .collect();

        let mut trend = Self {
            times: Vec::with_capacity(samples.len()),
            scores: Vec::with_capacity(samples.len()),
            labels: Vec::with_capacity(samples.len()),
            series: BTreeMap::new(),
        };

        for sample in samples {
            let (label, score) = sample.scores.dominant().unwrap_or(("", 0.0));
            trend.times.push(sample.time.as_secs_f64());
            trend.scores.push(score);
            trend.labels.push(label.to_owned());
            for (name, values) in series.iter_mut() {
                values.push(sample.scores.get(name).unwrap_or(0.0));
            }
        }

        trend.series = series;
        trend
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
