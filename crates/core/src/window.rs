use crate::config::{ConfigError, WindowConfig};
use serde::{Deserialize, Serialize};

/// Half-open member range `[start_index, end_index)` over the segment sequence.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Window {
    pub start_index: usize,
    pub end_index: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_index(&self) -> usize {
        self.end_index.saturating_sub(1)
    }

    /// Number of members shared with `other`.
    pub fn intersection(&self, other: &Window) -> usize {
        let start = self.start_index.max(other.start_index);
        let end = self.end_index.min(other.end_index);
        end.saturating_sub(start)
    }
}

/// Slice `len` segments into windows of `group_size` members, one window per
/// `step` starting at index 0.
///
/// A window starts at every multiple of `step` below `len`. Windows near the
/// end are truncated at `len` so the trend reaches the last segment; with
/// `drop_partial` they are omitted instead. Downstream aggregation therefore
/// sees windows of varying length unless `drop_partial` is set.
///
/// The config is re-checked first, so a zero size or step is a `ConfigError`
/// even when the struct was built by hand.
pub fn group(len: usize, config: &WindowConfig) -> Result<Vec<Window>, ConfigError> {
    config.validate()?;
    Ok((0..len)
        .step_by(config.step)
        .map(|start_index| Window {
            start_index,
            end_index: (start_index + config.group_size).min(len),
        })
        .filter(|w| !config.drop_partial || w.len() == config.group_size)
        .collect())
}
