mod srt;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use srt::{parse_srt, SubtitleError};

/// One subtitle cue, in arrival order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    #[serde(with = "crate::util::secs")]
    pub start: Duration,
    #[serde(with = "crate::util::secs")]
    pub end: Duration,
    pub text: String,
}

impl Segment {
    pub fn new<S: Into<String>>(index: usize, start: Duration, end: Duration, text: S) -> Self {
        Self {
            index,
            start,
            end,
            text: text.into(),
        }
    }
}
