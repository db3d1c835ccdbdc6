//! SRT reader.
//!
//! A block is a counter line, a `start --> end` timing line and one or more
//! text lines. Blocks are separated by blank lines. Multi-line cue text is
//! joined with a single space.

use crate::subtitle::Segment;
use std::time::Duration;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubtitleError {
    #[error("block {block}: missing timing line")]
    MissingTiming { block: usize },
    #[error("block {block}: invalid timestamp {value:?}")]
    InvalidTimestamp { block: usize, value: String },
    #[error("block {block}: cue ends before it starts")]
    NegativeDuration { block: usize },
    #[error("block {block}: cue starts before the previous one")]
    OutOfOrder { block: usize },
}

/// Parse SRT text into time-ordered segments. Empty input yields no segments.
pub fn parse_srt(input: &str) -> Result<Vec<Segment>, SubtitleError> {
    let input = input.trim_start_matches('\u{feff}');
    let mut segments: Vec<Segment> = Vec::new();
    let mut lines = input.lines().map(|l| l.trim_end_matches('\r')).peekable();
    let mut block = 0usize;

    loop {
        while lines.peek().is_some_and(|l| l.trim().is_empty()) {
            lines.next();
        }
        let Some(first) = lines.next() else {
            break;
        };
        block += 1;

        // The counter line is optional in the wild; accept a timing line directly.
        let timing = if first.contains("-->") {
            first
        } else {
            match lines.next() {
                Some(l) if l.contains("-->") => l,
                _ => return Err(SubtitleError::MissingTiming { block }),
            }
        };
        let (start, end) = parse_timing(timing, block)?;
        if end < start {
            return Err(SubtitleError::NegativeDuration { block });
        }
        if segments.last().is_some_and(|prev| start < prev.start) {
            return Err(SubtitleError::OutOfOrder { block });
        }

        let mut text = String::new();
        while let Some(line) = lines.next_if(|l| !l.trim().is_empty()) {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(line.trim());
        }

        segments.push(Segment::new(segments.len(), start, end, text));
    }

    Ok(segments)
}

fn parse_timing(line: &str, block: usize) -> Result<(Duration, Duration), SubtitleError> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or(SubtitleError::MissingTiming { block })?;
    // Trailing cue settings (e.g. position) may follow the end timestamp.
    let end = rest.split_whitespace().next().unwrap_or_default();
    Ok((parse_timestamp(start.trim(), block)?, parse_timestamp(end, block)?))
}

fn parse_timestamp(value: &str, block: usize) -> Result<Duration, SubtitleError> {
    let invalid = || SubtitleError::InvalidTimestamp {
        block,
        value: value.to_owned(),
    };

    let (clock, millis) = value
        .split_once(',')
        .or_else(|| value.split_once('.'))
        .ok_or_else(invalid)?;
    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };

    let h: u64 = h.parse().map_err(|_| invalid())?;
    let m: u64 = m.parse().map_err(|_| invalid())?;
    let s: u64 = s.parse().map_err(|_| invalid())?;
    let ms: u64 = millis.parse().map_err(|_| invalid())?;
    if m >= 60 || s >= 60 || ms >= 1000 {
        return Err(invalid());
    }

    Ok(Duration::from_millis(((h * 60 + m) * 60 + s) * 1000 + ms))
}
