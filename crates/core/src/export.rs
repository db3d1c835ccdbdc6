//! JSON artifacts written next to the analysed subtitle file.

use crate::extract::RankedGroup;
use crate::trend::Trend;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const HIGHEST_FILE_NAME: &str = "emotion_highest.json";
pub const TREND_FILE_NAME: &str = "emotion_trend.json";

const LOG_TARGET: &str = "export";

/// Top groups per aggregation mode.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct HighestGroups {
    pub individual: Vec<RankedGroup>,
    pub combined: Vec<RankedGroup>,
}

impl HighestGroups {
    pub fn is_empty(&self) -> bool {
        self.individual.is_empty() && self.combined.is_empty()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn write_highest(dir: &Path, highest: &HighestGroups) -> Result<PathBuf, ExportError> {
    write_json(&dir.join(HIGHEST_FILE_NAME), highest)
}

pub fn write_trend(dir: &Path, trend: &Trend) -> Result<PathBuf, ExportError> {
    write_json(&dir.join(TREND_FILE_NAME), trend)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf, ExportError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ExportError::Serialize {
        path: path.to_owned(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_owned(),
        source,
    })?;
    tracing::info!(target: LOG_TARGET, path = %path.display(), "saved");
    Ok(path.to_owned())
}
