use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_GROUP_SIZE: usize = 64;
pub const DEFAULT_STEP: usize = 4;
pub const DEFAULT_MAX_LENGTH: usize = 512;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_DELIMITER: &str = " ";
pub const DEFAULT_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/j-hartmann/emotion-english-distilroberta-base";
pub const ENV_EMOTION_API_KEY: &str = "EMOTION_API_KEY";
pub const ENV_EMOTION_ENDPOINT: &str = "EMOTION_ENDPOINT";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sliding window shape, in segment units.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawWindowConfig")]
pub struct WindowConfig {
    pub group_size: usize,
    pub step: usize,
    /// Omit trailing windows shorter than `group_size` instead of truncating them.
    pub drop_partial: bool,
}

impl WindowConfig {
    pub fn new(group_size: usize, step: usize, drop_partial: bool) -> Result<Self, ConfigError> {
        let config = Self {
            group_size,
            step,
            drop_partial,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_size == 0 {
            return Err(ConfigError::ZeroGroupSize);
        }
        if self.step == 0 {
            return Err(ConfigError::ZeroStep);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawWindowConfig {
    group_size: usize,
    step: usize,
    #[serde(default)]
    drop_partial: bool,
}

impl TryFrom<RawWindowConfig> for WindowConfig {
    type Error = ConfigError;

    fn try_from(raw: RawWindowConfig) -> Result<Self, Self::Error> {
        Self::new(raw.group_size, raw.step, raw.drop_partial)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            group_size: DEFAULT_GROUP_SIZE,
            step: DEFAULT_STEP,
            drop_partial: false,
        }
    }
}

/// Settings for re-scoring concatenated window text.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "RawCombinedConfig")]
pub struct CombinedConfig {
    /// Character budget for the synthetic passage sent to the provider.
    pub max_length: usize,
    pub delimiter: String,
    /// Upper bound on in-flight provider calls.
    pub concurrency: usize,
}

impl CombinedConfig {
    pub fn new(max_length: usize, concurrency: usize) -> Result<Self, ConfigError> {
        let config = Self {
            max_length,
            delimiter: DEFAULT_DELIMITER.to_owned(),
            concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_delimiter<S: Into<String>>(mut self, delimiter: S) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_length == 0 {
            return Err(ConfigError::ZeroMaxLength);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawCombinedConfig {
    max_length: usize,
    delimiter: String,
    concurrency: usize,
}

impl TryFrom<RawCombinedConfig> for CombinedConfig {
    type Error = ConfigError;

    fn try_from(raw: RawCombinedConfig) -> Result<Self, Self::Error> {
        Ok(Self::new(raw.max_length, raw.concurrency)?.with_delimiter(raw.delimiter))
    }
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            delimiter: DEFAULT_DELIMITER.to_owned(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Which score dimension drives the ranking.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractTarget {
    /// Rank every group by one fixed label.
    Label(String),
    /// Rank groups under their own highest-scoring label, one list per label.
    #[default]
    Dominant,
}

impl ExtractTarget {
    pub fn label<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyLabel);
        }
        Ok(Self::Label(v))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "RawExtractConfig")]
pub struct ExtractConfig {
    pub top_k: usize,
    pub target: ExtractTarget,
    /// Largest tolerated share of a candidate's members that may already
    /// belong to an accepted group. `None` disables suppression.
    pub max_overlap: Option<f64>,
}

impl ExtractConfig {
    pub fn new(
        top_k: usize,
        target: ExtractTarget,
        max_overlap: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            top_k,
            target,
            max_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        if let ExtractTarget::Label(label) = &self.target {
            if label.trim().is_empty() {
                return Err(ConfigError::EmptyLabel);
            }
        }
        if let Some(fraction) = self.max_overlap {
            // NaN fails the range check too.
            if !(0.0..=1.0).contains(&fraction) {
                return Err(ConfigError::InvalidOverlap(fraction));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawExtractConfig {
    top_k: usize,
    #[serde(default)]
    target: ExtractTarget,
    #[serde(default)]
    max_overlap: Option<f64>,
}

impl TryFrom<RawExtractConfig> for ExtractConfig {
    type Error = ConfigError;

    fn try_from(raw: RawExtractConfig) -> Result<Self, Self::Error> {
        Self::new(raw.top_k, raw.target, raw.max_overlap)
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            target: ExtractTarget::default(),
            max_overlap: None,
        }
    }
}

/// Everything one pipeline run needs. Passed by reference, never global.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    pub window: WindowConfig,
    pub combined: CombinedConfig,
    pub extract: ExtractConfig,
}

impl AnalysisConfig {
    /// Re-check every section. Fields are public, so a config assembled by
    /// hand never went through the constructors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;
        self.combined.validate()?;
        self.extract.validate()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, ConfigError> {
        let v = value.into();
        if v.trim().is_empty() {
            return Err(ConfigError::EmptyApiKey);
        }
        Ok(Self(v))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(**redacted**)")
    }
}

/// Connection settings for the remote classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteConfig {
    pub endpoint: Url,
    pub api_key: Option<ApiKey>,
    /// Deadline for one HTTP attempt, connect through body.
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(endpoint: &str, api_key: Option<ApiKey>) -> Result<Self, ConfigError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }
        Ok(Self {
            endpoint,
            api_key,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("group size must be >= 1")]
    ZeroGroupSize,
    #[error("step must be >= 1")]
    ZeroStep,
    #[error("top_k must be >= 1")]
    ZeroTopK,
    #[error("max_length must be >= 1")]
    ZeroMaxLength,
    #[error("concurrency must be >= 1")]
    ZeroConcurrency,
    #[error("overlap fraction must be within [0, 1], got {0}")]
    InvalidOverlap(f64),
    #[error("target label must not be empty")]
    EmptyLabel,
    #[error("api key must not be empty")]
    EmptyApiKey,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("request timeout must be > 0")]
    ZeroTimeout,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Clone, Debug, Default)]
pub struct StdEnv;

impl Env for StdEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: std::collections::BTreeMap<String, String>,
}

impl MapEnv {
    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Env for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn resolve_api_key(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
) -> Result<Option<ApiKey>, ConfigError> {
    match cli_value {
        Some(v) => Ok(Some(ApiKey::new(v)?)),
        None => match env.var(env_key) {
            Some(v) => Ok(Some(ApiKey::new(v)?)),
            None => Ok(None),
        },
    }
}

pub fn resolve_string_with_default(
    cli_value: Option<String>,
    env_key: &str,
    env: &impl Env,
    default: &str,
) -> String {
    match cli_value {
        Some(v) => v,
        None => env.var(env_key).unwrap_or_else(|| default.to_owned()),
    }
}
