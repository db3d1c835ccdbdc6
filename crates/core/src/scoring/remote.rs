use crate::config::RemoteConfig;
use crate::scoring::{EmotionScores, ProviderError, ScoreProvider};
use crate::util::{is_http_retryable, retry_with_backoff, RetryConfig};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const LOG_TARGET: &str = "scoring::remote";

/// Text-classification endpoint speaking the Hugging Face inference format.
#[derive(Clone)]
pub struct RemoteScoreProvider {
    client: Client,
    config: RemoteConfig,
    retry: RetryConfig,
}

impl RemoteScoreProvider {
    /// Each HTTP attempt is cut off after `config.timeout`; a timed-out
    /// attempt counts as a retryable network failure.
    pub fn new(config: RemoteConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn request(&self, text: &str) -> Result<EmotionScores, ProviderError> {
        let body = ClassifyRequest {
            inputs: text,
            parameters: ClassifyParameters { top_k: None },
            options: ClassifyOptions {
                wait_for_model: true,
            },
        };

        let mut request = self.client.post(self.config.endpoint.clone()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key.expose());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload = response.text().await?;
        decode_response(&payload)
    }
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    inputs: &'a str,
    parameters: ClassifyParameters,
    options: ClassifyOptions,
}

#[derive(Serialize)]
struct ClassifyParameters {
    // Serialized as null on purpose: the endpoint then returns every label.
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct ClassifyOptions {
    wait_for_model: bool,
}

#[derive(Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

fn decode_response(payload: &str) -> Result<EmotionScores, ProviderError> {
    let parsed: ClassifyResponse = serde_json::from_str(payload)
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse JSON: {e}")))?;

    let labels = match parsed {
        ClassifyResponse::Nested(mut batches) => {
            if batches.len() != 1 {
                return Err(ProviderError::InvalidResponse(format!(
                    "expected one result, got {}",
                    batches.len()
                )));
            }
            batches.remove(0)
        }
        ClassifyResponse::Flat(labels) => labels,
    };

    let scores: EmotionScores = labels
        .into_iter()
        .map(|l| (l.label.to_lowercase(), l.score))
        .collect();
    scores.validate()?;
    Ok(scores)
}

fn is_retryable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Network(e) => e.is_timeout() || e.is_connect(),
        ProviderError::Api { status, .. } => is_http_retryable(*status),
        ProviderError::InvalidResponse(_) | ProviderError::Malformed(_) => false,
    }
}

impl ScoreProvider for RemoteScoreProvider {
    fn score(&self, text: String) -> BoxFuture<'_, Result<EmotionScores, ProviderError>> {
        async move {
            tracing::debug!(target: LOG_TARGET, chars = text.chars().count(), "classifying");
            retry_with_backoff(&self.retry, || self.request(&text), is_retryable).await
        }
        .boxed()
    }
}
