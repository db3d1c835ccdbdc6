pub mod retry;
pub(crate) mod secs;

pub use retry::{is_http_retryable, retry_with_backoff, RetryConfig};
