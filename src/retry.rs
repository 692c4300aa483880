use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::error::ApiError;

/// Retry budget shared by every network-calling component.
///
/// Passed in explicitly instead of being baked into the wrappers so tests
/// can shrink the delays to nothing.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// policy's retry budget is exhausted. A `Retry-After` hint from the
/// provider overrides the computed backoff delay.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    op.retry(policy.backoff())
        .when(ApiError::is_transient)
        .adjust(|err, dur| match err {
            ApiError::Transient {
                retry_after: Some(hint),
                ..
            } => Some(*hint),
            _ => dur,
        })
        .notify(|err, delay| {
            tracing::warn!(%err, ?delay, operation, "transient api error, retrying");
        })
        .await
}
