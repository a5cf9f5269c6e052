//! Rate-Limit Retry
//!
//! Cloud text calls that hit provider throttling are retried with exponential
//! backoff (1s, 2s, 4s by default). Only rate-limit errors are retried; every
//! other error surfaces immediately. The cancellation token is polled before
//! each attempt and after each response.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::ai::cancel::CancellationToken;
use crate::constants::retry as retry_constants;
use crate::types::{ForgeError, Result};

/// Backoff parameters for rate-limited calls
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied per retry
    pub factor: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::MAX_RETRIES,
            base_delay: Duration::from_millis(retry_constants::BASE_DELAY_MS),
            factor: retry_constants::BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Default::default()
        }
    }

    /// Zero-delay policy for tests and dry runs
    pub fn immediate() -> Self {
        Self::new(retry_constants::MAX_RETRIES, Duration::ZERO)
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
            .without_max_delay()
    }
}

/// Run `op` under the rate-limit policy
///
/// `Cancelled` is never retried, so a cancellation observed between attempts
/// ends the loop even when retries remain.
pub async fn with_rate_limit_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    provider: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempt = || {
        let call = op();
        async move {
            cancel.check()?;
            let value = call.await?;
            cancel.check()?;
            Ok::<T, ForgeError>(value)
        }
    };

    attempt
        .retry(policy.backoff())
        .sleep(tokio::time::sleep)
        .when(ForgeError::is_rate_limited)
        .notify(|err, delay| {
            warn!(
                provider,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Rate limited, backing off"
            );
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, LlmError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rate_limited() -> ForgeError {
        LlmError::with_provider(ErrorCategory::RateLimit, "429 Too Many Requests", "primary").into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result = with_rate_limit_retry(
            &RetryPolicy::default(),
            &CancellationToken::new(),
            "primary",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(rate_limited()) } else { Ok("done") }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(4), "waited {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_three_retries() {
        let calls = AtomicUsize::new(0);

        let err = with_rate_limit_retry(
            &RetryPolicy::default(),
            &CancellationToken::new(),
            "primary",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(rate_limited())
            },
        )
        .await
        .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);

        let err = with_rate_limit_retry(
            &RetryPolicy::immediate(),
            &CancellationToken::new(),
            "primary",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ForgeError::malformed("primary", "no JSON"))
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ForgeError::MalformedResponse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_pending_retries() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();

        let err = with_rate_limit_retry(&RetryPolicy::immediate(), &cancel, "primary", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            cancel.cancel();
            Err::<(), _>(rate_limited())
        })
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_after_response_discards_result() {
        let cancel = CancellationToken::new();

        let err = with_rate_limit_retry(&RetryPolicy::immediate(), &cancel, "primary", || async {
            cancel.cancel();
            Ok("late")
        })
        .await
        .unwrap_err();

        assert!(err.is_cancelled());
    }
}
