use std::future::Future;
use std::time::Duration;

use super::TransportError;

/// Bounded exponential backoff: wait `base_delay * 2^attempt` between
/// attempts, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 0-based attempt failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the policy
/// runs out of attempts. The last error is returned unchanged.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, TransportError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(
                    "Attempt {} of {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn status_error() -> TransportError {
        TransportError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    #[test]
    fn delays_double_each_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_three_seconds() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = with_backoff(&RetryPolicy::default(), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(status_error())
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn surfaces_last_error_after_three_failures() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_backoff(&RetryPolicy::default(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(TransportError::Status {
                    status: 500 + attempt as u16,
                    body: String::new(),
                })
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(TransportError::Status { status, .. }) => assert_eq!(status, 502),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_responses_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_backoff(&RetryPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::MalformedResponse("no candidates".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(TransportError::MalformedResponse(_))));
    }
}
