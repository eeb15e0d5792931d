use std::time::Duration;

use tracing::warn;

use crate::config::RemoteConfig;
use crate::error::RemoteError;

/// Fixed-delay retry for rate-limited requests.
///
/// Rate limiting is retried forever; every other error is returned as-is on
/// the first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// One call's worth of budget: 3 calls/s backs off for 333ms.
    pub fn from_calls_per_second(calls: u32) -> Self {
        Self::new(Duration::from_millis(1000 / u64::from(calls.max(1))))
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Err(err) if err.is_rate_limited() => {
                    attempt += 1;
                    warn!(attempt, delay = ?self.interval, "rate limited, backing off");
                    tokio::time::sleep(self.interval).await;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_calls_per_second(RemoteConfig::DEFAULT_CALLS_PER_SECOND)
    }
}

impl From<&RemoteConfig> for RetryPolicy {
    fn from(config: &RemoteConfig) -> Self {
        Self::from_calls_per_second(config.calls_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_interval_from_budget() {
        assert_eq!(
            RetryPolicy::from_calls_per_second(3).interval,
            Duration::from_millis(333)
        );
        assert_eq!(
            RetryPolicy::from_calls_per_second(0).interval,
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_cost_two_intervals() {
        let interval = Duration::from_millis(333);
        let policy = RetryPolicy::new(interval);
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let result = policy
            .run(|| async {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(RemoteError::RateLimited),
                    _ => Ok("done"),
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // two sleeps, never a third
        let elapsed = start.elapsed();
        assert!(elapsed >= interval * 2, "elapsed {elapsed:?}");
        assert!(elapsed < interval * 3, "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicUsize::new(0);
        let start = Instant::now();

        let result: Result<(), _> = policy
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::from_response(404, "gone"))
            })
            .await;

        assert!(matches!(result, Err(RemoteError::Status { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
