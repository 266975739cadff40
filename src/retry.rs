use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Errors that can opt into retry. Only rate-limit signals are retried;
/// every other class fails fast at the call site.
pub trait Retryable {
    fn is_rate_limited(&self) -> bool;
}

/// Bounded retry with exponential backoff, applied independently per call
/// site. Delay doubles each attempt: base, 2x base, 4x base, ...
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn with_jitter(self) -> Self {
        Self {
            jitter: true,
            ..self
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64 * 2u64.pow(attempt);
        if self.jitter {
            // Equal jitter: base/2 + rand(0, base/2).
            let half = base / 2;
            Duration::from_millis(half + fastrand::u64(..half.max(1)))
        } else {
            Duration::from_millis(base)
        }
    }
}

pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "rate limited, retrying"
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

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("rate limited")]
        RateLimited,
        #[error("fatal")]
        Fatal,
    }

    impl Retryable for TestError {
        fn is_rate_limited(&self) -> bool {
            matches!(self, TestError::RateLimited)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_backoff() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let result = retry(RetryPolicy::default(), || async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(TestError::RateLimited),
                _ => Ok(42u32),
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Waited base (1s) then 2x base (2s).
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry(RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::RateLimited)
        })
        .await;

        assert!(matches!(result, Err(TestError::RateLimited)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_rate_limit_errors_fail_fast() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry(RetryPolicy::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal)
        })
        .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn jittered_delay_stays_within_equal_jitter_bounds() {
        let policy = RetryPolicy::default().with_jitter();
        for attempt in 0..3 {
            let base = 1000 * 2u64.pow(attempt);
            let d = policy.delay_for(attempt).as_millis() as u64;
            assert!(d >= base / 2 && d < base, "attempt {attempt}: {d}ms");
        }
    }

    #[test]
    fn plain_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }
}
