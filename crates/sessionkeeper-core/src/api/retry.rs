//! Bounded retry with a fixed or growing delay between attempts.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Delay multiplier applied after each failed attempt; 1.0 keeps it fixed.
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, multiplier: f64, cap: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: initial,
            multiplier,
            max_delay: cap,
        }
    }

    /// Backend readiness probing: 30 attempts from 100 ms, x1.5, capped at 2 s.
    pub fn readiness() -> Self {
        Self::exponential(30, Duration::from_millis(100), 1.5, Duration::from_secs(2))
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, returns a non-retryable error, or the attempt
/// budget is spent. The last error is returned along with the attempt count.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut op: F,
) -> Result<T, (u32, E)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                warn!(attempt, max_attempts, delay_ms = delay.as_millis() as u64, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(delay).await;
                delay = policy.next_delay(delay);
            }
            Err(e) => return Err((attempt, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_retry_exhausts_and_returns_last_error() {
        let started = Instant::now();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = retry(
            RetryPolicy::fixed(3, Duration::from_millis(500)),
            |_: &String| true,
            move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("attempt {}", attempt)) }
            },
        )
        .await;

        assert_eq!(result, Err((3, "attempt 3".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_non_retryable() {
        let result: Result<(), _> = retry(
            RetryPolicy::fixed(5, Duration::from_secs(1)),
            |e: &String| e != "fatal",
            |_| async { Err("fatal".to_string()) },
        )
        .await;
        assert_eq!(result, Err((1, "fatal".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let result = retry(
            RetryPolicy::fixed(5, Duration::from_millis(10)),
            |_: &String| true,
            |attempt| async move {
                if attempt < 3 {
                    Err("not yet".to_string())
                } else {
                    Ok(attempt)
                }
            },
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::readiness();
        let mut delay = policy.initial_delay;
        for _ in 0..20 {
            delay = policy.next_delay(delay);
        }
        assert_eq!(delay, Duration::from_secs(2));
        assert_eq!(policy.next_delay(Duration::from_millis(100)), Duration::from_millis(150));
    }
}
