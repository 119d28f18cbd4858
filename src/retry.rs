use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded retry with linear backoff: after the n-th failed attempt the
/// caller sleeps `base * n` before moving on.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Sleep that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op` until it succeeds or the attempts are used up. `op` receives
    /// the 1-based attempt number. The last error is returned on exhaustion.
    /// The backoff also follows the final failed attempt, so three failures
    /// sleep 2, 4 and 6 seconds with the default base.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("Succeeded on attempt {attempt}/{}", self.max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "Attempt {attempt}/{} failed: {e}; backing off {}s",
                        self.max_attempts,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_delays_scale_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let delays: Vec<u64> = (1..=3).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(delays, vec![2, 4, 6]);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error_after_full_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let mut failed_at = Vec::new();

        let result: Result<(), String> = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                failed_at.push(started.elapsed().as_secs());
                async move { Err(format!("failure {attempt}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Attempts start at t=0, t=2, t=6 and the final backoff ends at t=12.
        assert_eq!(failed_at, vec![0, 2, 6]);
        assert_eq!(started.elapsed().as_secs(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_first_success() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let started = Instant::now();

        let result: Result<u32, String> = policy
            .run(|attempt| async move {
                if attempt < 2 {
                    Err("transient".to_string())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(started.elapsed().as_secs(), 2);
    }
}
