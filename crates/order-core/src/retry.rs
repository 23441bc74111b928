//! Bounded fixed-delay retry for external state that settles asynchronously.
//!
//! Exhausting the budget is a recoverable "not yet" outcome, not an error:
//! `run` simply returns `None` and the caller defers the work.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// A bounded retry budget: up to `max_attempts` tries with a fixed `delay`
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt, no delay.
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it yields `Some`, sleeping `delay` between attempts.
    ///
    /// Returns `None` once the budget is exhausted. Attempt errors are the
    /// caller's concern: `op` decides whether a failure is worth another
    /// attempt by returning `None`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(value) = op(attempt).await {
                return Some(value);
            }
            if attempt < self.max_attempts {
                debug!(attempt, delay_ms = self.delay.as_millis() as u64, "retrying");
                tokio::time::sleep(self.delay).await;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let policy = RetryPolicy::new(5, Duration::from_secs(3));
        let calls = AtomicU32::new(0);

        let result = policy
            .run(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { (attempt == 3).then_some(attempt) }
            })
            .await;

        assert_eq!(result, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_and_returns_none() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2));
        let calls = AtomicU32::new(0);

        let start = Instant::now();
        let result: Option<()> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { None }
            })
            .await;

        assert_eq!(result, None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Three inter-attempt delays under the paused clock.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn no_sleep_after_last_attempt() {
        let policy = RetryPolicy::once();
        let start = Instant::now();
        let result: Option<()> = policy.run(|_| async { None }).await;
        assert_eq!(result, None);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
