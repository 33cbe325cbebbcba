//! # Retry wrapper for server tasks.
//!
//! [`Retry`] re-executes its inner task when an attempt fails, sleeping a
//! randomized, growing delay between attempts. [`RetryPolicy`] controls
//! the attempt bound and the delay curve.
//!
//! ## Rules
//! - [`TaskError::Canceled`] is rethrown immediately, never retried.
//! - The delay for attempt `n` is drawn uniformly from `n² ..= (n+1)²`
//!   seconds and capped at [`RetryPolicy::max_delay`]. Each draw uses the
//!   thread-local rng; no shared rng state.
//! - Log severity escalates with the attempt count
//!   (debug, info, warn, then error).

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::error::TaskError;
use crate::server::{ServerContext, ServerTask, ServerTaskRef};

/// Attempt bound and delay curve for [`Retry`].
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Maximum number of re-executions after the first failed attempt.
    pub max_attempts: u32,
    /// Upper cap applied to every computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Practically unbounded attempts, delays capped at five minutes.
    fn default() -> Self {
        Self {
            max_attempts: u32::MAX,
            max_delay: Duration::from_secs(5 * 60),
        }
    }
}

impl RetryPolicy {
    /// Computes the delay before re-executing after failed attempt
    /// `attempt` (zero-based).
    pub fn next(&self, attempt: u32) -> Duration {
        let attempt = u64::from(attempt);
        let low = attempt * attempt;
        let high = (attempt + 1) * (attempt + 1);
        let secs = rand::rng().random_range(low..=high);
        Duration::from_secs(secs).min(self.max_delay)
    }
}

/// Re-executes a failing inner task with growing randomized delays.
pub struct Retry {
    inner: ServerTaskRef,
    policy: RetryPolicy,
}

impl Retry {
    /// Wraps `inner` with the default policy.
    pub fn new(inner: ServerTaskRef) -> Self {
        Self::with_policy(inner, RetryPolicy::default())
    }

    /// Wraps `inner` with an explicit policy.
    pub fn with_policy(inner: ServerTaskRef, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ServerTask for Retry {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, ctx: &ServerContext) -> Result<(), TaskError> {
        let mut attempt: u32 = 0;
        loop {
            let err = match self.inner.execute(ctx).await {
                Ok(()) => return Ok(()),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= self.policy.max_attempts {
                return Err(err);
            }

            let delay = self.policy.next(attempt);
            let task = self.inner.name();
            let delay_secs = delay.as_secs();
            match attempt {
                0 => debug!(task, attempt, delay_secs, %err, "task failed; retrying"),
                1 => info!(task, attempt, delay_secs, %err, "task failed; retrying"),
                2 => warn!(task, attempt, delay_secs, %err, "task failed; retrying"),
                _ => error!(task, attempt, delay_secs, %err, "task failed; retrying"),
            }

            ctx.wait(delay).await?;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use crate::storage::MemoryStorage;

    struct FailingUntil {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ServerTask for FailingUntil {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn execute(&self, _ctx: &ServerContext) -> Result<(), TaskError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(TaskError::Other("transient".into()))
            } else {
                Ok(())
            }
        }
    }

    struct AlwaysCanceled;

    #[async_trait]
    impl ServerTask for AlwaysCanceled {
        fn name(&self) -> &str {
            "canceled"
        }

        async fn execute(&self, _ctx: &ServerContext) -> Result<(), TaskError> {
            Err(TaskError::Canceled)
        }
    }

    fn context() -> ServerContext {
        ServerContext::new(
            "server-1",
            Arc::new(MemoryStorage::new()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_delay_stays_within_the_attempt_window() {
        let policy = RetryPolicy::default();
        for attempt in 0..6u32 {
            let delay = policy.next(attempt).as_secs();
            let attempt = u64::from(attempt);
            assert!(delay >= attempt * attempt, "attempt {attempt}: {delay}");
            assert!(delay <= (attempt + 1) * (attempt + 1), "attempt {attempt}: {delay}");
        }
    }

    #[test]
    fn test_delay_is_capped_at_max() {
        let policy = RetryPolicy {
            max_attempts: u32::MAX,
            max_delay: Duration::from_secs(300),
        };
        // Attempt 60 draws from 3600..=3721 seconds, well above the cap.
        assert_eq!(policy.next(60), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_retries_until_the_inner_task_succeeds() {
        tokio::time::pause();
        let inner = Arc::new(FailingUntil {
            failures: 3,
            calls: AtomicU32::new(0),
        });
        let retry = Retry::new(inner.clone());

        retry.execute(&context()).await.expect("eventually succeeds");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_attempt_bound_is_honored() {
        tokio::time::pause();
        let inner = Arc::new(FailingUntil {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let retry = Retry::with_policy(
            inner.clone(),
            RetryPolicy {
                max_attempts: 2,
                max_delay: Duration::from_secs(1),
            },
        );

        let err = retry.execute(&context()).await.expect_err("exhausted");
        assert!(err.is_retryable());
        // Initial attempt plus two retries.
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_is_never_retried() {
        let retry = Retry::new(Arc::new(AlwaysCanceled));
        assert!(matches!(
            retry.execute(&context()).await,
            Err(TaskError::Canceled)
        ));
    }
}
