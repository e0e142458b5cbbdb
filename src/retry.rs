//! A single retry primitive parameterized by attempt count and backoff bounds.
//!
//! Per the source-pattern re-architecture in spec §9: callback-style retry
//! helpers collapse into one generic function taking a description (for
//! logging), bounds, and a thunk. Suspension points are explicit
//! `tokio::time::sleep` calls so cancellation works the way §5 describes.

use crate::error::{DyniaError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff bounds for one retried operation, per the ranges documented
/// inline for each call-site in spec §4 ("base 1-10s, cap 30-60s, 2-12
/// attempts").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// `waitForVMActive` default: 5 minute ceiling, ~10s steps.
    pub const fn vm_active() -> Self {
        Self::new(30, Duration::from_secs(10), Duration::from_secs(30))
    }

    /// `waitForDnsPropagation` default: 2 minute ceiling.
    pub const fn dns_propagation() -> Self {
        Self::new(8, Duration::from_secs(5), Duration::from_secs(30))
    }

    /// `ssh waitForConnection` default: 5 minute ceiling.
    pub const fn ssh_connect() -> Self {
        Self::new(20, Duration::from_secs(5), Duration::from_secs(30))
    }

    /// Internal readiness poll: up to 8 attempts, 10-30s backoff (§4.7).
    pub const fn internal_health() -> Self {
        Self::new(8, Duration::from_secs(10), Duration::from_secs(30))
    }

    /// Public readiness poll: up to 12 attempts, 15-60s backoff (§4.7).
    pub const fn public_health() -> Self {
        Self::new(12, Duration::from_secs(15), Duration::from_secs(60))
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1 << attempt.min(8));
        scaled.min(self.max_delay)
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping with exponential
/// backoff between attempts, as long as the returned error is retryable
/// ([`DyniaError::is_retryable`]). Non-transient errors (validation, auth,
/// schema, not-found) are returned immediately per spec §5.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, description: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = description,
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A sleep that can be skipped in dry-run mode, used for the fixed
/// propagation waits named in §4.6 (`activateNode`, `deployRoute`).
pub async fn settle(duration: Duration, dry_run: bool, description: &str) {
    if dry_run {
        tracing::info!(wait = description, "[DRY RUN] would sleep {:?}", duration);
        return;
    }
    tracing::debug!(wait = description, millis = duration.as_millis() as u64, "settling");
    tokio::time::sleep(duration).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(5));
        let result = retry(policy, "test-op", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DyniaError::Transport("not yet".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(5));
        let result: Result<()> = retry(policy, "test-op", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(DyniaError::validation("bad input")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
        let result: Result<()> = retry(policy, "test-op", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(DyniaError::Transport("still down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
