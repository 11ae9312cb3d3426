//! Fixed-delay retry plumbing shared by function creation (role propagation)
//! and the consistency gate.
//!
//! The sleep is behind a trait so tests can observe retry pacing without
//! waiting out real delays.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

/// A bounded retry budget with a fixed inter-attempt delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 behave as 1.
    pub attempts: u32,
    pub delay: Duration,
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, period: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

/// Run `attempt_fn` up to `policy.attempts` times with the policy's fixed
/// delay between attempts. `is_retryable` gates every failure: non-retryable
/// errors are returned immediately. Exhausting the budget returns the last
/// error untouched so the caller can wrap it.
pub async fn retry_fixed<T, E, F, Fut, R>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    description: &str,
    mut attempt_fn: F,
    mut is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: FnMut(&E) -> bool,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match attempt_fn().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if !is_retryable(&err) || attempt >= attempts {
                    return Err(err);
                }
                warn!(
                    attempt,
                    attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    description,
                    error = %err,
                    "attempt failed, retrying"
                );
                sleeper.sleep(policy.delay).await;
            }
        }
    }
}
