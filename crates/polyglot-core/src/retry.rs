//! Generic retry executor with exponential backoff.
//!
//! Every provider adapter call goes through [`with_retry`]. The policy is an
//! explicit value (no closure-captured mutable state): callers pass the
//! operation name, the policy, and a factory producing one attempt future per
//! invocation.
//!
//! Backoff rules:
//! - authentication / validation / configuration → re-raised immediately;
//! - rate limit → sleep `2 * current_delay`, delay NOT advanced (the doubled
//!   sleep is what distinguishes throttling from generic backoff);
//! - anything else retryable → sleep `current_delay`, then
//!   `current_delay *= backoff_factor`.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ErrorKind, Result, ServiceError};
use crate::metrics::MetricsRecorder;

// ─────────────────────────────────────────────
// RetryPolicy
// ─────────────────────────────────────────────

/// Retry parameters for one operation.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Additional attempts after the first (total calls = `max_retries + 1`).
    pub max_retries: u32,
    /// Delay before the first re-attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each generic-backoff sleep.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Compute `(sleep_for, next_delay)` for a failure of `kind` given the
    /// current delay.
    ///
    /// Rate limits sleep twice the current delay without advancing it; every
    /// other retryable kind sleeps the current delay and advances it by the
    /// backoff factor.
    pub fn next_delay(&self, kind: ErrorKind, current: Duration) -> (Duration, Duration) {
        match kind {
            ErrorKind::RateLimit => (current * 2, current),
            _ => (current, current.mul_f64(self.backoff_factor)),
        }
    }
}

// ─────────────────────────────────────────────
// with_retry
// ─────────────────────────────────────────────

/// Invoke `f`, retrying per `policy` on retryable `ServiceError`s.
///
/// `f` is called at most `policy.max_retries + 1` times. A `retry` metric is
/// recorded for each re-attempt and an `error` metric once at terminal
/// failure; terminal success metrics (duration, volume) are the caller's
/// responsibility since only it knows the payload size.
///
/// A typed error surviving all attempts is re-raised unchanged except for an
/// `attempts` detail; the operation name travels in the `operation` detail so
/// the caller can always tell which request description exhausted its budget.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    metrics: &MetricsRecorder,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut current_delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => {
                warn!(operation, kind = %err.kind(), error = %err, "non-retryable failure");
                metrics.record_error(operation);
                return Err(err);
            }
            Err(err) if attempt >= policy.max_retries => {
                warn!(
                    operation,
                    attempts = attempt + 1,
                    kind = %err.kind(),
                    error = %err,
                    "retries exhausted"
                );
                metrics.record_error(operation);
                return Err(err
                    .with_detail("operation", operation)
                    .with_detail("attempts", attempt + 1));
            }
            Err(err) => {
                let (sleep_for, next) = policy.next_delay(err.kind(), current_delay);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = sleep_for.as_millis() as u64,
                    kind = %err.kind(),
                    error = %err,
                    "retrying after failure"
                );
                metrics.record_retry(operation);
                tokio::time::sleep(sleep_for).await;
                current_delay = next;
                attempt += 1;
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
