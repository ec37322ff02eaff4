//! Explicit retry policy for the fetch client.
//!
//! The policy is a value passed into the worker rather than a client field:
//! the "retry transient transport failures only, never retry an application
//! response" rule lives in one inspectable place. Non-transient errors —
//! [`FetchError::RateLimited`], [`FetchError::UnexpectedStatus`] — are
//! returned immediately without any retry, since they usually indicate
//! rate-limiting or quota exhaustion that retries would worsen.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

/// How many times to try and how long to wait between tries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Base delay for exponential backoff: attempt n sleeps
    /// `backoff_base_ms * 2^(n-1)` (± 25% jitter), capped at 60s.
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
        }
    }
}

const MAX_DELAY_MS: u64 = 60_000;

/// Runs `operation` under `policy`.
///
/// On success the result is returned immediately. A transient error sleeps
/// per the backoff schedule and tries again until the attempt budget is
/// spent; the last error is returned. Non-transient errors are returned
/// immediately without sleeping.
///
/// # Errors
///
/// Returns the final [`FetchError`] once retries are exhausted or a
/// non-transient error occurs.
pub async fn run_with_policy<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(err);
                }
                let computed = policy
                    .backoff_base_ms
                    .saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "transient fetch error — retrying after back-off"
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
