use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by a retryable operation borrowing its state for `'a`.
pub type RetryFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed 0-indexed `attempt`: `(2^attempt + 1)` units.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt).saturating_add(1);
        self.unit.saturating_mul(factor)
    }
}

/// Run `op` against `state` until it succeeds or `policy.max_attempts` runs out.
///
/// Failures are logged and followed by an exponential backoff pause. When every
/// attempt fails the last error is logged and `None` is returned; callers treat
/// that as the operation having had no effect.
pub async fn with_retry<S, T, E, F>(
    state: &mut S,
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Option<T>
where
    S: ?Sized,
    E: Display,
    F: for<'a> FnMut(&'a mut S) -> RetryFuture<'a, T, E>,
{
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        match op(&mut *state).await {
            Ok(value) => return Some(value),
            Err(e) if attempt + 1 < attempts => {
                let wait = policy.backoff(attempt);
                tracing::warn!(
                    "{}: attempt {} failed ({}). Retrying in {:?}...",
                    label,
                    attempt + 1,
                    e,
                    wait
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                tracing::error!("{}: all {} attempts failed. Last error: {}", label, attempts, e);
            }
        }
    }
    None
}
