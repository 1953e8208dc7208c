//! Retry helpers with exponential backoff and jitter.

use crate::{ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum attempts (including the first try).
    pub max_attempts: u32,
    /// Base delay for backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter ratio as percentage (0..=100).
    pub jitter_ratio_pct: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 250,
            max_delay_ms: 4_000,
            jitter_ratio_pct: 20,
        }
    }
}

/// Successful retry outcome carrying the number of retries performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryReport<T> {
    /// The operation's success value.
    pub value: T,
    /// Retries performed before success (0 when the first attempt succeeded).
    pub retries: u32,
}

/// Pure backoff policy: delay before retrying after `attempt` (1-based).
///
/// Doubles the base delay per attempt, capped at `max_delay_ms`. Jitter is
/// applied separately so this function stays deterministic and testable.
#[must_use]
pub fn backoff_delay(policy: RetryPolicy, attempt: u32) -> Duration {
    let pow = attempt.saturating_sub(1).min(30);
    let base = policy.base_delay_ms.saturating_mul(1u64 << pow);
    Duration::from_millis(base.min(policy.max_delay_ms))
}

/// Retry a fallible async operation with backoff + jitter.
///
/// Only errors classified `Retriable` are retried; `NonRetriable` errors
/// surface immediately. Attempts are bounded by `policy.max_attempts` and,
/// when `deadline` is set, by the remaining budget: the loop gives up rather
/// than sleep past the deadline. The terminal error carries an `attempts`
/// metadata entry.
pub async fn retry_async<T, F, Fut>(
    ctx: &RequestContext,
    policy: RetryPolicy,
    deadline: Option<Instant>,
    operation: &'static str,
    mut op: F,
) -> Result<RetryReport<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt = attempt.saturating_add(1);
        ctx.ensure_not_cancelled(operation)?;

        match op().await {
            Ok(value) => {
                return Ok(RetryReport {
                    value,
                    retries: attempt.saturating_sub(1),
                });
            },
            Err(error) => {
                if !error.class.is_retriable() || attempt >= policy.max_attempts {
                    return Err(error.with_metadata("attempts", attempt.to_string()));
                }

                let delay = jittered_delay(policy, attempt);
                if let Some(deadline) = deadline {
                    if Instant::now().saturating_duration_since(deadline) > Duration::ZERO
                        || Instant::now() + delay >= deadline
                    {
                        return Err(error
                            .with_metadata("attempts", attempt.to_string())
                            .with_metadata("budget", "exhausted"));
                    }
                }
                sleep_with_cancellation(ctx, delay, operation).await?;
            },
        }
    }
}

fn jittered_delay(policy: RetryPolicy, attempt: u32) -> Duration {
    let capped = u64::try_from(backoff_delay(policy, attempt).as_millis()).unwrap_or(u64::MAX);
    let jitter_pct = u64::from(policy.jitter_ratio_pct.min(100));
    if jitter_pct == 0 {
        return Duration::from_millis(capped);
    }
    let jitter_range = (capped.saturating_mul(jitter_pct)) / 100;
    let seed = jitter_seed(attempt);
    let unit = i64::from(u32::try_from(seed % 1000).unwrap_or(0));
    let signed = unit - 500;
    let jitter_range_i64 = i64::try_from(jitter_range).unwrap_or(i64::MAX);
    let capped_i64 = i64::try_from(capped).unwrap_or(i64::MAX);
    let offset = jitter_range_i64.saturating_mul(signed) / 500;
    let max_i64 = i64::try_from(policy.max_delay_ms).unwrap_or(i64::MAX);
    let jittered = capped_i64.saturating_add(offset).clamp(0, max_i64);
    let jittered_u64 = u64::try_from(jittered).unwrap_or(0);
    Duration::from_millis(jittered_u64)
}

fn jitter_seed(attempt: u32) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| u64::from(duration.subsec_nanos()));
    nanos ^ u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

async fn sleep_with_cancellation(
    ctx: &RequestContext,
    delay: Duration,
    operation: &'static str,
) -> Result<()> {
    tokio::select! {
        () = ctx.cancelled() => Err(
            ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
        ),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorClass, ErrorCode};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_ratio_pct: 0,
        }
    }

    fn transient() -> ErrorEnvelope {
        ErrorEnvelope::unexpected(ErrorCode::network(), "refused", ErrorClass::Retriable)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 450,
            jitter_ratio_pct: 0,
        };
        assert_eq!(backoff_delay(policy, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(policy, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(policy, 3), Duration::from_millis(400));
        assert_eq!(backoff_delay(policy, 4), Duration::from_millis(450));
        assert_eq!(backoff_delay(policy, 30), Duration::from_millis(450));
    }

    #[tokio::test]
    async fn retry_reports_success_after_retries() -> Result<()> {
        let ctx = RequestContext::new_request();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_task = Arc::clone(&calls);

        let report = retry_async(&ctx, fast_policy(5), None, "test", || async {
            let attempt = calls_task.fetch_add(1, Ordering::Relaxed) + 1;
            if attempt < 4 { Err(transient()) } else { Ok(attempt) }
        })
        .await?;

        assert_eq!(report.value, 4);
        assert_eq!(report.retries, 3);
        assert_eq!(calls.load(Ordering::Relaxed), 4);
        Ok(())
    }

    #[tokio::test]
    async fn retry_bounds_attempts_for_persistent_transient_failure() {
        let ctx = RequestContext::new_request();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_task = Arc::clone(&calls);

        let result: Result<RetryReport<u32>> =
            retry_async(&ctx, fast_policy(3), None, "test", || async {
                calls_task.fetch_add(1, Ordering::Relaxed);
                Err(transient())
            })
            .await;

        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert!(matches!(
            result,
            Err(ref error) if error.metadata.get("attempts").map(String::as_str) == Some("3")
        ));
    }

    #[tokio::test]
    async fn non_retriable_errors_surface_immediately() {
        let ctx = RequestContext::new_request();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_task = Arc::clone(&calls);

        let result: Result<RetryReport<u32>> =
            retry_async(&ctx, fast_policy(5), None, "test", || async {
                calls_task.fetch_add(1, Ordering::Relaxed);
                Err(ErrorEnvelope::expected(
                    ErrorCode::permission_denied(),
                    "bad credentials",
                ))
            })
            .await;

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn deadline_stops_retries_early() {
        let ctx = RequestContext::new_request();
        let policy = RetryPolicy {
            max_attempts: 50,
            base_delay_ms: 20,
            max_delay_ms: 20,
            jitter_ratio_pct: 0,
        };
        let deadline = Instant::now() + Duration::from_millis(50);

        let started = Instant::now();
        let result: Result<RetryReport<u32>> =
            retry_async(&ctx, policy, Some(deadline), "test", || async {
                Err(transient())
            })
            .await;

        assert!(matches!(
            result,
            Err(ref error) if error.metadata.get("budget").map(String::as_str) == Some("exhausted")
        ));
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
