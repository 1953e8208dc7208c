//! Timeout helpers with cancellation awareness.

use crate::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::future::Future;
use std::time::Duration;

/// Apply a hard deadline to a future, honoring request cancellation.
///
/// Once the budget is exceeded the in-flight future is abandoned and a
/// timeout failure surfaces; the caller sees no partial result.
pub async fn timeout_with_context<T, F>(
    ctx: &RequestContext,
    budget: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ctx.ensure_not_cancelled(operation)?;

    let capped = tokio::time::timeout(budget, fut);
    tokio::select! {
        () = ctx.cancelled() => Err(cancelled_error(operation)),
        outcome = capped => match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(timeout_error(operation)),
        },
    }
}

fn timeout_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::unexpected(
        ErrorCode::timeout(),
        format!("operation timed out: {operation}"),
        ErrorClass::Retriable,
    )
    .with_metadata("operation", operation)
}

fn cancelled_error(operation: &'static str) -> ErrorEnvelope {
    ErrorEnvelope::cancelled("operation cancelled").with_metadata("operation", operation)
}
