//! Concurrency primitives and request-scoped context.
//!
//! This module provides:
//! - Cancellation + correlation identifiers via `RequestContext`
//! - Per-key exclusive locks (`KeyedLock`) for serialized state transitions
//! - Single-flight deduplication (`SingleFlight`) for idempotent in-flight work
//!
//! Notes:
//! - These primitives are intended for I/O-heavy orchestration (catalog
//!   transitions, activation, remote queries), not CPU-bound workloads.
//! - Cancellation is "best-effort": work that has not started is cancelled;
//!   in-flight work may complete unless the task itself cooperates.

use crate::{ErrorCode, ErrorEnvelope, Result};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, Notify, OwnedMutexGuard, watch};

/// A correlation identifier used for logging/telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(Arc<str>);

impl CorrelationId {
    /// Parse a correlation identifier from user input.
    ///
    /// The value is trimmed; empty values are rejected.
    pub fn parse(value: impl AsRef<str>) -> Result<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "correlationId must be non-empty",
            ));
        }
        Ok(Self(Arc::<str>::from(trimmed)))
    }

    /// Create a new request id, best-effort unique within this process.
    #[must_use]
    pub fn new_request_id() -> Self {
        let n = REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id: Box<str> = format!("req_{n}").into_boxed_str();
        Self(Arc::<str>::from(id))
    }

    /// Borrow the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A clonable cancellation token that can be awaited.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<CancellationState>,
}

#[derive(Debug)]
struct CancellationState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Create a new token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel the token and wake all current/future waiters.
    pub fn cancel(&self) {
        let was_cancelled = self.inner.cancelled.swap(true, Ordering::SeqCst);
        if !was_cancelled {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns true if the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }

        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
            if self.is_cancelled() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Request-scoped context passed across boundaries.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Create a new request context with a fresh cancellation token.
    #[must_use]
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Convenience constructor: create a context with an auto-generated `req_*` id.
    #[must_use]
    pub fn new_request() -> Self {
        Self::new(CorrelationId::new_request_id())
    }

    /// Create a context with an explicit cancellation token (for sharing cancellation).
    #[must_use]
    pub const fn with_cancellation(
        correlation_id: CorrelationId,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            correlation_id,
            cancellation,
        }
    }

    /// Return the correlation id.
    #[must_use]
    pub const fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Return a clone of the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Returns true if the request was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Cancel this request.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Await cancellation.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Return a cancellation error when cancelled, including operation metadata.
    pub fn ensure_not_cancelled(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(ErrorEnvelope::cancelled("operation cancelled")
                .with_metadata("operation", operation));
        }
        Ok(())
    }
}

/// Per-key exclusive locks.
///
/// Acquiring the same key serializes callers; distinct keys proceed
/// independently. Lock entries are retained for the lifetime of the map;
/// the keyspace is bounded by the catalog, so this does not grow unbounded.
#[derive(Debug)]
pub struct KeyedLock<K> {
    locks: StdMutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Acquire the exclusive lock for `key`, waiting if it is held.
    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

impl<K> Default for KeyedLock<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

type FlightResult<T> = Option<Result<T>>;

/// Single-flight deduplication keyed by `K`.
///
/// The first caller for a key becomes the leader and runs the operation;
/// concurrent callers for the same key wait for and share the leader's
/// result. The entry is released when the leader completes.
#[derive(Debug)]
pub struct SingleFlight<K, T> {
    inflight: StdMutex<HashMap<K, watch::Receiver<FlightResult<T>>>>,
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    /// Create an empty single-flight map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    /// Run `op` for `key`, or join an in-flight run for the same key.
    pub async fn run<F, Fut>(&self, ctx: &RequestContext, key: K, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        ctx.ensure_not_cancelled("single_flight.run")?;

        let (publisher, waiter) = {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(receiver) = inflight.get(&key) {
                (None, Some(receiver.clone()))
            } else {
                let (sender, receiver) = watch::channel(None);
                inflight.insert(key.clone(), receiver);
                (Some(sender), None)
            }
        };

        if let Some(mut receiver) = waiter {
            return Self::join_flight(ctx, &mut receiver).await;
        }

        let result = op().await;

        {
            let mut inflight = self
                .inflight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            inflight.remove(&key);
        }
        if let Some(sender) = publisher {
            // Receivers may all be gone; the leader still returns its result.
            let _ = sender.send(Some(result.clone()));
        }

        result
    }

    async fn join_flight(
        ctx: &RequestContext,
        receiver: &mut watch::Receiver<FlightResult<T>>,
    ) -> Result<T> {
        loop {
            let published = receiver.borrow().clone();
            if let Some(result) = published {
                return result;
            }

            let changed = tokio::select! {
                () = ctx.cancelled() => {
                    return Err(ErrorEnvelope::cancelled("operation cancelled")
                        .with_metadata("operation", "single_flight.join"));
                }
                changed = receiver.changed() => changed,
            };

            if changed.is_err() {
                // Leader dropped without publishing (panic or abort).
                return Err(ErrorEnvelope::unexpected(
                    ErrorCode::internal(),
                    "in-flight operation terminated without a result",
                    crate::ErrorClass::NonRetriable,
                ));
            }
        }
    }
}

impl<K, T> Default for SingleFlight<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[tokio::test]
    async fn keyed_lock_serializes_same_key() {
        let lock = Arc::new(KeyedLock::new());
        let guard = lock.acquire("acme").await;

        let contended = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                let _guard = lock.acquire("acme").await;
            })
        };

        // The second acquire must block while the first guard is held.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contended.is_finished());

        // A different key is independent.
        let other = lock.acquire("widget").await;
        drop(other);

        drop(guard);
        assert!(contended.await.is_ok());
    }

    #[tokio::test]
    async fn single_flight_shares_one_execution() -> Result<()> {
        let flight = Arc::new(SingleFlight::<&'static str, u32>::new());
        let calls = Arc::new(AtomicU32::new(0));
        let gate = Arc::new(Notify::new());

        let leader = {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let ctx = RequestContext::new_request();
                flight
                    .run(&ctx, "key", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok(41u32)
                    })
                    .await
            })
        };

        // Give the leader time to claim the key.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let follower = {
            let flight = Arc::clone(&flight);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                let ctx = RequestContext::new_request();
                flight
                    .run(&ctx, "key", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(99u32)
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.notify_waiters();

        let leader_result = leader.await.map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                error.to_string(),
                crate::ErrorClass::NonRetriable,
            )
        })??;
        let follower_result = follower.await.map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                error.to_string(),
                crate::ErrorClass::NonRetriable,
            )
        })??;

        assert_eq!(leader_result, 41);
        assert_eq!(follower_result, 41);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn single_flight_releases_key_after_completion() -> Result<()> {
        let flight = SingleFlight::<&'static str, u32>::new();
        let ctx = RequestContext::new_request();

        let first = flight.run(&ctx, "key", || async { Ok(1u32) }).await?;
        let second = flight.run(&ctx, "key", || async { Ok(2u32) }).await?;

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_context_rejects_single_flight() {
        let flight = SingleFlight::<&'static str, u32>::new();
        let ctx = RequestContext::new_request();
        ctx.cancel();

        let result = flight.run(&ctx, "key", || async { Ok(1u32) }).await;
        assert!(matches!(result, Err(error) if error.is_cancelled()));
    }
}
