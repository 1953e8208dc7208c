//! # code-hub-shared
//!
//! Shared result types, error envelope, and concurrency primitives for the
//! code-hub workspace.
//!
//! This crate provides foundational types used across all other crates:
//!
//! - `Result` and error envelope types
//! - Request-scoped context, cancellation, per-key locks, single-flight
//! - Retry with exponential backoff + jitter, deadline-aware timeouts
//!
//! ## Design Principles
//!
//! 1. **No workspace dependencies** - This crate only depends on external crates
//! 2. **Serde-compatible** - All public error types support serialization

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod concurrency;
pub mod errors;
pub mod result;
pub mod retry;
pub mod timeout;

pub use concurrency::{
    CancellationToken, CorrelationId, KeyedLock, RequestContext, SingleFlight,
};
pub use errors::{ErrorClass, ErrorCode, ErrorEnvelope, ErrorKind, ErrorMetadata};
pub use result::{Result, ResultExt};
pub use retry::{RetryPolicy, RetryReport, backoff_delay, retry_async};
pub use timeout::timeout_with_context;

/// Returns the shared crate version.
#[must_use]
pub const fn shared_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
