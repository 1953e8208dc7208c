//! # code-hub-ports
//!
//! Port traits for the code-hub hexagonal architecture.
//!
//! This crate defines the interfaces between the domain and infrastructure
//! layers. It depends only on `domain` and `shared`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::future::Future;
use std::pin::Pin;

/// Boxed future used by port traits.
///
/// Boundary traits do I/O-bound work, so boxed futures keep the contracts
/// object-safe without measurable overhead.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Returns the ports crate version.
#[must_use]
pub const fn ports_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod indexing;
pub mod query;
pub mod workspace;

pub use indexing::*;
pub use query::*;
pub use workspace::*;

// Re-export selected domain types used in port signatures, so adapter crates
// can implement ports without directly depending on `code-hub-domain`.
pub use code_hub_domain::{BranchName, RepoAlias, SourceUrl, UserAlias, UserId};
