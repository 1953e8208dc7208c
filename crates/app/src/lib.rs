//! # code-hub-app
//!
//! Application use cases for code-hub.
//!
//! - **Catalog** - golden repository lifecycle with per-alias locking
//! - **Activation** - idempotent, single-flight activation registry
//! - **Matcher** - resolve a branch/project selector to a queryable repo
//! - **Query execution** - retry/backoff/classification around the
//!   remote transport
//! - **Admin** - authorization and usage-confirmation wrappers

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod activation;
pub mod admin;
pub mod catalog;
pub mod matcher;
pub mod query_exec;

pub use activation::ActivationRegistry;
pub use admin::{AdminPrincipal, admin_add, admin_delete, admin_list, admin_refresh, admin_status};
pub use catalog::{AddRepositoryInput, CatalogStatus, GoldenCatalog};
pub use matcher::{resolve_matches, resolve_repository};
pub use query_exec::{QueryExecDeps, QueryExecInput, QueryOutcome, execute_query};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the Unix epoch.
///
/// Clock skew before the epoch collapses to zero rather than panicking.
#[must_use]
pub(crate) fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Returns the app crate version.
#[must_use]
pub const fn app_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
