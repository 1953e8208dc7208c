//! # code-hub-adapters
//!
//! Adapter implementations for code-hub ports.
//!
//! All adapters here speak HTTP: the indexing collaborator, the hub's
//! workspace service, and activated repository query endpoints. Each
//! adapter performs single attempts and maps transport and status
//! failures onto the shared error envelope taxonomy; retry policy lives
//! in the application layer.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod http;

pub use http::HubHttpConfig;
pub use http::error::{HubErrorContext, map_status_error, map_transport_error};
pub use http::indexing::HttpIndexingAdapter;
pub use http::query::HttpQueryTransport;
pub use http::workspace::HttpWorkspaceAdapter;

/// Returns the adapters crate version.
#[must_use]
pub const fn adapters_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
