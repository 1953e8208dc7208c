//! HTTP adapters for the hub server and remote query endpoints.

pub mod error;
pub mod indexing;
pub mod query;
pub mod workspace;

use code_hub_shared::{ErrorClass, ErrorCode, ErrorEnvelope, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;

/// Shared configuration for hub-facing HTTP adapters.
#[derive(Debug, Clone)]
pub struct HubHttpConfig {
    /// Base URL of the hub server.
    pub base_url: Box<str>,
    /// Optional bearer token for authentication.
    pub token: Option<Box<str>>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl HubHttpConfig {
    /// Validates configuration invariants for hub HTTP adapters.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "hub base URL is required",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "hub request timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Builds a reqwest client with the shared headers and timeout applied.
pub(crate) fn build_client(config: &HubHttpConfig) -> Result<reqwest::Client> {
    config.validate()?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = config.token.as_deref() {
        let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                "hub auth token contains invalid characters",
            )
        })?;
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .default_headers(headers)
        .build()
        .map_err(|error| {
            ErrorEnvelope::unexpected(
                ErrorCode::internal(),
                format!("failed to build hub HTTP client: {error}"),
                ErrorClass::NonRetriable,
            )
        })
}

/// Normalizes a base URL by trimming any trailing slash.
pub(crate) fn trim_base_url(base_url: &str) -> Box<str> {
    base_url.trim_end_matches('/').into()
}
