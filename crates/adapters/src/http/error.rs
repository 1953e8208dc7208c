//! Hub HTTP error mapping helpers.

use code_hub_shared::{ErrorClass, ErrorCode, ErrorEnvelope};

#[derive(Debug, Clone)]
/// Context payload attached to hub HTTP error envelopes.
pub struct HubErrorContext {
    /// Operation label for tracing failures.
    pub operation: &'static str,
    /// Endpoint path, when available.
    pub endpoint: Option<String>,
    /// Golden repository alias, when the request is alias-scoped.
    pub alias: Option<String>,
}

impl HubErrorContext {
    /// Context for an alias-scoped request.
    #[must_use]
    pub fn new(operation: &'static str, endpoint: Option<&str>, alias: Option<&str>) -> Self {
        Self {
            operation,
            endpoint: endpoint.map(ToOwned::to_owned),
            alias: alias.map(ToOwned::to_owned),
        }
    }

    fn attach(&self, mut envelope: ErrorEnvelope) -> ErrorEnvelope {
        envelope = envelope.with_metadata("operation", self.operation);
        if let Some(endpoint) = self.endpoint.as_ref() {
            envelope = envelope.with_metadata("endpoint", endpoint.to_owned());
        }
        if let Some(alias) = self.alias.as_ref() {
            envelope = envelope.with_metadata("alias", alias.to_owned());
        }
        envelope
    }
}

/// Maps reqwest transport errors into shared error envelopes.
///
/// Timeouts, connection failures, and DNS resolution failures are
/// retriable; everything else is not.
pub fn map_transport_error(error: &reqwest::Error, ctx: &HubErrorContext) -> ErrorEnvelope {
    if error.is_timeout() {
        return ctx.attach(ErrorEnvelope::unexpected(
            ErrorCode::network(),
            format!("hub request timed out: {error}"),
            ErrorClass::Retriable,
        ));
    }
    if error.is_connect() {
        return ctx.attach(ErrorEnvelope::unexpected(
            ErrorCode::network(),
            format!("hub connection failed: {error}"),
            ErrorClass::Retriable,
        ));
    }

    ctx.attach(ErrorEnvelope::unexpected(
        ErrorCode::network(),
        format!("hub request failed: {error}"),
        ErrorClass::NonRetriable,
    ))
}

/// Maps a non-success HTTP status into a shared error envelope.
///
/// 503/502/504/429 are transient; 401/403 map to authorization failures;
/// 404 maps to not-found; remaining 4xx are permanent client errors and
/// remaining 5xx are treated as transient server trouble.
pub fn map_status_error(status: u16, body: &str, ctx: &HubErrorContext) -> ErrorEnvelope {
    let message = format!("HTTP {status}: {body}");
    let envelope = match status {
        429 | 502 | 503 | 504 => {
            ErrorEnvelope::unexpected(ErrorCode::network(), message, ErrorClass::Retriable)
        },
        401 | 403 => ErrorEnvelope::expected(ErrorCode::unauthorized(), message),
        404 => ErrorEnvelope::expected(ErrorCode::not_found(), message),
        409 => ErrorEnvelope::expected(ErrorCode::conflict(), message),
        400..=499 => ErrorEnvelope::expected(ErrorCode::invalid_input(), message),
        _ => ErrorEnvelope::unexpected(ErrorCode::network(), message, ErrorClass::Retriable),
    };

    ctx.attach(envelope.with_metadata("http_status", status.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_hub_shared::ErrorKind;

    fn ctx() -> HubErrorContext {
        HubErrorContext::new("test.op", Some("/repos/acme"), Some("acme"))
    }

    #[test]
    fn service_unavailable_is_retriable() {
        let envelope = map_status_error(503, "maintenance", &ctx());
        assert!(envelope.class.is_retriable());
        assert_eq!(envelope.code.code(), "network");
    }

    #[test]
    fn unauthorized_is_permanent() {
        let envelope = map_status_error(401, "bad token", &ctx());
        assert!(!envelope.class.is_retriable());
        assert_eq!(envelope.code.code(), "unauthorized");
        assert_eq!(envelope.kind, ErrorKind::Expected);
    }

    #[test]
    fn client_errors_are_permanent() {
        let envelope = map_status_error(422, "malformed", &ctx());
        assert!(!envelope.class.is_retriable());
        assert_eq!(envelope.code.code(), "invalid_input");
    }

    #[test]
    fn conflict_status_maps_to_conflict_code() {
        let envelope = map_status_error(409, "alias exists", &ctx());
        assert!(envelope.is_conflict());
    }

    #[test]
    fn context_metadata_is_attached() {
        let envelope = map_status_error(404, "missing", &ctx());
        assert_eq!(
            envelope.metadata.get("alias").map(String::as_str),
            Some("acme")
        );
        assert_eq!(
            envelope.metadata.get("operation").map(String::as_str),
            Some("test.op")
        );
    }
}
