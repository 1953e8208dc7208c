//! HTTP transport for remote repository queries.
//!
//! Performs exactly one attempt per call; retry, backoff, and budget
//! enforcement live in the application layer.

use crate::http::error::{HubErrorContext, map_status_error, map_transport_error};
use crate::http::{HubHttpConfig, build_client};
use code_hub_ports::query::{QueryResponse, QueryTransportPort, RepositoryQuery};
use code_hub_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};

/// HTTP client for activated repository endpoints.
#[derive(Clone)]
pub struct HttpQueryTransport {
    client: reqwest::Client,
}

impl HttpQueryTransport {
    /// Creates a query transport from configuration.
    ///
    /// The base URL in `config` is ignored; the target endpoint comes from
    /// the activated repository record on every call.
    pub fn new(config: &HubHttpConfig) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self { client })
    }
}

impl QueryTransportPort for HttpQueryTransport {
    fn execute(
        &self,
        ctx: &RequestContext,
        endpoint: &str,
        request: RepositoryQuery,
    ) -> code_hub_ports::BoxFuture<'_, Result<QueryResponse>> {
        let ctx = ctx.clone();
        let url = format!("{}/query", endpoint.trim_end_matches('/'));
        Box::pin(async move {
            let operation = "query.execute";
            ctx.ensure_not_cancelled(operation)?;
            tracing::debug!(operation, %url, "sending repository query");
            let error_ctx = HubErrorContext::new(operation, Some(&url), None);

            let response = tokio::select! {
                () = ctx.cancelled() => {
                    return Err(ErrorEnvelope::cancelled(format!("{operation} cancelled")));
                },
                result = self.client.post(&url).json(&request).send() => {
                    result.map_err(|error| map_transport_error(&error, &error_ctx))?
                },
            };

            let status = response.status();
            let payload = response
                .bytes()
                .await
                .map_err(|error| map_transport_error(&error, &error_ctx))?;

            if !status.is_success() {
                let body = String::from_utf8_lossy(&payload).to_string();
                return Err(map_status_error(status.as_u16(), &body, &error_ctx));
            }

            serde_json::from_slice(&payload).map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::network(),
                    format!("invalid query response: {error}"),
                    ErrorClass::NonRetriable,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_hub_domain::BranchName;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> Result<HttpQueryTransport> {
        HttpQueryTransport::new(&HubHttpConfig {
            base_url: "http://unused.invalid".into(),
            token: None,
            timeout_ms: 5_000,
        })
    }

    fn request() -> Result<RepositoryQuery> {
        Ok(RepositoryQuery {
            query: "retry policy".into(),
            branch: BranchName::parse("main").map_err(ErrorEnvelope::from)?,
            max_results: 5,
        })
    }

    #[tokio::test]
    async fn execute_decodes_hits() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme-main/query"))
            .and(body_json(json!({
                "query": "retry policy",
                "branch": "main",
                "maxResults": 5
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": [
                    { "path": "src/retry.rs", "score": 0.92, "snippet": "fn backoff_delay" }
                ]
            })))
            .mount(&server)
            .await;

        let transport = transport()?;
        let ctx = RequestContext::new_request();
        let endpoint = format!("{}/repos/acme-main", server.uri());
        let response = transport.execute(&ctx, &endpoint, request()?).await?;
        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.hits[0].path.as_ref(), "src/retry.rs");
        Ok(())
    }

    #[tokio::test]
    async fn service_unavailable_is_retriable() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme-main/query"))
            .respond_with(ResponseTemplate::new(503).set_body_string("draining"))
            .mount(&server)
            .await;

        let transport = transport()?;
        let ctx = RequestContext::new_request();
        let endpoint = format!("{}/repos/acme-main", server.uri());
        let result = transport.execute(&ctx, &endpoint, request()?).await;
        assert!(result.is_err());
        if let Err(error) = result {
            assert!(error.class.is_retriable());
        }
        Ok(())
    }

    #[tokio::test]
    async fn bad_request_is_permanent() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme-main/query"))
            .respond_with(ResponseTemplate::new(400).set_body_string("malformed query"))
            .mount(&server)
            .await;

        let transport = transport()?;
        let ctx = RequestContext::new_request();
        let endpoint = format!("{}/repos/acme-main", server.uri());
        let result = transport.execute(&ctx, &endpoint, request()?).await;
        assert!(result.is_err());
        if let Err(error) = result {
            assert!(!error.class.is_retriable());
        }
        Ok(())
    }
}
