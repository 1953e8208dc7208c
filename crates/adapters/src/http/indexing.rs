//! HTTP adapter for the external indexing collaborator.

use crate::http::error::{HubErrorContext, map_status_error, map_transport_error};
use crate::http::{HubHttpConfig, build_client, trim_base_url};
use code_hub_domain::{BranchName, RepoAlias};
use code_hub_ports::indexing::{IndexSpec, IndexingPort};
use code_hub_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexRequestBody {
    source_url: Box<str>,
    branch: Box<str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatusBody {
    present: bool,
}

/// HTTP client for the indexing collaborator service.
#[derive(Clone)]
pub struct HttpIndexingAdapter {
    client: reqwest::Client,
    base_url: Box<str>,
}

impl HttpIndexingAdapter {
    /// Creates an indexing adapter from configuration.
    pub fn new(config: &HubHttpConfig) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self {
            client,
            base_url: trim_base_url(&config.base_url),
        })
    }

    fn index_path(&self, alias: &RepoAlias, branch: &BranchName) -> String {
        format!("{}/index/{}/{}", self.base_url, alias, branch)
    }

    async fn send(
        &self,
        ctx: RequestContext,
        request: reqwest::RequestBuilder,
        operation: &'static str,
        endpoint: String,
        alias: String,
    ) -> Result<Vec<u8>> {
        ctx.ensure_not_cancelled(operation)?;
        tracing::debug!(operation, %endpoint, %alias, "sending indexing request");
        let error_ctx = HubErrorContext::new(operation, Some(&endpoint), Some(&alias));

        let response = tokio::select! {
            () = ctx.cancelled() => {
                return Err(ErrorEnvelope::cancelled(format!("{operation} cancelled")));
            },
            result = request.send() => {
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

        Ok(payload.to_vec())
    }
}

impl IndexingPort for HttpIndexingAdapter {
    fn create_index(
        &self,
        ctx: &RequestContext,
        spec: IndexSpec,
    ) -> code_hub_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let endpoint = self.index_path(&spec.alias, &spec.branch);
            let body = IndexRequestBody {
                source_url: spec.source_url.as_str().into(),
                branch: spec.branch.as_str().into(),
            };
            let request = self.client.post(&endpoint).json(&body);
            self.send(
                ctx,
                request,
                "indexing.create_index",
                endpoint,
                spec.alias.to_string(),
            )
            .await?;
            Ok(())
        })
    }

    fn refresh_index(
        &self,
        ctx: &RequestContext,
        spec: IndexSpec,
    ) -> code_hub_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let endpoint = format!("{}/refresh", self.index_path(&spec.alias, &spec.branch));
            let body = IndexRequestBody {
                source_url: spec.source_url.as_str().into(),
                branch: spec.branch.as_str().into(),
            };
            let request = self.client.post(&endpoint).json(&body);
            self.send(
                ctx,
                request,
                "indexing.refresh_index",
                endpoint,
                spec.alias.to_string(),
            )
            .await?;
            Ok(())
        })
    }

    fn delete_index(
        &self,
        ctx: &RequestContext,
        alias: RepoAlias,
        branch: BranchName,
    ) -> code_hub_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let endpoint = self.index_path(&alias, &branch);
            let request = self.client.delete(&endpoint);
            self.send(
                ctx,
                request,
                "indexing.delete_index",
                endpoint,
                alias.to_string(),
            )
            .await?;
            Ok(())
        })
    }

    fn verify_index(
        &self,
        ctx: &RequestContext,
        alias: RepoAlias,
        branch: BranchName,
    ) -> code_hub_ports::BoxFuture<'_, Result<bool>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let endpoint = self.index_path(&alias, &branch);
            let request = self.client.get(&endpoint);
            let payload = self
                .send(
                    ctx,
                    request,
                    "indexing.verify_index",
                    endpoint,
                    alias.to_string(),
                )
                .await?;

            let status: IndexStatusBody = serde_json::from_slice(&payload).map_err(|error| {
                ErrorEnvelope::unexpected(
                    ErrorCode::network(),
                    format!("invalid index status response: {error}"),
                    ErrorClass::NonRetriable,
                )
            })?;
            Ok(status.present)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_hub_domain::SourceUrl;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter_for(server: &MockServer) -> Result<HttpIndexingAdapter> {
        HttpIndexingAdapter::new(&HubHttpConfig {
            base_url: server.uri().into(),
            token: None,
            timeout_ms: 5_000,
        })
    }

    fn spec() -> Result<IndexSpec> {
        Ok(IndexSpec {
            alias: RepoAlias::parse("acme").map_err(ErrorEnvelope::from)?,
            source_url: SourceUrl::parse("https://git.example.com/org/acme.git")
                .map_err(ErrorEnvelope::from)?,
            branch: BranchName::parse("main").map_err(ErrorEnvelope::from)?,
        })
    }

    #[tokio::test]
    async fn create_index_posts_branch_spec() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/acme/main"))
            .and(body_json(json!({
                "sourceUrl": "https://git.example.com/org/acme.git",
                "branch": "main"
            })))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server)?;
        let ctx = RequestContext::new_request();
        adapter.create_index(&ctx, spec()?).await?;
        Ok(())
    }

    #[tokio::test]
    async fn verify_index_decodes_presence() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index/acme/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "present": true })))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server)?;
        let ctx = RequestContext::new_request();
        let spec = spec()?;
        let present = adapter.verify_index(&ctx, spec.alias, spec.branch).await?;
        assert!(present);
        Ok(())
    }

    #[tokio::test]
    async fn indexing_failure_surfaces_status_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/index/acme/main"))
            .respond_with(ResponseTemplate::new(424).set_body_string("clone failed"))
            .mount(&server)
            .await;

        let adapter = adapter_for(&server)?;
        let ctx = RequestContext::new_request();
        let result = adapter.create_index(&ctx, spec()?).await;
        assert!(result.is_err());
        if let Err(error) = result {
            assert!(!error.class.is_retriable());
        }
        Ok(())
    }
}
