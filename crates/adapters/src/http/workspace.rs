//! HTTP adapter for activation working copies served by the hub.

use crate::http::error::{HubErrorContext, map_status_error, map_transport_error};
use crate::http::{HubHttpConfig, build_client, trim_base_url};
use code_hub_domain::{UserAlias, UserId};
use code_hub_ports::workspace::{WorkspaceEndpoint, WorkspacePort, WorkspaceSpec};
use code_hub_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaterializeBody {
    user_id: Box<str>,
    user_alias: Box<str>,
    golden_alias: Box<str>,
    branch: Box<str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MaterializeResponse {
    endpoint: Box<str>,
}

/// HTTP client for the hub's workspace service.
#[derive(Clone)]
pub struct HttpWorkspaceAdapter {
    client: reqwest::Client,
    base_url: Box<str>,
}

impl HttpWorkspaceAdapter {
    /// Creates a workspace adapter from configuration.
    pub fn new(config: &HubHttpConfig) -> Result<Self> {
        let client = build_client(config)?;
        Ok(Self {
            client,
            base_url: trim_base_url(&config.base_url),
        })
    }
}

impl WorkspacePort for HttpWorkspaceAdapter {
    fn materialize(
        &self,
        ctx: &RequestContext,
        spec: WorkspaceSpec,
    ) -> code_hub_ports::BoxFuture<'_, Result<WorkspaceEndpoint>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let operation = "workspace.materialize";
            ctx.ensure_not_cancelled(operation)?;

            let endpoint = format!("{}/workspaces", self.base_url);
            let error_ctx = HubErrorContext::new(
                operation,
                Some(&endpoint),
                Some(spec.golden_alias.as_str()),
            );
            let body = MaterializeBody {
                user_id: spec.user_id.as_str().into(),
                user_alias: spec.user_alias.as_str().into(),
                golden_alias: spec.golden_alias.as_str().into(),
                branch: spec.branch.as_str().into(),
            };

            let response = tokio::select! {
                () = ctx.cancelled() => {
                    return Err(ErrorEnvelope::cancelled(format!("{operation} cancelled")));
                },
                result = self.client.post(&endpoint).json(&body).send() => {
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

            let decoded: MaterializeResponse =
                serde_json::from_slice(&payload).map_err(|error| {
                    ErrorEnvelope::unexpected(
                        ErrorCode::network(),
                        format!("invalid workspace response: {error}"),
                        ErrorClass::NonRetriable,
                    )
                })?;

            Ok(WorkspaceEndpoint {
                endpoint: decoded.endpoint,
            })
        })
    }

    fn teardown(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        user_alias: UserAlias,
    ) -> code_hub_ports::BoxFuture<'_, Result<()>> {
        let ctx = ctx.clone();
        Box::pin(async move {
            let operation = "workspace.teardown";
            ctx.ensure_not_cancelled(operation)?;

            let endpoint = format!("{}/workspaces/{}/{}", self.base_url, user_id, user_alias);
            let error_ctx = HubErrorContext::new(operation, Some(&endpoint), None);

            let response = tokio::select! {
                () = ctx.cancelled() => {
                    return Err(ErrorEnvelope::cancelled(format!("{operation} cancelled")));
                },
                result = self.client.delete(&endpoint).send() => {
                    result.map_err(|error| map_transport_error(&error, &error_ctx))?
                },
            };

            let status = response.status();
            if !status.is_success() {
                let payload = response
                    .bytes()
                    .await
                    .map_err(|error| map_transport_error(&error, &error_ctx))?;
                let body = String::from_utf8_lossy(&payload).to_string();
                return Err(map_status_error(status.as_u16(), &body, &error_ctx));
            }

            Ok(())
        })
    }
}
