//! Remote query transport boundary contract.

use crate::BoxFuture;
use code_hub_domain::BranchName;
use code_hub_shared::{RequestContext, Result};
use serde::{Deserialize, Serialize};

/// Query payload sent to an activated repository endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryQuery {
    /// Free-text search query.
    pub query: Box<str>,
    /// Branch the query targets.
    pub branch: BranchName,
    /// Maximum number of hits to return.
    pub max_results: u32,
}

/// One search hit from the remote server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryHit {
    /// Repository-relative file path.
    pub path: Box<str>,
    /// Relevance score reported by the server.
    pub score: f32,
    /// Matched content excerpt.
    pub snippet: Box<str>,
}

/// Full response for one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Hits ordered best first.
    pub hits: Vec<QueryHit>,
}

/// Boundary contract for one query attempt against a remote endpoint.
///
/// Implementations perform exactly one attempt; retry and budget
/// enforcement live above this port.
pub trait QueryTransportPort: Send + Sync {
    /// Send `request` to `endpoint` and decode the response.
    fn execute(
        &self,
        ctx: &RequestContext,
        endpoint: &str,
        request: RepositoryQuery,
    ) -> BoxFuture<'_, Result<QueryResponse>>;
}
