//! Activation workspace boundary contract.

use crate::BoxFuture;
use code_hub_domain::{BranchName, RepoAlias, UserAlias, UserId};
use code_hub_shared::{RequestContext, Result};

/// Parameters for materializing a user-scoped working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSpec {
    /// Owning user.
    pub user_id: UserId,
    /// Generated per-user alias for the working copy.
    pub user_alias: UserAlias,
    /// Golden repository the working copy derives from.
    pub golden_alias: RepoAlias,
    /// Branch the working copy tracks.
    pub branch: BranchName,
}

/// Queryable endpoint of a materialized working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEndpoint {
    /// Base URL the query executor targets.
    pub endpoint: Box<str>,
}

/// Boundary contract for activation working copies.
pub trait WorkspacePort: Send + Sync {
    /// Materialize a user-scoped working copy and return its endpoint.
    fn materialize(
        &self,
        ctx: &RequestContext,
        spec: WorkspaceSpec,
    ) -> BoxFuture<'_, Result<WorkspaceEndpoint>>;

    /// Tear down a user-scoped working copy.
    fn teardown(
        &self,
        ctx: &RequestContext,
        user_id: UserId,
        user_alias: UserAlias,
    ) -> BoxFuture<'_, Result<()>>;
}
