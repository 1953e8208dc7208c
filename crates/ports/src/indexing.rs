//! Indexing collaborator boundary contract.

use crate::BoxFuture;
use code_hub_domain::{BranchName, RepoAlias, SourceUrl};
use code_hub_shared::{RequestContext, Result};

/// Parameters for creating or refreshing one branch index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Golden repository alias that owns the index.
    pub alias: RepoAlias,
    /// Upstream source the collaborator clones from.
    pub source_url: SourceUrl,
    /// Branch to index.
    pub branch: BranchName,
}

/// Boundary contract for the external indexing collaborator.
///
/// The collaborator owns clones, chunking, and vector storage. The hub
/// only orchestrates lifecycle calls and interprets their outcomes.
pub trait IndexingPort: Send + Sync {
    /// Build a fresh index for one branch of a golden repository.
    fn create_index(&self, ctx: &RequestContext, spec: IndexSpec) -> BoxFuture<'_, Result<()>>;

    /// Re-index one branch in place. The previous index stays queryable
    /// until the refresh completes.
    fn refresh_index(&self, ctx: &RequestContext, spec: IndexSpec) -> BoxFuture<'_, Result<()>>;

    /// Remove all physical index state for one branch.
    fn delete_index(
        &self,
        ctx: &RequestContext,
        alias: RepoAlias,
        branch: BranchName,
    ) -> BoxFuture<'_, Result<()>>;

    /// Report whether a branch index is present and queryable.
    fn verify_index(
        &self,
        ctx: &RequestContext,
        alias: RepoAlias,
        branch: BranchName,
    ) -> BoxFuture<'_, Result<bool>>;
}
