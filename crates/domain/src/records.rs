//! Catalog and activation records.

use crate::primitives::{BranchName, RepoAlias, SourceUrl, UserAlias, UserId};
use crate::states::{ActivationState, GoldenState};
use serde::{Deserialize, Serialize};

/// A centrally indexed, administrator-managed source repository.
///
/// Owned exclusively by the catalog; mutated only through its lock-guarded
/// transition operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldenRepository {
    /// Unique, immutable alias assigned at creation.
    pub alias: RepoAlias,
    /// Upstream source location.
    pub source_url: SourceUrl,
    /// Indexed branches, in administrator-supplied order.
    pub branches: Vec<BranchName>,
    /// Branch used when a query names no branch.
    pub default_branch: BranchName,
    /// Lifecycle state.
    pub state: GoldenState,
    /// Creation time (ms since epoch).
    pub created_at_ms: u64,
    /// Last successful refresh time (ms since epoch).
    pub last_refreshed_at_ms: u64,
}

impl GoldenRepository {
    /// Returns true when `branch` is indexed by this repository.
    #[must_use]
    pub fn has_branch(&self, branch: &BranchName) -> bool {
        self.branches.iter().any(|candidate| candidate == branch)
    }
}

/// A user-scoped, queryable working copy derived from a golden repository.
///
/// The `golden_alias` field is a weak back-reference used for validation and
/// lookup, not ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedRepository {
    /// Owning user.
    pub user_id: UserId,
    /// Alias unique within the owning user's namespace.
    pub user_alias: UserAlias,
    /// Back-reference to the golden repository this was activated from.
    pub golden_alias: RepoAlias,
    /// Branch the working copy tracks.
    pub branch: BranchName,
    /// Query endpoint of the materialized working copy.
    pub endpoint: Box<str>,
    /// Lifecycle state.
    pub state: ActivationState,
    /// Activation time (ms since epoch).
    pub activated_at_ms: u64,
}

/// A match candidate: either an existing activation or a golden repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchCandidate {
    /// The user already holds an activated working copy.
    Activated(ActivatedRepository),
    /// A golden repository that would require activation.
    Golden(GoldenRepository),
}

impl MatchCandidate {
    /// Alias of the underlying golden repository.
    #[must_use]
    pub fn golden_alias(&self) -> &RepoAlias {
        match self {
            Self::Activated(activated) => &activated.golden_alias,
            Self::Golden(golden) => &golden.alias,
        }
    }
}

/// Transient ranking result produced by the matcher. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryMatch {
    /// The ranked candidate.
    pub candidate: MatchCandidate,
    /// Branch the candidate would serve.
    pub branch: BranchName,
    /// Ranking score; higher is better.
    pub match_score: u32,
}
