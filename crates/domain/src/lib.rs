//! # code-hub-domain
//!
//! Domain entities, primitives, and value objects for the golden repository hub.
//!
//! This crate contains the core domain model with no infrastructure dependencies:
//!
//! - **Primitives** - `RepoAlias`, `UserAlias`, `UserId`, `BranchName`, `SourceUrl`
//! - **States** - `GoldenState`, `ActivationState` transition tables
//! - **Records** - `GoldenRepository`, `ActivatedRepository`
//! - **Alias** - deterministic user alias generation
//! - **Matching** - pure candidate ranking for branch/project queries
//!
//! ## Dependency Rules
//!
//! - Depends only on `shared` crate
//! - No infrastructure or adapter dependencies
//! - Pure domain logic with no I/O

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

// Re-export shared types for convenience
pub use code_hub_shared::shared_crate_version;

// =============================================================================
// DOMAIN MODULES
// =============================================================================

pub mod alias;
pub mod matching;
pub mod primitives;
pub mod records;
pub mod states;

pub use alias::generate_user_alias;
pub use matching::{
    MatchSelector, SCORE_ACTIVE, SCORE_GOLDEN_DEFAULT, SCORE_GOLDEN_EXACT, rank_candidates,
};
pub use primitives::{BranchName, PrimitiveError, RepoAlias, SourceUrl, UserAlias, UserId};
pub use records::{ActivatedRepository, GoldenRepository, MatchCandidate, RepositoryMatch};
pub use states::{ActivationState, GoldenState, invalid_transition};

/// Returns the domain crate version.
#[must_use]
pub const fn domain_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_crate_compiles() {
        let version = domain_crate_version();
        assert!(!version.is_empty());
    }

    #[test]
    fn domain_depends_on_shared() {
        // Verify we can access shared crate
        let shared_version = shared_crate_version();
        assert!(!shared_version.is_empty());
    }
}
