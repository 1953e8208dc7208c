//! Repository resolution: match, then activate on demand.

use crate::activation::ActivationRegistry;
use crate::catalog::GoldenCatalog;
use code_hub_domain::{
    ActivatedRepository, MatchSelector, RepositoryMatch, UserId, rank_candidates,
};
use code_hub_shared::{RequestContext, Result};

/// Rank every candidate visible to `user_id` against `selector`.
///
/// Candidates are the user's own activations plus the golden catalog.
/// An empty result is a valid no-match, not an error.
#[must_use]
pub fn resolve_matches(
    catalog: &GoldenCatalog,
    activations: &ActivationRegistry,
    user_id: &UserId,
    selector: &MatchSelector,
) -> Vec<RepositoryMatch> {
    let user_activations = activations.activations_for(user_id);
    let goldens = catalog.list();
    rank_candidates(selector, &user_activations, &goldens)
}

/// Resolve `selector` to a queryable activated repository.
///
/// Takes the best match; golden matches are activated on demand via the
/// registry, already-activated matches pass through unchanged. Returns
/// `None` when nothing matches, so the caller can fall back to alternate
/// flows.
pub async fn resolve_repository(
    ctx: &RequestContext,
    catalog: &GoldenCatalog,
    activations: &ActivationRegistry,
    user_id: &UserId,
    selector: &MatchSelector,
    date_stamp: &str,
) -> Result<Option<ActivatedRepository>> {
    ctx.ensure_not_cancelled("matcher.resolve")?;

    let ranked = resolve_matches(catalog, activations, user_id, selector);
    let Some(best) = ranked.first() else {
        tracing::debug!(project = %selector.project, "no repository matched");
        return Ok(None);
    };

    let activated = activations.activate(ctx, best, user_id, date_stamp).await?;
    Ok(Some(activated))
}
