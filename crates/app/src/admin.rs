//! Admin lifecycle surface: authorization plus usage-confirmation checks.

use crate::activation::ActivationRegistry;
use crate::catalog::{AddRepositoryInput, CatalogStatus, GoldenCatalog};
use code_hub_domain::{GoldenRepository, RepoAlias, UserId};
use code_hub_shared::{ErrorCode, ErrorEnvelope, RequestContext, Result};

/// Caller identity for administrative operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminPrincipal {
    /// Acting user.
    pub user_id: UserId,
    /// Whether the user holds administrative privilege.
    pub is_admin: bool,
}

impl AdminPrincipal {
    fn ensure_admin(&self, operation: &'static str) -> Result<()> {
        if self.is_admin {
            return Ok(());
        }
        Err(ErrorEnvelope::expected(
            ErrorCode::unauthorized(),
            format!("{operation} requires administrative privilege"),
        )
        .with_metadata("user", self.user_id.to_string())
        .with_metadata("operation", operation))
    }
}

/// Register a golden repository (admin only).
pub async fn admin_add(
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    catalog: &GoldenCatalog,
    input: AddRepositoryInput,
) -> Result<GoldenRepository> {
    principal.ensure_admin("catalog.add")?;
    catalog.add(ctx, input).await
}

/// Re-index a golden repository (admin only).
pub async fn admin_refresh(
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    catalog: &GoldenCatalog,
    alias: &RepoAlias,
) -> Result<GoldenRepository> {
    principal.ensure_admin("catalog.refresh")?;
    catalog.refresh(ctx, alias).await
}

/// Delete a golden repository (admin only).
///
/// Without `force`, refuses while activations reference the target,
/// naming the dependent count rather than attempting partial cleanup.
pub async fn admin_delete(
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    catalog: &GoldenCatalog,
    activations: &ActivationRegistry,
    alias: &RepoAlias,
    force: bool,
) -> Result<()> {
    principal.ensure_admin("catalog.delete")?;

    if !force {
        let dependents = activations.dependents_of(alias);
        if !dependents.is_empty() {
            return Err(ErrorEnvelope::conflict(format!(
                "cannot delete {alias}: {} activation(s) still reference it \
                 (use force to fail them and delete anyway)",
                dependents.len()
            ))
            .with_metadata("alias", alias.to_string())
            .with_metadata("dependents", dependents.len().to_string()));
        }
    }

    catalog.delete(ctx, alias, force, activations).await
}

/// List the catalog (admin only).
pub fn admin_list(principal: &AdminPrincipal, catalog: &GoldenCatalog) -> Result<Vec<GoldenRepository>> {
    principal.ensure_admin("catalog.list")?;
    Ok(catalog.list())
}

/// Verify one repository's branch indexes (admin only).
pub async fn admin_status(
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    catalog: &GoldenCatalog,
    alias: &RepoAlias,
) -> Result<CatalogStatus> {
    principal.ensure_admin("catalog.status")?;
    catalog.status(ctx, alias).await
}
