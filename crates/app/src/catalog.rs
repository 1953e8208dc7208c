//! Golden repository catalog with lock-guarded lifecycle transitions.

use crate::activation::ActivationRegistry;
use crate::epoch_ms;
use code_hub_domain::{
    BranchName, GoldenRepository, GoldenState, RepoAlias, SourceUrl, invalid_transition,
};
use code_hub_ports::indexing::{IndexSpec, IndexingPort};
use code_hub_shared::{
    ErrorCode, ErrorEnvelope, KeyedLock, RequestContext, Result,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Input payload for registering a golden repository.
#[derive(Debug, Clone)]
pub struct AddRepositoryInput {
    /// Upstream source to index.
    pub source_url: SourceUrl,
    /// Explicit alias; derived from the source URL when absent.
    pub alias: Option<RepoAlias>,
    /// Branches to track; defaults to `main` when empty.
    pub branches: Vec<BranchName>,
    /// Default branch; defaults to the first tracked branch.
    pub default_branch: Option<BranchName>,
}

/// Index health report for one golden repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStatus {
    /// Current catalog record.
    pub repository: GoldenRepository,
    /// Tracked branches whose index the collaborator no longer reports.
    pub missing_branches: Vec<BranchName>,
}

/// Central catalog of golden repositories.
///
/// The alias map is the only shared mutable state; every lifecycle
/// transition happens under that alias's exclusive lock, so concurrent
/// refresh and delete on the same alias serialize while distinct aliases
/// proceed independently.
pub struct GoldenCatalog {
    entries: Mutex<HashMap<RepoAlias, GoldenRepository>>,
    locks: KeyedLock<RepoAlias>,
    indexing: Arc<dyn IndexingPort>,
}

impl GoldenCatalog {
    /// Creates an empty catalog backed by the given indexing collaborator.
    #[must_use]
    pub fn new(indexing: Arc<dyn IndexingPort>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            locks: KeyedLock::new(),
            indexing,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RepoAlias, GoldenRepository>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the catalog contents with previously persisted records.
    pub fn restore(&self, records: Vec<GoldenRepository>) {
        let mut entries = self.entries();
        entries.clear();
        for record in records {
            entries.insert(record.alias.clone(), record);
        }
    }

    /// Register a golden repository and build its branch indexes.
    ///
    /// The entry becomes `Ready` only after the indexing collaborator
    /// reports success for every tracked branch; on any failure the entry
    /// is purged and the call fails.
    pub async fn add(
        &self,
        ctx: &RequestContext,
        input: AddRepositoryInput,
    ) -> Result<GoldenRepository> {
        ctx.ensure_not_cancelled("catalog.add")?;

        let alias = match input.alias {
            Some(alias) => alias,
            None => RepoAlias::parse(input.source_url.project_name()).map_err(|error| {
                ErrorEnvelope::from(error)
                    .with_metadata("source_url", input.source_url.to_string())
            })?,
        };

        let branches = if input.branches.is_empty() {
            vec![BranchName::parse("main").map_err(ErrorEnvelope::from)?]
        } else {
            input.branches
        };
        let default_branch = match input.default_branch {
            Some(branch) => branch,
            None => branches[0].clone(),
        };
        if !branches.contains(&default_branch) {
            return Err(ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("default branch {default_branch} is not tracked"),
            ));
        }

        let _guard = self.locks.acquire(alias.clone()).await;

        {
            let mut entries = self.entries();
            if entries.contains_key(&alias) {
                return Err(ErrorEnvelope::conflict(format!(
                    "golden repository {alias} already exists"
                ))
                .with_metadata("alias", alias.to_string()));
            }
            entries.insert(
                alias.clone(),
                GoldenRepository {
                    alias: alias.clone(),
                    source_url: input.source_url.clone(),
                    branches: branches.clone(),
                    default_branch,
                    state: GoldenState::Creating,
                    created_at_ms: epoch_ms(),
                    last_refreshed_at_ms: 0,
                },
            );
        }

        tracing::info!(%alias, branches = branches.len(), "creating golden repository");

        let mut created: Vec<BranchName> = Vec::new();
        for branch in &branches {
            let spec = IndexSpec {
                alias: alias.clone(),
                source_url: input.source_url.clone(),
                branch: branch.clone(),
            };
            match self.indexing.create_index(ctx, spec).await {
                Ok(()) => created.push(branch.clone()),
                Err(error) => {
                    self.rollback_add(ctx, &alias, &created).await;
                    return Err(ErrorEnvelope::expected(
                        ErrorCode::indexing_failed(),
                        format!("index creation failed for {alias}/{branch}"),
                    )
                    .with_metadata("alias", alias.to_string())
                    .with_metadata("branch", branch.to_string())
                    .with_metadata("cause", error.to_string()));
                },
            }
        }

        self.transition(&alias, GoldenState::Creating, GoldenState::Ready, |record| {
            record.last_refreshed_at_ms = epoch_ms();
        })
    }

    /// Re-index every tracked branch of a `Ready` repository.
    ///
    /// Refresh failure is non-fatal to the existing index; the entry
    /// reverts to `Ready` and the collaborator failure is reported.
    pub async fn refresh(&self, ctx: &RequestContext, alias: &RepoAlias) -> Result<GoldenRepository> {
        ctx.ensure_not_cancelled("catalog.refresh")?;
        let _guard = self.locks.acquire(alias.clone()).await;

        let repository = self.get(alias)?;
        if repository.state != GoldenState::Ready {
            return Err(invalid_transition(
                alias.as_str(),
                repository.state,
                GoldenState::Refreshing,
            ));
        }
        self.transition(alias, GoldenState::Ready, GoldenState::Refreshing, |_| {})?;

        tracing::info!(%alias, "refreshing golden repository");

        for branch in &repository.branches {
            let spec = IndexSpec {
                alias: alias.clone(),
                source_url: repository.source_url.clone(),
                branch: branch.clone(),
            };
            if let Err(error) = self.indexing.refresh_index(ctx, spec).await {
                self.transition(alias, GoldenState::Refreshing, GoldenState::Ready, |_| {})?;
                return Err(ErrorEnvelope::expected(
                    ErrorCode::refresh_failed(),
                    format!("refresh failed for {alias}/{branch}; existing index kept"),
                )
                .with_metadata("alias", alias.to_string())
                .with_metadata("branch", branch.to_string())
                .with_metadata("cause", error.to_string()));
            }
        }

        self.transition(alias, GoldenState::Refreshing, GoldenState::Ready, |record| {
            record.last_refreshed_at_ms = epoch_ms();
        })
    }

    /// Delete a golden repository and its branch indexes.
    ///
    /// Without `force` the call refuses while any activation references
    /// the alias. With `force` all dependent activations are failed
    /// synchronously before cleanup starts. If cleanup fails the entry
    /// stays `Deleting` and requires manual intervention.
    pub async fn delete(
        &self,
        ctx: &RequestContext,
        alias: &RepoAlias,
        force: bool,
        activations: &ActivationRegistry,
    ) -> Result<()> {
        ctx.ensure_not_cancelled("catalog.delete")?;
        let _guard = self.locks.acquire(alias.clone()).await;

        let repository = self.get(alias)?;
        let dependents = activations.dependents_of(alias);
        if !dependents.is_empty() {
            if !force {
                return Err(ErrorEnvelope::conflict(format!(
                    "repository {alias} is in use by {} activation(s)",
                    dependents.len()
                ))
                .with_metadata("alias", alias.to_string())
                .with_metadata("dependents", dependents.len().to_string()));
            }
            activations.fail_dependents(alias);
        }

        if repository.state != GoldenState::Deleting {
            self.transition(alias, repository.state, GoldenState::Deleting, |_| {})?;
        }

        tracing::info!(%alias, force, "deleting golden repository");

        for branch in &repository.branches {
            if let Err(error) = self
                .indexing
                .delete_index(ctx, alias.clone(), branch.clone())
                .await
            {
                return Err(ErrorEnvelope::invariant(
                    ErrorCode::delete_stuck(),
                    format!(
                        "cleanup failed for {alias}/{branch}; entry left in deleting state, \
                         manual intervention required"
                    ),
                )
                .with_metadata("alias", alias.to_string())
                .with_metadata("branch", branch.to_string())
                .with_metadata("cause", error.to_string()));
            }
        }

        self.transition(alias, GoldenState::Deleting, GoldenState::Deleted, |_| {})?;
        self.entries().remove(alias);
        Ok(())
    }

    /// Look up one catalog record.
    pub fn get(&self, alias: &RepoAlias) -> Result<GoldenRepository> {
        self.entries().get(alias).cloned().ok_or_else(|| {
            ErrorEnvelope::not_found(format!("unknown golden repository {alias}"))
                .with_metadata("alias", alias.to_string())
        })
    }

    /// All catalog records ordered by alias.
    #[must_use]
    pub fn list(&self) -> Vec<GoldenRepository> {
        let mut records: Vec<GoldenRepository> = self.entries().values().cloned().collect();
        records.sort_by(|a, b| a.alias.as_str().cmp(b.alias.as_str()));
        records
    }

    /// Verify every branch index of one repository with the collaborator.
    pub async fn status(&self, ctx: &RequestContext, alias: &RepoAlias) -> Result<CatalogStatus> {
        ctx.ensure_not_cancelled("catalog.status")?;
        let repository = self.get(alias)?;

        let mut missing_branches = Vec::new();
        for branch in &repository.branches {
            let present = self
                .indexing
                .verify_index(ctx, alias.clone(), branch.clone())
                .await?;
            if !present {
                missing_branches.push(branch.clone());
            }
        }

        Ok(CatalogStatus {
            repository,
            missing_branches,
        })
    }

    /// Best-effort rollback of partially created branch indexes.
    async fn rollback_add(&self, ctx: &RequestContext, alias: &RepoAlias, created: &[BranchName]) {
        for branch in created {
            if let Err(error) = self
                .indexing
                .delete_index(ctx, alias.clone(), branch.clone())
                .await
            {
                tracing::warn!(%alias, %branch, %error, "rollback of partial index failed");
            }
        }
        self.entries().remove(alias);
    }

    fn transition(
        &self,
        alias: &RepoAlias,
        from: GoldenState,
        to: GoldenState,
        update: impl FnOnce(&mut GoldenRepository),
    ) -> Result<GoldenRepository> {
        let mut entries = self.entries();
        let record = entries.get_mut(alias).ok_or_else(|| {
            ErrorEnvelope::not_found(format!("unknown golden repository {alias}"))
        })?;
        if record.state != from || !from.can_transition(to) {
            return Err(invalid_transition(alias.as_str(), record.state, to));
        }
        record.state = to;
        update(record);
        Ok(record.clone())
    }
}
