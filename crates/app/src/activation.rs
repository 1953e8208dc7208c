//! Activation registry with idempotent, single-flight activation.

use crate::epoch_ms;
use code_hub_domain::{
    ActivatedRepository, ActivationState, BranchName, GoldenRepository, GoldenState,
    MatchCandidate, RepoAlias, RepositoryMatch, UserAlias, UserId, generate_user_alias,
};
use code_hub_ports::workspace::{WorkspacePort, WorkspaceSpec};
use code_hub_shared::{
    ErrorCode, ErrorEnvelope, RequestContext, Result, SingleFlight,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type ActivationKey = (UserId, RepoAlias, BranchName);

/// Per-user registry of activated repositories.
///
/// Records are owned by their user; all mutation goes through the
/// registry. Concurrent activations for the same `(user, golden, branch)`
/// share one flight, so two racing callers never produce two records.
pub struct ActivationRegistry {
    entries: Mutex<HashMap<(UserId, UserAlias), ActivatedRepository>>,
    flights: SingleFlight<ActivationKey, ActivatedRepository>,
    workspace: Arc<dyn WorkspacePort>,
}

impl ActivationRegistry {
    /// Creates an empty registry backed by the given workspace service.
    #[must_use]
    pub fn new(workspace: Arc<dyn WorkspacePort>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            flights: SingleFlight::new(),
            workspace,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(UserId, UserAlias), ActivatedRepository>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the registry contents with previously persisted records.
    pub fn restore(&self, records: Vec<ActivatedRepository>) {
        let mut entries = self.entries();
        entries.clear();
        for record in records {
            entries.insert((record.user_id.clone(), record.user_alias.clone()), record);
        }
    }

    /// Snapshot of every record across users, ordered by user and alias.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ActivatedRepository> {
        let mut records: Vec<ActivatedRepository> = self.entries().values().cloned().collect();
        records.sort_by(|a, b| {
            (a.user_id.as_str(), a.user_alias.as_str())
                .cmp(&(b.user_id.as_str(), b.user_alias.as_str()))
        });
        records
    }

    /// All activations owned by `user_id`, ordered by alias.
    #[must_use]
    pub fn activations_for(&self, user_id: &UserId) -> Vec<ActivatedRepository> {
        let mut records: Vec<ActivatedRepository> = self
            .entries()
            .values()
            .filter(|record| &record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.user_alias.as_str().cmp(b.user_alias.as_str()));
        records
    }

    /// All activations (any user) referencing `golden_alias`.
    #[must_use]
    pub fn dependents_of(&self, golden_alias: &RepoAlias) -> Vec<ActivatedRepository> {
        self.entries()
            .values()
            .filter(|record| &record.golden_alias == golden_alias)
            .cloned()
            .collect()
    }

    /// Synchronously mark every activation of `golden_alias` as failed.
    ///
    /// Used by forced golden deletion; records are kept so users can see
    /// why their activation stopped working.
    pub fn fail_dependents(&self, golden_alias: &RepoAlias) {
        let mut entries = self.entries();
        for record in entries.values_mut() {
            if &record.golden_alias == golden_alias
                && record.state.can_transition(ActivationState::Failed)
            {
                record.state = ActivationState::Failed;
            }
        }
    }

    /// Activate the matched repository for `user_id`.
    ///
    /// Pass-through when the match is already an activated record.
    /// Otherwise materializes a user-scoped working copy of the golden
    /// repository at the matched branch. Failed activations are recorded
    /// and reported; they are never retried automatically.
    pub async fn activate(
        &self,
        ctx: &RequestContext,
        m: &RepositoryMatch,
        user_id: &UserId,
        date_stamp: &str,
    ) -> Result<ActivatedRepository> {
        let golden = match &m.candidate {
            MatchCandidate::Activated(record) => return Ok(record.clone()),
            MatchCandidate::Golden(golden) => golden.clone(),
        };

        if golden.state != GoldenState::Ready {
            return Err(ErrorEnvelope::conflict(format!(
                "golden repository {} is {}, not ready",
                golden.alias, golden.state
            ))
            .with_metadata("alias", golden.alias.to_string()));
        }

        let key = (user_id.clone(), golden.alias.clone(), m.branch.clone());
        let branch = m.branch.clone();
        let user_id = user_id.clone();
        let date_stamp = date_stamp.to_owned();

        self.flights
            .run(ctx, key, || async move {
                // A completed earlier flight satisfies repeat callers.
                if let Some(existing) = self.find_active(&user_id, &golden.alias, &branch) {
                    return Ok(existing);
                }

                let user_alias = self.reserve_record(&user_id, &golden, &branch, &date_stamp)?;

                tracing::info!(
                    user = %user_id,
                    alias = %user_alias,
                    golden = %golden.alias,
                    %branch,
                    "activating golden repository"
                );

                let spec = WorkspaceSpec {
                    user_id: user_id.clone(),
                    user_alias: user_alias.clone(),
                    golden_alias: golden.alias.clone(),
                    branch: branch.clone(),
                };
                match self.workspace.materialize(ctx, spec).await {
                    Ok(endpoint) => self.set_state(&user_id, &user_alias, |record| {
                        record.state = ActivationState::Active;
                        record.endpoint = endpoint.endpoint.clone();
                        record.activated_at_ms = epoch_ms();
                    }),
                    Err(error) => {
                        let _ = self.set_state(&user_id, &user_alias, |record| {
                            record.state = ActivationState::Failed;
                        });
                        Err(ErrorEnvelope::expected(
                            ErrorCode::activation_failed(),
                            format!(
                                "activation of {} at {branch} failed for {user_id}",
                                golden.alias
                            ),
                        )
                        .with_metadata("golden_alias", golden.alias.to_string())
                        .with_metadata("user_alias", user_alias.to_string())
                        .with_metadata("branch", branch.to_string())
                        .with_metadata("cause", error.to_string()))
                    },
                }
            })
            .await
    }

    /// Tear down an active working copy and drop its record.
    pub async fn deactivate(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
        user_alias: &UserAlias,
    ) -> Result<()> {
        ctx.ensure_not_cancelled("activation.deactivate")?;

        self.set_state(user_id, user_alias, |record| {
            record.state = ActivationState::Deactivating;
        })
        .map_err(|error| {
            if error.is_conflict() {
                ErrorEnvelope::conflict(format!(
                    "activation {user_alias} is not active"
                ))
                .with_metadata("user_alias", user_alias.to_string())
            } else {
                error
            }
        })?;

        match self
            .workspace
            .teardown(ctx, user_id.clone(), user_alias.clone())
            .await
        {
            Ok(()) => {
                self.entries().remove(&(user_id.clone(), user_alias.clone()));
                Ok(())
            },
            Err(error) => {
                let _ = self.set_state(user_id, user_alias, |record| {
                    record.state = ActivationState::Failed;
                });
                Err(error)
            },
        }
    }

    /// Pick a free alias for the user and insert the `Activating`
    /// placeholder under it.
    ///
    /// Check and insert happen under one `entries` guard, so racing
    /// flights with colliding base aliases each reserve a distinct one.
    fn reserve_record(
        &self,
        user_id: &UserId,
        golden: &GoldenRepository,
        branch: &BranchName,
        date_stamp: &str,
    ) -> Result<UserAlias> {
        let mut entries = self.entries();
        let taken: BTreeSet<UserAlias> = entries
            .values()
            .filter(|record| &record.user_id == user_id)
            .map(|record| record.user_alias.clone())
            .collect();
        let user_alias = generate_user_alias(
            &golden.source_url.project_name(),
            branch,
            date_stamp,
            &taken,
        )
        .map_err(ErrorEnvelope::from)?;

        let record = ActivatedRepository {
            user_id: user_id.clone(),
            user_alias: user_alias.clone(),
            golden_alias: golden.alias.clone(),
            branch: branch.clone(),
            endpoint: "".into(),
            state: ActivationState::Activating,
            activated_at_ms: 0,
        };
        entries.insert((user_id.clone(), user_alias.clone()), record);
        Ok(user_alias)
    }

    fn find_active(
        &self,
        user_id: &UserId,
        golden_alias: &RepoAlias,
        branch: &BranchName,
    ) -> Option<ActivatedRepository> {
        self.entries()
            .values()
            .find(|record| {
                &record.user_id == user_id
                    && &record.golden_alias == golden_alias
                    && &record.branch == branch
                    && record.state == ActivationState::Active
            })
            .cloned()
    }

    fn set_state(
        &self,
        user_id: &UserId,
        user_alias: &UserAlias,
        update: impl FnOnce(&mut ActivatedRepository),
    ) -> Result<ActivatedRepository> {
        let mut entries = self.entries();
        let record = entries
            .get_mut(&(user_id.clone(), user_alias.clone()))
            .ok_or_else(|| {
                ErrorEnvelope::not_found(format!("unknown activation {user_alias}"))
                    .with_metadata("user_alias", user_alias.to_string())
            })?;

        let mut next = record.clone();
        update(&mut next);
        if next.state != record.state && !record.state.can_transition(next.state) {
            return Err(ErrorEnvelope::conflict(format!(
                "invalid activation transition {} -> {}",
                record.state, next.state
            ))
            .with_metadata("user_alias", user_alias.to_string()));
        }
        *record = next;
        Ok(record.clone())
    }
}
