//! Activation registry integration tests with gated workspace fakes.
#![allow(missing_docs)]

use code_hub_app::ActivationRegistry;
use code_hub_domain::{
    ActivationState, BranchName, GoldenRepository, GoldenState, MatchCandidate, RepoAlias,
    RepositoryMatch, SourceUrl, UserAlias, UserId,
};
use code_hub_ports::BoxFuture;
use code_hub_ports::workspace::{WorkspaceEndpoint, WorkspacePort, WorkspaceSpec};
use code_hub_shared::{ErrorClass, ErrorCode, ErrorEnvelope, RequestContext, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Notify;

/// Workspace fake that counts calls and can block until released.
struct GatedWorkspace {
    calls: AtomicU32,
    failures: AtomicU32,
    gate: Option<Arc<Notify>>,
}

impl GatedWorkspace {
    fn passing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            gate: None,
        }
    }

    fn failing_once() -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(1),
            gate: None,
        }
    }

    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            gate: Some(gate),
        }
    }
}

impl WorkspacePort for GatedWorkspace {
    fn materialize(
        &self,
        _ctx: &RequestContext,
        spec: WorkspaceSpec,
    ) -> BoxFuture<'_, Result<WorkspaceEndpoint>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        let gate = self.gate.clone();
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if fail {
                return Err(ErrorEnvelope::unexpected(
                    ErrorCode::network(),
                    "materialization failed",
                    ErrorClass::Retriable,
                ));
            }
            Ok(WorkspaceEndpoint {
                endpoint: format!("http://127.0.0.1:8090/repos/{}", spec.user_alias).into(),
            })
        })
    }

    fn teardown(
        &self,
        _ctx: &RequestContext,
        _user_id: UserId,
        _user_alias: UserAlias,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { Ok(()) })
    }
}

fn golden(alias: &str, branches: &[&str]) -> Result<GoldenRepository> {
    Ok(GoldenRepository {
        alias: RepoAlias::parse(alias).map_err(ErrorEnvelope::from)?,
        source_url: SourceUrl::parse(format!("https://git.example.com/org/{alias}.git"))
            .map_err(ErrorEnvelope::from)?,
        branches: branches
            .iter()
            .map(BranchName::parse)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ErrorEnvelope::from)?,
        default_branch: BranchName::parse(branches[0]).map_err(ErrorEnvelope::from)?,
        state: GoldenState::Ready,
        created_at_ms: 1,
        last_refreshed_at_ms: 1,
    })
}

fn golden_match(golden: GoldenRepository, branch: &str) -> Result<RepositoryMatch> {
    Ok(RepositoryMatch {
        branch: BranchName::parse(branch).map_err(ErrorEnvelope::from)?,
        candidate: MatchCandidate::Golden(golden),
        match_score: 200,
    })
}

#[tokio::test]
async fn activation_materializes_and_becomes_active() -> Result<()> {
    let registry = ActivationRegistry::new(Arc::new(GatedWorkspace::passing()));
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let m = golden_match(golden("acme", &["main"])?, "main")?;
    let record = registry.activate(&ctx, &m, &user, "2026-08-29").await?;

    assert_eq!(record.state, ActivationState::Active);
    assert_eq!(record.user_alias.as_str(), "acme-main-2026-08-29");
    assert!(record.endpoint.contains("acme-main-2026-08-29"));
    assert!(record.activated_at_ms > 0);
    Ok(())
}

#[tokio::test]
async fn repeated_activation_is_idempotent() -> Result<()> {
    let workspace = Arc::new(GatedWorkspace::passing());
    let registry = ActivationRegistry::new(workspace.clone());
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let m = golden_match(golden("acme", &["main"])?, "main")?;
    let first = registry.activate(&ctx, &m, &user, "2026-08-29").await?;
    let second = registry.activate(&ctx, &m, &user, "2026-08-30").await?;

    assert_eq!(first.user_alias, second.user_alias);
    assert_eq!(workspace.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn activated_candidate_passes_through_unchanged() -> Result<()> {
    let registry = ActivationRegistry::new(Arc::new(GatedWorkspace::passing()));
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let m = golden_match(golden("acme", &["main"])?, "main")?;
    let first = registry.activate(&ctx, &m, &user, "2026-08-29").await?;

    let pass_through = RepositoryMatch {
        branch: first.branch.clone(),
        candidate: MatchCandidate::Activated(first.clone()),
        match_score: 300,
    };
    let again = registry.activate(&ctx, &pass_through, &user, "2026-08-30").await?;
    assert_eq!(again, first);
    Ok(())
}

#[tokio::test]
async fn concurrent_activations_share_one_flight() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let workspace = Arc::new(GatedWorkspace::gated(gate.clone()));
    let registry = Arc::new(ActivationRegistry::new(workspace.clone()));
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let m = golden_match(golden("acme", &["main"])?, "main")?;

    let leader = {
        let registry = Arc::clone(&registry);
        let m = m.clone();
        let user = user.clone();
        tokio::spawn(async move {
            let ctx = RequestContext::new_request();
            registry.activate(&ctx, &m, &user, "2026-08-29").await
        })
    };
    let follower = {
        let registry = Arc::clone(&registry);
        let m = m.clone();
        let user = user.clone();
        tokio::spawn(async move {
            let ctx = RequestContext::new_request();
            registry.activate(&ctx, &m, &user, "2026-08-29").await
        })
    };

    // Let both tasks reach the flight before releasing the workspace call.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    gate.notify_waiters();

    let first = leader.await.map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            error.to_string(),
            ErrorClass::NonRetriable,
        )
    })??;
    let second = follower.await.map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            error.to_string(),
            ErrorClass::NonRetriable,
        )
    })??;

    assert_eq!(first.user_alias, second.user_alias);
    assert_eq!(workspace.calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.activations_for(&user).len(), 1);
    Ok(())
}

#[tokio::test]
async fn racing_activations_with_colliding_base_aliases_stay_distinct() -> Result<()> {
    let gate = Arc::new(Notify::new());
    let workspace = Arc::new(GatedWorkspace::gated(gate.clone()));
    let registry = Arc::new(ActivationRegistry::new(workspace.clone()));
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    // Distinct goldens whose source URLs share the project name, so both
    // flights generate the same base alias.
    let mut first_golden = golden("acme", &["main"])?;
    first_golden.source_url =
        SourceUrl::parse("https://git.example.com/org-a/acme.git").map_err(ErrorEnvelope::from)?;
    let mut second_golden = golden("acme-mirror", &["main"])?;
    second_golden.source_url =
        SourceUrl::parse("https://git.example.com/org-b/acme.git").map_err(ErrorEnvelope::from)?;

    let first_task = {
        let registry = Arc::clone(&registry);
        let m = golden_match(first_golden, "main")?;
        let user = user.clone();
        tokio::spawn(async move {
            let ctx = RequestContext::new_request();
            registry.activate(&ctx, &m, &user, "2026-08-29").await
        })
    };
    let second_task = {
        let registry = Arc::clone(&registry);
        let m = golden_match(second_golden, "main")?;
        let user = user.clone();
        tokio::spawn(async move {
            let ctx = RequestContext::new_request();
            registry.activate(&ctx, &m, &user, "2026-08-29").await
        })
    };

    // Both flights must reserve their alias before either finishes.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    gate.notify_waiters();

    let first = first_task.await.map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            error.to_string(),
            ErrorClass::NonRetriable,
        )
    })??;
    let second = second_task.await.map_err(|error| {
        ErrorEnvelope::unexpected(
            ErrorCode::internal(),
            error.to_string(),
            ErrorClass::NonRetriable,
        )
    })??;

    assert_ne!(first.user_alias, second.user_alias);
    assert_eq!(workspace.calls.load(Ordering::SeqCst), 2);

    let records = registry.activations_for(&user);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.state == ActivationState::Active));
    let aliases: Vec<&str> = records
        .iter()
        .map(|record| record.user_alias.as_str())
        .collect();
    assert_eq!(aliases, vec!["acme-main-2026-08-29", "acme-main-2026-08-29-2"]);
    Ok(())
}

#[tokio::test]
async fn failed_activation_is_recorded_and_not_retried() -> Result<()> {
    let workspace = Arc::new(GatedWorkspace::failing_once());
    let registry = ActivationRegistry::new(workspace.clone());
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let m = golden_match(golden("acme", &["main"])?, "main")?;
    let result = registry.activate(&ctx, &m, &user, "2026-08-29").await;

    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.code.code(), "activation_failed");
        assert!(error.metadata.contains_key("cause"));
    }

    let records = registry.activations_for(&user);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].state, ActivationState::Failed);
    assert_eq!(workspace.calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn alias_collision_appends_numeric_suffix() -> Result<()> {
    let registry = ActivationRegistry::new(Arc::new(GatedWorkspace::passing()));
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    // Two different golden repositories sharing a project name produce
    // colliding base aliases.
    let mut first_golden = golden("acme", &["main"])?;
    first_golden.source_url =
        SourceUrl::parse("https://git.example.com/org/acme.git").map_err(ErrorEnvelope::from)?;
    let mut second_golden = golden("acme-mirror", &["main"])?;
    second_golden.source_url =
        SourceUrl::parse("https://mirror.example.com/acme.git").map_err(ErrorEnvelope::from)?;

    let first = registry
        .activate(&ctx, &golden_match(first_golden, "main")?, &user, "2026-08-29")
        .await?;
    let second = registry
        .activate(&ctx, &golden_match(second_golden, "main")?, &user, "2026-08-29")
        .await?;

    assert_eq!(first.user_alias.as_str(), "acme-main-2026-08-29");
    assert_eq!(second.user_alias.as_str(), "acme-main-2026-08-29-2");
    Ok(())
}

#[tokio::test]
async fn activation_requires_ready_golden() -> Result<()> {
    let registry = ActivationRegistry::new(Arc::new(GatedWorkspace::passing()));
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let mut not_ready = golden("acme", &["main"])?;
    not_ready.state = GoldenState::Creating;
    let result = registry
        .activate(&ctx, &golden_match(not_ready, "main")?, &user, "2026-08-29")
        .await;

    assert!(result.is_err());
    if let Err(error) = result {
        assert!(error.is_conflict());
    }
    Ok(())
}

#[tokio::test]
async fn deactivate_removes_the_record() -> Result<()> {
    let registry = ActivationRegistry::new(Arc::new(GatedWorkspace::passing()));
    let ctx = RequestContext::new_request();
    let user = UserId::parse("u1").map_err(ErrorEnvelope::from)?;

    let m = golden_match(golden("acme", &["main"])?, "main")?;
    let record = registry.activate(&ctx, &m, &user, "2026-08-29").await?;

    registry.deactivate(&ctx, &user, &record.user_alias).await?;
    assert!(registry.activations_for(&user).is_empty());
    Ok(())
}
