//! Remote query execution with failure classification and retry.

use code_hub_domain::{ActivatedRepository, ActivationState};
use code_hub_ports::query::{QueryResponse, QueryTransportPort, RepositoryQuery};
use code_hub_shared::{
    ErrorCode, ErrorEnvelope, RequestContext, Result, RetryPolicy, retry_async,
    timeout_with_context,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Input payload for one remote query.
#[derive(Debug, Clone)]
pub struct QueryExecInput {
    /// Target activation; must be `Active`.
    pub activated: ActivatedRepository,
    /// Free-text search query.
    pub query: Box<str>,
    /// Maximum number of hits to return.
    pub max_results: u32,
    /// Hard deadline for the whole call including retries.
    pub budget: Duration,
    /// Backoff policy for transient failures.
    pub policy: RetryPolicy,
}

/// Dependencies required by query execution.
#[derive(Clone)]
pub struct QueryExecDeps {
    /// Transport performing single attempts.
    pub transport: Arc<dyn QueryTransportPort>,
}

/// Structured disposition of one query, reported to the caller.
///
/// The caller decides on user-facing guidance; the executor only
/// classifies.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The query returned results, possibly after transient retries.
    Succeeded {
        /// Decoded response from the remote endpoint.
        response: QueryResponse,
        /// Number of retries that preceded success.
        retries: u32,
    },
    /// Transient failures persisted through every attempt or the budget.
    ExhaustedRetries {
        /// Terminal transient error.
        error: ErrorEnvelope,
    },
    /// A permanent failure surfaced; no retry was attempted.
    PermanentFailure {
        /// The permanent error.
        error: ErrorEnvelope,
    },
}

/// Execute a query against an activated repository's endpoint.
///
/// Only `Transient` failures are retried, with exponential backoff and
/// jitter, bounded both by the policy's attempt count and by `budget` as
/// a hard deadline. Cancellation propagates as an error; every other
/// disposition is reported through [`QueryOutcome`].
pub async fn execute_query(
    ctx: &RequestContext,
    deps: &QueryExecDeps,
    input: QueryExecInput,
) -> Result<QueryOutcome> {
    ctx.ensure_not_cancelled("query_exec.execute")?;

    if input.activated.state != ActivationState::Active {
        return Err(ErrorEnvelope::conflict(format!(
            "activation {} is {}, not active",
            input.activated.user_alias, input.activated.state
        ))
        .with_metadata("user_alias", input.activated.user_alias.to_string()));
    }

    let endpoint = input.activated.endpoint.clone();
    let request = RepositoryQuery {
        query: input.query.clone(),
        branch: input.activated.branch.clone(),
        max_results: input.max_results,
    };
    let deadline = Instant::now() + input.budget;
    let transport = Arc::clone(&deps.transport);

    let attempt_loop = retry_async(
        ctx,
        input.policy,
        Some(deadline),
        "query_exec.attempt",
        || {
            let request = request.clone();
            let endpoint = endpoint.clone();
            let transport = Arc::clone(&transport);
            async move { transport.execute(ctx, &endpoint, request).await }
        },
    );

    let result = timeout_with_context(ctx, input.budget, "query_exec.execute", attempt_loop).await;

    match result {
        Ok(report) => {
            tracing::debug!(
                alias = %input.activated.user_alias,
                retries = report.retries,
                "query succeeded"
            );
            Ok(QueryOutcome::Succeeded {
                response: report.value,
                retries: report.retries,
            })
        },
        Err(error) if error.is_cancelled() => Err(error),
        Err(error) if error.class.is_retriable() || error.code == ErrorCode::timeout() => {
            Ok(QueryOutcome::ExhaustedRetries { error })
        },
        Err(error) => Ok(QueryOutcome::PermanentFailure { error }),
    }
}
