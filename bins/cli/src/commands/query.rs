//! Query command handler: resolve, activate on demand, execute.

use super::activate::{no_match_output, parse_selector};
use crate::error::{CliError, ExitCode, envelope_exit_code};
use crate::format::OutputMode;
use crate::{CliOutput, HubServices, format_error_output};
use code_hub_app::{QueryExecDeps, QueryExecInput, QueryOutcome, execute_query, resolve_repository};
use code_hub_ports::query::QueryResponse;
use code_hub_shared::RequestContext;
use std::fmt::Write;
use std::time::Duration;

/// Inputs for the `query` command.
pub struct QueryCommandInput<'a> {
    pub project: &'a str,
    pub branch: Option<&'a str>,
    pub query: &'a str,
    pub max_results: Option<u32>,
    pub user_id: &'a str,
    pub date_stamp: &'a str,
}

/// Run `chub query`: resolve the repository, then execute with retry.
pub async fn run_query(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    input: &QueryCommandInput<'_>,
) -> Result<CliOutput, CliError> {
    let (user_id, selector) = match parse_selector(input.user_id, input.project, input.branch) {
        Ok(parsed) => parsed,
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    let resolved = resolve_repository(
        ctx,
        &services.catalog,
        &services.registry,
        &user_id,
        &selector,
        input.date_stamp,
    )
    .await;
    let activated = match resolved {
        Ok(Some(record)) => record,
        Ok(None) => return no_match_output(mode, input.project),
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    let query_config = &services.config.query;
    let exec_input = QueryExecInput {
        activated,
        query: input.query.into(),
        max_results: input.max_results.unwrap_or(query_config.max_results),
        budget: Duration::from_millis(query_config.budget_ms),
        policy: services.config.retry.to_policy(),
    };
    let deps = QueryExecDeps {
        transport: services.transport.clone(),
    };

    match execute_query(ctx, &deps, exec_input).await {
        Ok(QueryOutcome::Succeeded { response, retries }) => {
            Ok(success_output(mode, &response, retries)?)
        },
        Ok(QueryOutcome::ExhaustedRetries { error }) => {
            let mut output = format_error_output(mode, &error, ctx);
            if !mode.is_json() {
                output.stderr.push_str("transient failures exhausted the retry budget\n");
            }
            output.exit_code = ExitCode::Network;
            Ok(output)
        },
        Ok(QueryOutcome::PermanentFailure { error }) => {
            let mut output = format_error_output(mode, &error, ctx);
            output.exit_code = envelope_exit_code(&error);
            Ok(output)
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

fn success_output(
    mode: OutputMode,
    response: &QueryResponse,
    retries: u32,
) -> Result<CliOutput, CliError> {
    let stdout = if mode.is_json() {
        let value = serde_json::json!({ "hits": response.hits, "retries": retries });
        let mut payload = serde_json::to_string_pretty(&value)?;
        payload.push('\n');
        payload
    } else {
        let mut text = if retries == 0 {
            format!("{} hit(s)\n", response.hits.len())
        } else {
            format!("{} hit(s), succeeded after {retries} retries\n", response.hits.len())
        };
        for hit in &response.hits {
            let _ = writeln!(text, "{:.3}  {}  {}", hit.score, hit.path, hit.snippet);
        }
        text
    };
    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}
