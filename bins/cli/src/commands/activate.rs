//! Activate/deactivate command handlers.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, HubServices, format_error_output};
use code_hub_app::resolve_repository;
use code_hub_domain::{ActivatedRepository, BranchName, MatchSelector, UserAlias, UserId};
use code_hub_shared::{ErrorEnvelope, RequestContext};

/// Inputs for the `activate` command.
pub struct ActivateCommandInput<'a> {
    pub project: &'a str,
    pub branch: Option<&'a str>,
    pub user_id: &'a str,
    pub date_stamp: &'a str,
}

/// Run `chub activate`: resolve the best match and materialize it.
pub async fn run_activate(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    input: &ActivateCommandInput<'_>,
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

    match resolved {
        Ok(Some(record)) => Ok(activated_output(mode, &record)?),
        Ok(None) => Ok(no_match_output(mode, input.project)?),
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

/// Run `chub deactivate`: tear down one activated working copy.
pub async fn run_deactivate(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    user_id: &str,
    user_alias: &str,
) -> Result<CliOutput, CliError> {
    let parsed = UserId::parse(user_id)
        .map_err(ErrorEnvelope::from)
        .and_then(|user_id| {
            let alias = UserAlias::parse(user_alias).map_err(ErrorEnvelope::from)?;
            Ok((user_id, alias))
        });
    let (user_id, user_alias) = match parsed {
        Ok(parsed) => parsed,
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    match services.registry.deactivate(ctx, &user_id, &user_alias).await {
        Ok(()) => {
            let stdout = if mode.is_json() {
                let value = serde_json::json!({ "deactivated": user_alias.as_str() });
                let mut payload = serde_json::to_string_pretty(&value)?;
                payload.push('\n');
                payload
            } else {
                format!("deactivated {user_alias}\n")
            };
            Ok(CliOutput {
                stdout,
                stderr: String::new(),
                exit_code: ExitCode::Ok,
            })
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

pub(crate) fn parse_selector(
    user_id: &str,
    project: &str,
    branch: Option<&str>,
) -> Result<(UserId, MatchSelector), ErrorEnvelope> {
    let user_id = UserId::parse(user_id).map_err(ErrorEnvelope::from)?;
    let branch = branch
        .map(BranchName::parse)
        .transpose()
        .map_err(ErrorEnvelope::from)?;
    Ok((
        user_id,
        MatchSelector {
            project: project.into(),
            branch,
        },
    ))
}

pub(crate) fn activated_output(
    mode: OutputMode,
    record: &ActivatedRepository,
) -> Result<CliOutput, CliError> {
    let stdout = if mode.is_json() {
        let mut payload = serde_json::to_string_pretty(record)?;
        payload.push('\n');
        payload
    } else {
        format!(
            "{}  golden: {}  branch: {}  state: {}  endpoint: {}\n",
            record.user_alias, record.golden_alias, record.branch, record.state, record.endpoint,
        )
    };
    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    })
}

pub(crate) fn no_match_output(mode: OutputMode, project: &str) -> Result<CliOutput, CliError> {
    let stdout = if mode.is_json() {
        let value = serde_json::json!({ "match": serde_json::Value::Null });
        let mut payload = serde_json::to_string_pretty(&value)?;
        payload.push('\n');
        payload
    } else {
        format!("no repository matches {project}\n")
    };
    Ok(CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::NotFound,
    })
}
