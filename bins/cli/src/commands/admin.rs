//! Admin lifecycle command handlers.

use crate::error::{CliError, ExitCode};
use crate::format::OutputMode;
use crate::{CliOutput, HubServices, format_error_output};
use code_hub_app::{
    AddRepositoryInput, AdminPrincipal, CatalogStatus, admin_add, admin_delete, admin_list,
    admin_refresh, admin_status,
};
use code_hub_domain::{BranchName, GoldenRepository, RepoAlias, SourceUrl};
use code_hub_shared::{ErrorEnvelope, RequestContext};
use std::fmt::Write;

/// Inputs for the `admin add` command.
pub struct AdminAddInput<'a> {
    pub source_url: &'a str,
    pub alias: Option<&'a str>,
    pub branches: &'a [String],
    pub default_branch: Option<&'a str>,
}

/// Run `chub admin add`.
pub async fn run_admin_add(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    input: &AdminAddInput<'_>,
) -> Result<CliOutput, CliError> {
    let parsed = match parse_add_input(input) {
        Ok(parsed) => parsed,
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    match admin_add(ctx, principal, &services.catalog, parsed).await {
        Ok(record) => {
            let stdout = if mode.is_json() {
                to_json(&record)?
            } else {
                let mut text = format!(
                    "added golden repository {} ({} branch indexes built)\n",
                    record.alias,
                    record.branches.len()
                );
                write_record_line(&mut text, &record);
                text
            };
            Ok(ok_output(stdout))
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

/// Run `chub admin refresh`.
pub async fn run_admin_refresh(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    alias: &str,
) -> Result<CliOutput, CliError> {
    let alias = match parse_alias(alias) {
        Ok(alias) => alias,
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    match admin_refresh(ctx, principal, &services.catalog, &alias).await {
        Ok(record) => {
            let stdout = if mode.is_json() {
                to_json(&record)?
            } else {
                format!("refreshed golden repository {}\n", record.alias)
            };
            Ok(ok_output(stdout))
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

/// Run `chub admin delete`.
pub async fn run_admin_delete(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    alias: &str,
    force: bool,
) -> Result<CliOutput, CliError> {
    let alias = match parse_alias(alias) {
        Ok(alias) => alias,
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    match admin_delete(
        ctx,
        principal,
        &services.catalog,
        &services.registry,
        &alias,
        force,
    )
    .await
    {
        Ok(()) => {
            let stdout = if mode.is_json() {
                let value = serde_json::json!({ "deleted": alias.as_str(), "forced": force });
                let mut payload = serde_json::to_string_pretty(&value)?;
                payload.push('\n');
                payload
            } else if force {
                format!("deleted golden repository {alias} (dependent activations marked failed)\n")
            } else {
                format!("deleted golden repository {alias}\n")
            };
            Ok(ok_output(stdout))
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

/// Run `chub admin list`.
pub fn run_admin_list(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    principal: &AdminPrincipal,
) -> Result<CliOutput, CliError> {
    match admin_list(principal, &services.catalog) {
        Ok(records) => {
            let stdout = if mode.is_json() {
                to_json(&records)?
            } else if records.is_empty() {
                "no golden repositories\n".to_owned()
            } else {
                let mut text = String::new();
                for record in &records {
                    write_record_line(&mut text, record);
                }
                text
            };
            Ok(ok_output(stdout))
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

/// Run `chub admin status`.
pub async fn run_admin_status(
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
    principal: &AdminPrincipal,
    alias: &str,
) -> Result<CliOutput, CliError> {
    let alias = match parse_alias(alias) {
        Ok(alias) => alias,
        Err(error) => return Ok(format_error_output(mode, &error, ctx)),
    };

    match admin_status(ctx, principal, &services.catalog, &alias).await {
        Ok(status) => {
            let stdout = if mode.is_json() {
                status_json(&status)?
            } else {
                let mut text = String::new();
                write_record_line(&mut text, &status.repository);
                if status.missing_branches.is_empty() {
                    text.push_str("all branch indexes present\n");
                } else {
                    let missing: Vec<&str> = status
                        .missing_branches
                        .iter()
                        .map(BranchName::as_str)
                        .collect();
                    let _ = writeln!(text, "missing branch indexes: {}", missing.join(", "));
                }
                text
            };
            Ok(ok_output(stdout))
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

fn parse_add_input(input: &AdminAddInput<'_>) -> Result<AddRepositoryInput, ErrorEnvelope> {
    let source_url = SourceUrl::parse(input.source_url).map_err(ErrorEnvelope::from)?;
    let alias = input
        .alias
        .map(RepoAlias::parse)
        .transpose()
        .map_err(ErrorEnvelope::from)?;
    let branches = input
        .branches
        .iter()
        .map(BranchName::parse)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ErrorEnvelope::from)?;
    let default_branch = input
        .default_branch
        .map(BranchName::parse)
        .transpose()
        .map_err(ErrorEnvelope::from)?;

    Ok(AddRepositoryInput {
        source_url,
        alias,
        branches,
        default_branch,
    })
}

fn parse_alias(alias: &str) -> Result<RepoAlias, ErrorEnvelope> {
    RepoAlias::parse(alias).map_err(ErrorEnvelope::from)
}

fn write_record_line(text: &mut String, record: &GoldenRepository) {
    let branches: Vec<&str> = record.branches.iter().map(BranchName::as_str).collect();
    let _ = writeln!(
        text,
        "{}  {}  branches: {}  default: {}  state: {}",
        record.alias,
        record.source_url,
        branches.join(", "),
        record.default_branch,
        record.state,
    );
}

fn status_json(status: &CatalogStatus) -> Result<String, CliError> {
    let value = serde_json::json!({
        "repository": status.repository,
        "missingBranches": status.missing_branches,
    });
    let mut payload = serde_json::to_string_pretty(&value)?;
    payload.push('\n');
    Ok(payload)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    let mut payload = serde_json::to_string_pretty(value)?;
    payload.push('\n');
    Ok(payload)
}

fn ok_output(stdout: String) -> CliOutput {
    CliOutput {
        stdout,
        stderr: String::new(),
        exit_code: ExitCode::Ok,
    }
}
