//! CLI binary entrypoint.

mod commands;
mod error;
mod format;
mod state;

use clap::{Parser, Subcommand};
use code_hub_adapters::{
    HttpIndexingAdapter, HttpQueryTransport, HttpWorkspaceAdapter, HubHttpConfig,
};
use code_hub_app::{ActivationRegistry, AdminPrincipal, GoldenCatalog};
use code_hub_config::{ValidatedHubConfig, load_hub_config_std_env};
use code_hub_domain::UserId;
use code_hub_ports::query::QueryTransportPort;
use code_hub_shared::{ErrorEnvelope, RequestContext};
use commands::{
    ActivateCommandInput, AdminAddInput, QueryCommandInput, run_activate, run_admin_add,
    run_admin_delete, run_admin_list, run_admin_refresh, run_admin_status, run_deactivate,
    run_query,
};
use error::{CliError, ExitCode, envelope_exit_code};
use format::{OutputArgs, OutputMode};
use state::{HubState, load_state, resolve_state_path, save_state};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Optional bearer token for the hub server, read from the environment.
const ENV_SERVER_TOKEN: &str = "CODE_HUB_SERVER_TOKEN";

#[derive(Debug, Parser)]
#[command(
    name = "chub",
    version,
    about = "Golden-repository catalog and query CLI",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    output: OutputArgs,

    /// Optional config file path (JSON/TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file path. Defaults to `.code-hub/state.json`.
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Acting user id.
    #[arg(long, global = true, default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Golden-repository catalog administration.
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Resolve a project to a repository and activate it on demand.
    Activate {
        /// Project name or golden alias.
        project: String,
        /// Branch to activate; defaults to the repository's default branch.
        #[arg(long)]
        branch: Option<String>,
    },
    /// Tear down one activated working copy.
    Deactivate {
        /// User-scoped alias of the activation.
        user_alias: String,
    },
    /// Execute a search query against a repository, activating if needed.
    Query {
        /// Free-text search query.
        query: String,
        /// Project name or golden alias to query.
        #[arg(long)]
        project: String,
        /// Branch to query; defaults to the repository's default branch.
        #[arg(long)]
        branch: Option<String>,
        /// Maximum number of hits (defaults to the configured limit).
        #[arg(long)]
        max_results: Option<u32>,
    },
    /// Config-related commands.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum AdminCommands {
    /// Register a golden repository and build its branch indexes.
    Add {
        /// Git source URL of the repository.
        source_url: String,
        /// Catalog alias; derived from the URL when omitted.
        #[arg(long)]
        alias: Option<String>,
        /// Branch to track (repeatable). Defaults to `main`.
        #[arg(long = "branch")]
        branches: Vec<String>,
        /// Default branch; defaults to the first tracked branch.
        #[arg(long)]
        default_branch: Option<String>,
    },
    /// Re-index every tracked branch of a golden repository.
    Refresh {
        /// Catalog alias.
        alias: String,
    },
    /// Delete a golden repository and its indexes.
    Delete {
        /// Catalog alias.
        alias: String,
        /// Fail dependent activations instead of refusing.
        #[arg(long)]
        force: bool,
    },
    /// List the golden-repository catalog.
    List,
    /// Verify one repository's branch indexes.
    Status {
        /// Catalog alias.
        alias: String,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Load and validate the effective config.
    Check,
    /// Print the effective config as JSON.
    Show,
}

pub(crate) struct CliOutput {
    stdout: String,
    stderr: String,
    exit_code: ExitCode,
}

/// Wired services shared by command handlers.
pub(crate) struct HubServices {
    config: ValidatedHubConfig,
    catalog: GoldenCatalog,
    registry: ActivationRegistry,
    transport: Arc<dyn QueryTransportPort>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let mode = OutputMode::from_args(&cli.output);
    init_tracing(mode.no_progress);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => return exit_with_error(&CliError::Io(error)),
    };

    match runtime.block_on(run(&cli, mode)) {
        Ok(output) => match write_output(&output) {
            Ok(()) => std::process::ExitCode::from(output.exit_code.as_u8()),
            Err(error) => exit_with_error(&error),
        },
        Err(error) => exit_with_error(&error),
    }
}

fn init_tracing(quiet: bool) {
    if quiet {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn exit_with_error(error: &CliError) -> std::process::ExitCode {
    let _ = writeln!(io::stderr(), "error: {error}");
    std::process::ExitCode::from(error.exit_code().as_u8())
}

async fn run(cli: &Cli, mode: OutputMode) -> Result<CliOutput, CliError> {
    let ctx = RequestContext::new_request();
    tracing::debug!(correlation_id = %ctx.correlation_id(), "dispatching command");

    if let Commands::Config { command } = &cli.command {
        return match command {
            ConfigCommands::Check => config_check(mode, cli, &ctx),
            ConfigCommands::Show => config_show(mode, cli, &ctx),
        };
    }

    let services = match build_services(cli) {
        Ok(services) => services,
        Err(error) => return Ok(format_error_output(mode, &error, &ctx)),
    };

    let state_path = resolve_state_path(cli.state.as_deref());
    let persisted = load_state(&state_path)?;
    services.catalog.restore(persisted.goldens);
    services.registry.restore(persisted.activations);

    let output = dispatch(cli, mode, &services, &ctx).await?;

    // Lifecycle commands mutate records even on reported failures
    // (e.g. a stuck delete), so state is saved unconditionally.
    let state = HubState {
        goldens: services.catalog.list(),
        activations: services.registry.snapshot(),
    };
    save_state(&state_path, &state)?;

    Ok(output)
}

async fn dispatch(
    cli: &Cli,
    mode: OutputMode,
    services: &HubServices,
    ctx: &RequestContext,
) -> Result<CliOutput, CliError> {
    let date_stamp = chrono::Local::now().format("%Y-%m-%d").to_string();

    match &cli.command {
        Commands::Admin { command } => {
            let principal = match admin_principal(cli, services) {
                Ok(principal) => principal,
                Err(error) => return Ok(format_error_output(mode, &error, ctx)),
            };
            match command {
                AdminCommands::Add {
                    source_url,
                    alias,
                    branches,
                    default_branch,
                } => {
                    let input = AdminAddInput {
                        source_url,
                        alias: alias.as_deref(),
                        branches,
                        default_branch: default_branch.as_deref(),
                    };
                    run_admin_add(mode, services, ctx, &principal, &input).await
                },
                AdminCommands::Refresh { alias } => {
                    run_admin_refresh(mode, services, ctx, &principal, alias).await
                },
                AdminCommands::Delete { alias, force } => {
                    run_admin_delete(mode, services, ctx, &principal, alias, *force).await
                },
                AdminCommands::List => run_admin_list(mode, services, ctx, &principal),
                AdminCommands::Status { alias } => {
                    run_admin_status(mode, services, ctx, &principal, alias).await
                },
            }
        },
        Commands::Activate { project, branch } => {
            let input = ActivateCommandInput {
                project,
                branch: branch.as_deref(),
                user_id: &cli.user,
                date_stamp: &date_stamp,
            };
            run_activate(mode, services, ctx, &input).await
        },
        Commands::Deactivate { user_alias } => {
            run_deactivate(mode, services, ctx, &cli.user, user_alias).await
        },
        Commands::Query {
            query,
            project,
            branch,
            max_results,
        } => {
            let input = QueryCommandInput {
                project,
                branch: branch.as_deref(),
                query,
                max_results: *max_results,
                user_id: &cli.user,
                date_stamp: &date_stamp,
            };
            run_query(mode, services, ctx, &input).await
        },
        Commands::Config { .. } => Err(CliError::InvalidInput(
            "config commands do not use hub services".to_owned(),
        )),
    }
}

fn build_services(cli: &Cli) -> Result<HubServices, ErrorEnvelope> {
    let config = load_hub_config_std_env(cli.config.as_deref())?;

    let http = HubHttpConfig {
        base_url: config.server.base_url.clone(),
        token: std::env::var(ENV_SERVER_TOKEN).ok().map(Into::into),
        timeout_ms: config.server.request_timeout_ms,
    };
    let indexing = Arc::new(HttpIndexingAdapter::new(&http)?);
    let workspace = Arc::new(HttpWorkspaceAdapter::new(&http)?);
    let transport: Arc<dyn QueryTransportPort> = Arc::new(HttpQueryTransport::new(&http)?);

    Ok(HubServices {
        catalog: GoldenCatalog::new(indexing),
        registry: ActivationRegistry::new(workspace),
        transport,
        config,
    })
}

fn admin_principal(cli: &Cli, services: &HubServices) -> Result<AdminPrincipal, ErrorEnvelope> {
    let user_id = UserId::parse(&cli.user).map_err(ErrorEnvelope::from)?;
    let is_admin = services.config.server.is_admin(user_id.as_str());
    Ok(AdminPrincipal { user_id, is_admin })
}

fn config_check(mode: OutputMode, cli: &Cli, ctx: &RequestContext) -> Result<CliOutput, CliError> {
    match load_hub_config_std_env(cli.config.as_deref()) {
        Ok(_) => {
            let stdout = if mode.is_json() {
                "{\"status\":\"ok\"}\n".to_owned()
            } else {
                "config ok\n".to_owned()
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

fn config_show(mode: OutputMode, cli: &Cli, ctx: &RequestContext) -> Result<CliOutput, CliError> {
    match load_hub_config_std_env(cli.config.as_deref()) {
        Ok(config) => {
            let mut stdout = serde_json::to_string_pretty(config.as_ref())?;
            stdout.push('\n');
            let _ = mode;
            Ok(CliOutput {
                stdout,
                stderr: String::new(),
                exit_code: ExitCode::Ok,
            })
        },
        Err(error) => Ok(format_error_output(mode, &error, ctx)),
    }
}

pub(crate) fn format_error_output(
    mode: OutputMode,
    error: &ErrorEnvelope,
    ctx: &RequestContext,
) -> CliOutput {
    let error = sanitize_envelope(error.clone())
        .with_metadata("correlationId", ctx.correlation_id().as_str().to_owned());
    let exit_code = envelope_exit_code(&error);

    let mut stderr = String::new();
    log_info(&mut stderr, "command failed", mode.no_progress);

    let stdout = if mode.is_json() {
        let payload = serde_json::json!({
            "status": "error",
            "error": error,
        });
        // This is a CLI boundary, so JSON serialization errors are internal.
        let mut output = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"status\":\"error\",\"error\":{\"message\":\"internal error\"}}".to_owned()
        });
        output.push('\n');
        output
    } else {
        format_envelope_text(&error)
    };

    CliOutput {
        stdout,
        stderr,
        exit_code,
    }
}

fn sanitize_envelope(mut error: ErrorEnvelope) -> ErrorEnvelope {
    for (key, value) in &mut error.metadata {
        if is_secret_key(key) {
            *value = "<redacted>".to_owned();
        }
    }
    error
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("token") || key.contains("secret") || key.contains("password")
}

fn format_envelope_text(error: &ErrorEnvelope) -> String {
    let mut out = String::new();
    out.push_str("status: error\n");
    out.push_str("code: ");
    out.push_str(&error.code.to_string());
    out.push('\n');
    out.push_str("message: ");
    out.push_str(&error.message);
    out.push('\n');
    out.push_str("kind: ");
    out.push_str(&error.kind.to_string());
    out.push('\n');

    if !error.metadata.is_empty() {
        out.push_str("meta:\n");
        for (key, value) in &error.metadata {
            out.push_str("  ");
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}

fn log_info(stderr: &mut String, message: &str, no_progress: bool) {
    if no_progress {
        return;
    }
    stderr.push_str("info: ");
    stderr.push_str(message);
    stderr.push('\n');
}

fn write_output(output: &CliOutput) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    stdout.write_all(output.stdout.as_bytes())?;

    if !output.stderr.is_empty() {
        let mut stderr = io::stderr();
        stderr.write_all(output.stderr.as_bytes())?;
        stderr.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_hub_shared::ErrorCode;

    #[test]
    fn cli_parses_admin_add_flags() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "chub",
            "admin",
            "add",
            "https://git.example.com/org/acme.git",
            "--alias",
            "acme",
            "--branch",
            "main",
            "--branch",
            "dev",
            "--default-branch",
            "main",
        ])?;
        match cli.command {
            Commands::Admin {
                command:
                    AdminCommands::Add {
                        source_url,
                        alias,
                        branches,
                        default_branch,
                    },
            } => {
                assert_eq!(source_url, "https://git.example.com/org/acme.git");
                assert_eq!(alias.as_deref(), Some("acme"));
                assert_eq!(branches, vec!["main".to_owned(), "dev".to_owned()]);
                assert_eq!(default_branch.as_deref(), Some("main"));
            },
            _ => return Err("expected admin add command".into()),
        }
        Ok(())
    }

    #[test]
    fn cli_parses_query_flags() -> Result<(), Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from([
            "chub",
            "--json",
            "--user",
            "u1",
            "query",
            "retry loop",
            "--project",
            "acme",
            "--branch",
            "dev",
            "--max-results",
            "5",
        ])?;
        assert!(cli.output.json);
        assert_eq!(cli.user, "u1");
        match cli.command {
            Commands::Query {
                query,
                project,
                branch,
                max_results,
            } => {
                assert_eq!(query, "retry loop");
                assert_eq!(project, "acme");
                assert_eq!(branch.as_deref(), Some("dev"));
                assert_eq!(max_results, Some(5));
            },
            _ => return Err("expected query command".into()),
        }
        Ok(())
    }

    #[test]
    fn json_flag_selects_json_output() {
        let mode = OutputMode::from_args(&OutputArgs {
            output: None,
            json: true,
            no_progress: false,
        });
        assert!(mode.is_json());
    }

    #[test]
    fn envelope_text_names_code_and_meta() {
        let error = ErrorEnvelope::conflict("repository in use")
            .with_metadata("dependents", "2".to_owned());
        let text = format_envelope_text(&error);
        assert!(text.contains("code: hub:conflict"));
        assert!(text.contains("dependents: 2"));
    }

    #[test]
    fn secret_metadata_is_redacted() {
        let error = ErrorEnvelope::expected(ErrorCode::unauthorized(), "denied")
            .with_metadata("authToken", "abc".to_owned());
        let sanitized = sanitize_envelope(error);
        assert_eq!(
            sanitized.metadata.get("authToken").map(String::as_str),
            Some("<redacted>")
        );
    }

    #[test]
    fn log_info_respects_no_progress() {
        let mut stderr = String::new();
        log_info(&mut stderr, "message", true);
        assert!(stderr.is_empty());
    }
}
