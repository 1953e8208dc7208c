//! CLI integration tests.

use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn cli_command() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_chub"));
    scrub_scoped_env(&mut command);
    command
}

fn scrub_scoped_env(command: &mut Command) {
    for (key, _) in std::env::vars() {
        if key.starts_with("CODE_HUB_") {
            command.env_remove(key);
        }
    }
}

fn temp_state_path(label: &str) -> std::io::Result<PathBuf> {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("chub-cli-{label}-{unique}"));
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("state.json"))
}

#[test]
fn help_prints_subcommands() -> std::io::Result<()> {
    let output = cli_command().arg("--help").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("admin"));
    assert!(stdout.contains("activate"));
    assert!(stdout.contains("query"));
    Ok(())
}

#[test]
fn config_check_passes_with_defaults() -> std::io::Result<()> {
    let output = cli_command().args(["config", "check"]).output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("config ok"));
    Ok(())
}

#[test]
fn config_show_emits_effective_json() -> std::io::Result<()> {
    let output = cli_command().args(["config", "show"]).output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(&stdout).map_err(std::io::Error::other)?;
    let base_url = value
        .get("server")
        .and_then(|server| server.get("baseUrl"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| std::io::Error::other("missing server.baseUrl"))?;
    assert!(base_url.starts_with("http://"));
    Ok(())
}

#[test]
fn env_override_reaches_effective_config() -> std::io::Result<()> {
    let output = cli_command()
        .env("CODE_HUB_QUERY_MAX_RESULTS", "25")
        .args(["config", "show"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value =
        serde_json::from_str(&stdout).map_err(std::io::Error::other)?;
    let max_results = value
        .get("query")
        .and_then(|query| query.get("maxResults"))
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| std::io::Error::other("missing query.maxResults"))?;
    assert_eq!(max_results, 25);
    Ok(())
}

#[test]
fn admin_list_requires_privilege() -> std::io::Result<()> {
    let state = temp_state_path("unauthorized")?;
    let output = cli_command()
        .args(["--state"])
        .arg(&state)
        .args(["admin", "list"])
        .output()?;
    assert_eq!(output.status.code(), Some(6));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("unauthorized"));
    Ok(())
}

#[test]
fn admin_list_reports_empty_catalog() -> std::io::Result<()> {
    let state = temp_state_path("empty-list")?;
    let output = cli_command()
        .env("CODE_HUB_SERVER_ADMIN_USERS", "local")
        .args(["--state"])
        .arg(&state)
        .args(["admin", "list"])
        .output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no golden repositories"));
    Ok(())
}

#[test]
fn invalid_branch_name_is_rejected_before_any_network_call() -> std::io::Result<()> {
    let state = temp_state_path("bad-branch")?;
    let output = cli_command()
        .env("CODE_HUB_SERVER_ADMIN_USERS", "local")
        .args(["--state"])
        .arg(&state)
        .args([
            "admin",
            "add",
            "https://git.example.com/org/acme.git",
            "--branch",
            "bad branch",
        ])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}
