//! Config loading helpers (file + env).
//!
//! The loader is responsible for deterministic merge order and surfacing
//! user-facing errors as typed `ErrorEnvelope`s.

use crate::env::{HubEnv, apply_env_overrides};
use crate::schema::{HubConfig, ValidatedHubConfig};
use code_hub_shared::{ErrorCode, ErrorEnvelope};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

/// Load the hub config from an optional file path.
///
/// Precedence (highest wins): env overrides, file content, defaults.
pub fn load_hub_config_from_path(
    config_path: Option<&Path>,
    env: &HubEnv,
) -> Result<ValidatedHubConfig, ErrorEnvelope> {
    let config = match config_path {
        None => HubConfig::default(),
        Some(path) => {
            let format = detect_config_format(path)?;
            let config_text = read_config_file(path)?;
            parse_config_unvalidated(&config_text, format)?
        },
    };

    // env is applied last and also validates/normalizes the resulting config.
    apply_env_overrides(config, env)
}

/// Load the hub config from std env and an optional file path.
pub fn load_hub_config_std_env(
    config_path: Option<&Path>,
) -> Result<ValidatedHubConfig, ErrorEnvelope> {
    let env = HubEnv::from_std_env().map_err(ErrorEnvelope::from)?;
    load_hub_config_from_path(config_path, &env)
}

/// Parse and validate a TOML config document.
pub fn parse_hub_config_toml(input: &str) -> Result<ValidatedHubConfig, ErrorEnvelope> {
    let config = parse_config_unvalidated(input, ConfigFormat::Toml)?;
    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

/// Parse and validate a JSON config document.
pub fn parse_hub_config_json(input: &str) -> Result<ValidatedHubConfig, ErrorEnvelope> {
    let config = parse_config_unvalidated(input, ConfigFormat::Json)?;
    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

fn parse_config_unvalidated(
    input: &str,
    format: ConfigFormat,
) -> Result<HubConfig, ErrorEnvelope> {
    match format {
        ConfigFormat::Json => serde_json::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("failed to parse JSON config: {error}"),
            )
        }),
        ConfigFormat::Toml => toml::from_str(input).map_err(|error| {
            ErrorEnvelope::expected(
                ErrorCode::invalid_input(),
                format!("failed to parse TOML config: {error}"),
            )
        }),
    }
}

fn detect_config_format(path: &Path) -> Result<ConfigFormat, ErrorEnvelope> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(ConfigFormat::Json),
        Some("toml") => Ok(ConfigFormat::Toml),
        other => Err(ErrorEnvelope::expected(
            ErrorCode::invalid_input(),
            format!(
                "unsupported config extension {:?} (expected .json or .toml)",
                other.unwrap_or("")
            ),
        )
        .with_metadata("path", path.display().to_string())),
    }
}

fn read_config_file(path: &Path) -> Result<String, ErrorEnvelope> {
    std::fs::read_to_string(path)
        .map_err(|error| ErrorEnvelope::from(error).with_metadata("path", path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_hub_shared::Result;

    #[test]
    fn defaults_load_without_a_file() -> Result<()> {
        let validated = load_hub_config_from_path(None, &HubEnv::default())?;
        assert_eq!(validated.query.max_results, 10);
        Ok(())
    }

    #[test]
    fn toml_config_round_trips() -> Result<()> {
        let input = r#"
            version = 1

            [server]
            baseUrl = "http://hub.internal:9000"
            requestTimeoutMs = 5000
            adminUsers = ["ops"]

            [retry]
            maxAttempts = 2

            [query]
            budgetMs = 1000
        "#;

        let validated = parse_hub_config_toml(input)?;
        assert_eq!(validated.server.base_url.as_ref(), "http://hub.internal:9000");
        assert_eq!(validated.retry.max_attempts, 2);
        assert_eq!(validated.query.budget_ms, 1_000);
        assert_eq!(validated.retry.base_delay_ms, 250);
        Ok(())
    }

    #[test]
    fn json_config_parses() -> Result<()> {
        let input = r#"{"version":1,"query":{"maxResults":25}}"#;
        let validated = parse_hub_config_json(input)?;
        assert_eq!(validated.query.max_results, 25);
        Ok(())
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = parse_hub_config_json(r#"{"version":1,"bogus":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let result = load_hub_config_from_path(
            Some(Path::new("config.yaml")),
            &HubEnv::default(),
        );
        assert!(result.is_err());
    }
}
