//! Environment variable parsing and env-to-config merging.
//!
//! Env parsing is strict (invalid values fail fast) and deterministic
//! (CSV lists normalize to sorted/deduped values).

use crate::schema::{HubConfig, ValidatedHubConfig};
use code_hub_shared::{ErrorCode, ErrorEnvelope};
use std::fmt;

/// Env var: hub server base URL.
pub const ENV_SERVER_BASE_URL: &str = "CODE_HUB_SERVER_BASE_URL";
/// Env var: per-request timeout in milliseconds.
pub const ENV_SERVER_REQUEST_TIMEOUT_MS: &str = "CODE_HUB_SERVER_REQUEST_TIMEOUT_MS";
/// Env var: CSV list of admin user ids.
pub const ENV_SERVER_ADMIN_USERS: &str = "CODE_HUB_SERVER_ADMIN_USERS";
/// Env var: retry max attempts.
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "CODE_HUB_RETRY_MAX_ATTEMPTS";
/// Env var: retry base delay in ms.
pub const ENV_RETRY_BASE_DELAY_MS: &str = "CODE_HUB_RETRY_BASE_DELAY_MS";
/// Env var: retry max delay in ms.
pub const ENV_RETRY_MAX_DELAY_MS: &str = "CODE_HUB_RETRY_MAX_DELAY_MS";
/// Env var: retry jitter ratio percent.
pub const ENV_RETRY_JITTER_RATIO_PCT: &str = "CODE_HUB_RETRY_JITTER_RATIO_PCT";
/// Env var: query budget in milliseconds.
pub const ENV_QUERY_BUDGET_MS: &str = "CODE_HUB_QUERY_BUDGET_MS";
/// Env var: query max results.
pub const ENV_QUERY_MAX_RESULTS: &str = "CODE_HUB_QUERY_MAX_RESULTS";

/// Parsed environment overrides for the hub config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubEnv {
    /// Override for `server.baseUrl`.
    pub server_base_url: Option<Box<str>>,
    /// Override for `server.requestTimeoutMs`.
    pub server_request_timeout_ms: Option<u64>,
    /// Override for `server.adminUsers` (replaces the list).
    pub server_admin_users: Option<Vec<Box<str>>>,
    /// Override for `retry.maxAttempts`.
    pub retry_max_attempts: Option<u32>,
    /// Override for `retry.baseDelayMs`.
    pub retry_base_delay_ms: Option<u64>,
    /// Override for `retry.maxDelayMs`.
    pub retry_max_delay_ms: Option<u64>,
    /// Override for `retry.jitterRatioPct`.
    pub retry_jitter_ratio_pct: Option<u32>,
    /// Override for `query.budgetMs`.
    pub query_budget_ms: Option<u64>,
    /// Override for `query.maxResults`.
    pub query_max_results: Option<u32>,
}

impl HubEnv {
    /// Read overrides from the process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        Ok(Self {
            server_base_url: read_string(ENV_SERVER_BASE_URL),
            server_request_timeout_ms: read_u64(ENV_SERVER_REQUEST_TIMEOUT_MS)?,
            server_admin_users: read_csv(ENV_SERVER_ADMIN_USERS),
            retry_max_attempts: read_u32(ENV_RETRY_MAX_ATTEMPTS)?,
            retry_base_delay_ms: read_u64(ENV_RETRY_BASE_DELAY_MS)?,
            retry_max_delay_ms: read_u64(ENV_RETRY_MAX_DELAY_MS)?,
            retry_jitter_ratio_pct: read_u32(ENV_RETRY_JITTER_RATIO_PCT)?,
            query_budget_ms: read_u64(ENV_QUERY_BUDGET_MS)?,
            query_max_results: read_u32(ENV_QUERY_MAX_RESULTS)?,
        })
    }
}

/// Apply env overrides on top of `config`, then validate and normalize.
pub fn apply_env_overrides(
    mut config: HubConfig,
    env: &HubEnv,
) -> Result<ValidatedHubConfig, ErrorEnvelope> {
    if let Some(base_url) = &env.server_base_url {
        config.server.base_url = base_url.clone();
    }
    if let Some(timeout_ms) = env.server_request_timeout_ms {
        config.server.request_timeout_ms = timeout_ms;
    }
    if let Some(admin_users) = &env.server_admin_users {
        config.server.admin_users = admin_users.clone();
    }
    if let Some(max_attempts) = env.retry_max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(base_delay_ms) = env.retry_base_delay_ms {
        config.retry.base_delay_ms = base_delay_ms;
    }
    if let Some(max_delay_ms) = env.retry_max_delay_ms {
        config.retry.max_delay_ms = max_delay_ms;
    }
    if let Some(jitter_ratio_pct) = env.retry_jitter_ratio_pct {
        config.retry.jitter_ratio_pct = jitter_ratio_pct;
    }
    if let Some(budget_ms) = env.query_budget_ms {
        config.query.budget_ms = budget_ms;
    }
    if let Some(max_results) = env.query_max_results {
        config.query.max_results = max_results;
    }

    config.validate_and_normalize().map_err(ErrorEnvelope::from)
}

fn read_string(name: &str) -> Option<Box<str>> {
    let value = std::env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.into())
    }
}

fn read_csv(name: &str) -> Option<Vec<Box<str>>> {
    let raw = read_string(name)?;
    let mut entries: Vec<Box<str>> = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(Box::from)
        .collect();
    entries.sort_unstable();
    entries.dedup();
    Some(entries)
}

fn read_u64(name: &'static str) -> Result<Option<u64>, EnvParseError> {
    match read_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| EnvParseError::InvalidNumber {
                name,
                value: raw.to_string(),
            }),
    }
}

fn read_u32(name: &'static str) -> Result<Option<u32>, EnvParseError> {
    match read_string(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|_| EnvParseError::InvalidNumber {
                name,
                value: raw.to_string(),
            }),
    }
}

/// Typed env parsing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// A numeric env var failed to parse.
    InvalidNumber {
        /// Env var name.
        name: &'static str,
        /// Raw value provided.
        value: String,
    },
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNumber { name, value } => {
                write!(f, "env var {name} is not a valid number: {value}")
            },
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let message = error.to_string();
        match error {
            EnvParseError::InvalidNumber { name, value } => {
                Self::expected(ErrorCode::invalid_input(), message)
                    .with_metadata("name", name)
                    .with_metadata("value", value)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_hub_shared::Result;

    #[test]
    fn overrides_replace_file_values() -> Result<()> {
        let env = HubEnv {
            server_base_url: Some("http://hub.internal:9000".into()),
            retry_max_attempts: Some(6),
            query_budget_ms: Some(2_000),
            ..HubEnv::default()
        };

        let validated = apply_env_overrides(HubConfig::default(), &env)?;
        assert_eq!(validated.server.base_url.as_ref(), "http://hub.internal:9000");
        assert_eq!(validated.retry.max_attempts, 6);
        assert_eq!(validated.query.budget_ms, 2_000);
        Ok(())
    }

    #[test]
    fn override_values_are_still_validated() {
        let env = HubEnv {
            retry_max_attempts: Some(0),
            ..HubEnv::default()
        };

        let result = apply_env_overrides(HubConfig::default(), &env);
        assert!(result.is_err());
    }

    #[test]
    fn admin_users_override_replaces_whole_list() -> Result<()> {
        let mut config = HubConfig::default();
        config.server.admin_users = vec!["old-admin".into()];

        let env = HubEnv {
            server_admin_users: Some(vec!["zoe".into(), "amy".into()]),
            ..HubEnv::default()
        };

        let validated = apply_env_overrides(config, &env)?;
        assert_eq!(
            validated.server.admin_users,
            vec![Box::from("amy"), Box::from("zoe")]
        );
        Ok(())
    }
}
